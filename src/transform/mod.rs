//! Lifting transform engine.
//!
//! One decomposition level of the forward or inverse DWT along a line,
//! horizontally (`horz_ana`/`horz_syn`) or vertically across lines
//! (`vert_step`/`vert_times_k`). Reversible kernels run on `I32` or `I64`
//! lines, irreversible kernels on `F32` lines; every line passed to one call
//! must share that domain.

pub mod line_buf;

mod irreversible;
mod reversible;

pub use line_buf::{LineBuf, LineSample, SampleType};

use crate::error::CodestreamError;
use crate::params::{Kernel, LiftingStep};
use line_buf::Lane;

/// Applies one lifting step across lines: `aug` is updated from the sum of
/// `sig` and `other` over at most `repeat` samples. Analysis adds the step
/// term and synthesis subtracts it.
pub fn vert_step(
    step: &LiftingStep,
    sig: &LineBuf,
    other: &LineBuf,
    aug: &mut LineBuf,
    repeat: usize,
    synthesis: bool,
) -> Result<(), CodestreamError> {
    match step {
        LiftingStep::Reversible { .. } => match aug.sample_type() {
            SampleType::I32 => reversible::vert_step::<i32>(
                step,
                payload(sig)?,
                payload(other)?,
                payload_mut(aug)?,
                repeat,
                synthesis,
            ),
            SampleType::I64 => reversible::vert_step::<i64>(
                step,
                payload(sig)?,
                payload(other)?,
                payload_mut(aug)?,
                repeat,
                synthesis,
            ),
            _ => return Err(CodestreamError::LineTypeMismatch),
        },
        LiftingStep::Irreversible { .. } => irreversible::vert_step(
            step,
            payload(sig)?,
            payload(other)?,
            payload_mut(aug)?,
            repeat,
            synthesis,
        ),
    }
    Ok(())
}

/// Multiplies the first `repeat` samples of an `F32` line by `k`.
pub fn vert_times_k(k: f32, aug: &mut LineBuf, repeat: usize) -> Result<(), CodestreamError> {
    irreversible::vert_times_k(k, payload_mut(aug)?, repeat);
    Ok(())
}

/// Forward transform of `width` samples of `src` into a low and a high
/// band. `even` tells whether the line starts on an even coordinate, which
/// puts the first sample in the low band.
pub fn horz_ana(
    kernel: &Kernel,
    low: &mut LineBuf,
    high: &mut LineBuf,
    src: &LineBuf,
    width: usize,
    even: bool,
) -> Result<(), CodestreamError> {
    check_widths(low, high, src.width(), width, even)?;
    match (kernel.is_reversible(), src.sample_type()) {
        (true, SampleType::I32) => {
            reversible::horz_ana::<i32>(kernel, lane(low)?, lane(high)?, payload(src)?, width, even)
        }
        (true, SampleType::I64) => {
            reversible::horz_ana::<i64>(kernel, lane(low)?, lane(high)?, payload(src)?, width, even)
        }
        (false, SampleType::F32) => {
            irreversible::horz_ana(kernel, lane(low)?, lane(high)?, payload(src)?, width, even)
        }
        _ => return Err(CodestreamError::LineTypeMismatch),
    }
    Ok(())
}

/// Inverse of [`horz_ana`]. The low and high bands are used as scratch and
/// do not survive the call.
pub fn horz_syn(
    kernel: &Kernel,
    dst: &mut LineBuf,
    low: &mut LineBuf,
    high: &mut LineBuf,
    width: usize,
    even: bool,
) -> Result<(), CodestreamError> {
    check_widths(low, high, dst.width(), width, even)?;
    match (kernel.is_reversible(), dst.sample_type()) {
        (true, SampleType::I32) => reversible::horz_syn::<i32>(
            kernel,
            payload_mut(dst)?,
            lane(low)?,
            lane(high)?,
            width,
            even,
        ),
        (true, SampleType::I64) => reversible::horz_syn::<i64>(
            kernel,
            payload_mut(dst)?,
            lane(low)?,
            lane(high)?,
            width,
            even,
        ),
        (false, SampleType::F32) => {
            irreversible::horz_syn(kernel, payload_mut(dst)?, lane(low)?, lane(high)?, width, even)
        }
        _ => return Err(CodestreamError::LineTypeMismatch),
    }
    Ok(())
}

fn payload<T: LineSample>(line: &LineBuf) -> Result<&[T], CodestreamError> {
    line.payload().ok_or(CodestreamError::LineTypeMismatch)
}

fn payload_mut<T: LineSample>(line: &mut LineBuf) -> Result<&mut [T], CodestreamError> {
    line.payload_mut().ok_or(CodestreamError::LineTypeMismatch)
}

fn lane<T: LineSample>(line: &mut LineBuf) -> Result<Lane<'_, T>, CodestreamError> {
    line.lane().ok_or(CodestreamError::LineTypeMismatch)
}

fn check_widths(
    low: &LineBuf,
    high: &LineBuf,
    full: usize,
    width: usize,
    even: bool,
) -> Result<(), CodestreamError> {
    let l_width = (width + usize::from(even)) >> 1;
    let h_width = (width + usize::from(!even)) >> 1;
    if full < width || low.width() < l_width || high.width() < h_width {
        return Err(CodestreamError::InvalidConfiguration(format!(
            "line buffers of widths {}, {} and {} cannot hold a {}-sample line",
            full,
            low.width(),
            high.width(),
            width
        )));
    }
    Ok(())
}

/// De-interleaves `src` into the payloads of `low` and `high`.
fn split<T: Copy>(low: &mut Lane<'_, T>, high: &mut Lane<'_, T>, src: &[T], even: bool) {
    let (mut l, mut h) = (low.pre, high.pre);
    for (i, &sample) in src.iter().enumerate() {
        if (i % 2 == 0) == even {
            low.buf[l] = sample;
            l += 1;
        } else {
            high.buf[h] = sample;
            h += 1;
        }
    }
}

/// Interleaves the payloads of `low` and `high` into `dst`.
fn merge<T: Copy>(dst: &mut [T], low: &Lane<'_, T>, high: &Lane<'_, T>, even: bool) {
    let (mut l, mut h) = (low.pre, high.pre);
    for (i, sample) in dst.iter_mut().enumerate() {
        if (i % 2 == 0) == even {
            *sample = low.buf[l];
            l += 1;
        } else {
            *sample = high.buf[h];
            h += 1;
        }
    }
}
