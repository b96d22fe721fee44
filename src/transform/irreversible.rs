//! Floating-point lifting for irreversible kernels.

use super::line_buf::Lane;
use crate::params::{Kernel, LiftingStep};

fn coefficient(step: &LiftingStep) -> Option<f32> {
    match *step {
        LiftingStep::Irreversible { a } => Some(a),
        LiftingStep::Reversible { .. } => None,
    }
}

/// `aug[i] ±= a * (sig[i] + other[i])` over `repeat` samples.
pub(crate) fn vert_step(
    step: &LiftingStep,
    sig: &[f32],
    other: &[f32],
    aug: &mut [f32],
    repeat: usize,
    synthesis: bool,
) {
    let Some(a) = coefficient(step) else {
        return;
    };
    let a = if synthesis { -a } else { a };
    for ((dst, &s0), &s1) in aug.iter_mut().zip(sig).zip(other).take(repeat) {
        *dst += a * (s0 + s1);
    }
}

pub(crate) fn vert_times_k(k: f32, aug: &mut [f32], repeat: usize) {
    for dst in aug.iter_mut().take(repeat) {
        *dst *= k;
    }
}

/// Splits `src`, runs the steps in reverse order, then scales the low band
/// by 1/K and the high band by K.
pub(crate) fn horz_ana(
    kernel: &Kernel,
    low: Lane<'_, f32>,
    high: Lane<'_, f32>,
    src: &[f32],
    width: usize,
    even: bool,
) {
    let (mut lp, mut hp) = (low, high);
    if width == 1 {
        if even {
            lp.buf[lp.pre] = src[0];
        } else {
            hp.buf[hp.pre] = src[0] * 2.0;
        }
        return;
    }
    if width == 0 {
        return;
    }

    super::split(&mut lp, &mut hp, &src[..width], even);

    let mut even = even;
    let mut l_width = (width + usize::from(even)) >> 1;
    let mut h_width = (width + usize::from(!even)) >> 1;
    for step in kernel.steps().iter().rev() {
        let Some(a) = coefficient(step) else {
            continue;
        };
        lp.extend(l_width);
        let sp = lp.pre + usize::from(even);
        for i in 0..h_width {
            hp.buf[hp.pre + i] += a * (lp.buf[sp + i - 1] + lp.buf[sp + i]);
        }

        std::mem::swap(&mut lp, &mut hp);
        even = !even;
        std::mem::swap(&mut l_width, &mut h_width);
    }

    let k = kernel.k();
    let k_inv = 1.0 / k;
    for sample in &mut lp.buf[lp.pre..lp.pre + l_width] {
        *sample *= k_inv;
    }
    for sample in &mut hp.buf[hp.pre..hp.pre + h_width] {
        *sample *= k;
    }
}

/// Undoes the K scaling, runs the steps in order and interleaves the
/// halves into `dst`.
pub(crate) fn horz_syn(
    kernel: &Kernel,
    dst: &mut [f32],
    low: Lane<'_, f32>,
    high: Lane<'_, f32>,
    width: usize,
    even: bool,
) {
    let (mut aug, mut oth) = (low, high);
    if width == 1 {
        dst[0] = if even {
            aug.buf[aug.pre]
        } else {
            oth.buf[oth.pre] * 0.5
        };
        return;
    }
    if width == 0 {
        return;
    }

    let mut ev = even;
    let mut aug_width = (width + usize::from(even)) >> 1;
    let mut oth_width = (width + usize::from(!even)) >> 1;

    let k = kernel.k();
    let k_inv = 1.0 / k;
    for sample in &mut aug.buf[aug.pre..aug.pre + aug_width] {
        *sample *= k;
    }
    for sample in &mut oth.buf[oth.pre..oth.pre + oth_width] {
        *sample *= k_inv;
    }

    let mut swapped = false;
    for step in kernel.steps() {
        let Some(a) = coefficient(step) else {
            continue;
        };
        oth.extend(oth_width);
        let sp = oth.pre + usize::from(!ev);
        for i in 0..aug_width {
            aug.buf[aug.pre + i] -= a * (oth.buf[sp + i - 1] + oth.buf[sp + i]);
        }

        std::mem::swap(&mut aug, &mut oth);
        ev = !ev;
        std::mem::swap(&mut aug_width, &mut oth_width);
        swapped = !swapped;
    }

    if swapped {
        std::mem::swap(&mut aug, &mut oth);
    }
    super::merge(&mut dst[..width], &aug, &oth, even);
}
