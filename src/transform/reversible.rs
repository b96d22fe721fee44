//! Integer lifting for reversible kernels, generic over 32- and 64-bit
//! samples.

use super::line_buf::Lane;
use crate::params::{Kernel, LiftingStep};
use std::ops::{Add, AddAssign, Mul, Shl, Shr, Sub, SubAssign};

pub(crate) trait RevSample:
    Copy
    + From<i16>
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Shr<u8, Output = Self>
    + Shl<u8, Output = Self>
    + AddAssign
    + SubAssign
{
}

impl RevSample for i32 {}
impl RevSample for i64 {}

/// A reversible step reduced to the cheapest of its equivalent forms.
#[derive(Clone, Copy)]
enum StepForm<T> {
    /// a = 1, the 5/3 update and its relatives.
    PlusOne { b: T, e: u8 },
    /// a = -1, b = 1, e = 1, the 5/3 predict.
    Predict,
    /// a = -1 otherwise.
    MinusOne { b: T, e: u8 },
    General { a: T, b: T, e: u8 },
}

impl<T: RevSample> StepForm<T> {
    fn new(step: &LiftingStep) -> Option<Self> {
        let LiftingStep::Reversible { a, b, e } = *step else {
            return None;
        };
        Some(match (a, b, e) {
            (1, b, e) => Self::PlusOne { b: b.into(), e },
            (-1, 1, 1) => Self::Predict,
            (-1, b, e) => Self::MinusOne { b: b.into(), e },
            (a, b, e) => Self::General {
                a: a.into(),
                b: b.into(),
                e,
            },
        })
    }

    #[inline]
    fn analyze(self, dst: &mut T, sum: T) {
        match self {
            Self::PlusOne { b, e } => *dst += (b + sum) >> e,
            Self::Predict => *dst -= sum >> 1,
            Self::MinusOne { b, e } => *dst += (b - sum) >> e,
            Self::General { a, b, e } => *dst += (b + a * sum) >> e,
        }
    }

    #[inline]
    fn synthesize(self, dst: &mut T, sum: T) {
        match self {
            Self::PlusOne { b, e } => *dst -= (b + sum) >> e,
            Self::Predict => *dst += sum >> 1,
            Self::MinusOne { b, e } => *dst -= (b - sum) >> e,
            Self::General { a, b, e } => *dst -= (b + a * sum) >> e,
        }
    }
}

/// `aug[i] ±= (b + a * (sig[i] + other[i])) >> e` over `repeat` samples.
pub(crate) fn vert_step<T: RevSample>(
    step: &LiftingStep,
    sig: &[T],
    other: &[T],
    aug: &mut [T],
    repeat: usize,
    synthesis: bool,
) {
    let Some(form) = StepForm::<T>::new(step) else {
        return;
    };
    let lines = aug.iter_mut().zip(sig).zip(other).take(repeat);
    if synthesis {
        for ((dst, &s0), &s1) in lines {
            form.synthesize(dst, s0 + s1);
        }
    } else {
        for ((dst, &s0), &s1) in lines {
            form.analyze(dst, s0 + s1);
        }
    }
}

/// Splits `src` into low and high halves and runs the kernel's steps in
/// reverse order.
pub(crate) fn horz_ana<T: RevSample>(
    kernel: &Kernel,
    low: Lane<'_, T>,
    high: Lane<'_, T>,
    src: &[T],
    width: usize,
    even: bool,
) {
    let (mut lp, mut hp) = (low, high);
    if width == 1 {
        if even {
            lp.buf[lp.pre] = src[0];
        } else {
            hp.buf[hp.pre] = src[0] << 1;
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
        let Some(form) = StepForm::<T>::new(step) else {
            continue;
        };
        lp.extend(l_width);
        let sp = lp.pre + usize::from(even);
        for i in 0..h_width {
            let sum = lp.buf[sp + i - 1] + lp.buf[sp + i];
            form.analyze(&mut hp.buf[hp.pre + i], sum);
        }

        std::mem::swap(&mut lp, &mut hp);
        even = !even;
        std::mem::swap(&mut l_width, &mut h_width);
    }
}

/// Runs the kernel's steps in order over the low and high halves, then
/// interleaves them into `dst`.
pub(crate) fn horz_syn<T: RevSample>(
    kernel: &Kernel,
    dst: &mut [T],
    low: Lane<'_, T>,
    high: Lane<'_, T>,
    width: usize,
    even: bool,
) {
    let (mut aug, mut oth) = (low, high);
    if width == 1 {
        dst[0] = if even {
            aug.buf[aug.pre]
        } else {
            oth.buf[oth.pre] >> 1
        };
        return;
    }
    if width == 0 {
        return;
    }

    let mut ev = even;
    let mut aug_width = (width + usize::from(even)) >> 1;
    let mut oth_width = (width + usize::from(!even)) >> 1;
    let mut swapped = false;
    for step in kernel.steps() {
        let Some(form) = StepForm::<T>::new(step) else {
            continue;
        };
        oth.extend(oth_width);
        let sp = oth.pre + usize::from(!ev);
        for i in 0..aug_width {
            let sum = oth.buf[sp + i - 1] + oth.buf[sp + i];
            form.synthesize(&mut aug.buf[aug.pre + i], sum);
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
