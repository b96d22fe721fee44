//! Arbitrary transformation kernels (ATK) and the kernel registry.
//!
//! Kernel indices 0 and 1 name the standard irreversible 9/7 and reversible
//! 5/3 kernels; they are synthesized on demand and never read from a stream.
//! Indices 2..=255 must be defined by an ATK segment before use.
//!
//! Only the subset of Part 2 kernels used by HTJ2K is accepted: whole-sample
//! symmetric filters, an even-indexed first reconstruction step, constant
//! boundary extension and exactly one coefficient per lifting step.

use super::OverrideList;
use crate::error::CodestreamError;
use crate::marker_code::MarkerCode;
use crate::stream_reader::StreamReader;
use crate::stream_writer::StreamWriter;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Kernel index of the standard irreversible 9/7 kernel.
pub const DWT_IRV97: u8 = 0;
/// Kernel index of the standard reversible 5/3 kernel.
pub const DWT_REV53: u8 = 1;

const SATK_WHOLE_SAMPLE: u16 = 0x0800;
const SATK_REVERSIBLE: u16 = 0x1000;
const SATK_M_INIT1: u16 = 0x2000;
const SATK_WS_EXTENSION: u16 = 0x4000;

/// Numeric encoding of kernel coefficients in the ATK segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum CoefficientType {
    Int8 = 0,
    Int16 = 1,
    Float32 = 2,
    Float64 = 3,
    Float128 = 4,
}

impl CoefficientType {
    fn byte_len(self) -> usize {
        match self {
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Float32 => 4,
            Self::Float64 => 8,
            Self::Float128 => 16,
        }
    }

    fn is_integer(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16)
    }
}

/// One single-tap lifting step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LiftingStep {
    /// `dst ±= (b + a * (s0 + s1)) >> e`
    Reversible { a: i16, b: i16, e: u8 },
    /// `dst ±= a * (s0 + s1)`
    Irreversible { a: f32 },
}

/// A lifting program: an ordered list of steps plus, for irreversible
/// kernels, the subband scaling factor K.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    satk: u16,
    k: f32,
    steps: Vec<LiftingStep>,
}

impl Kernel {
    /// The standard irreversible 9/7 kernel.
    pub fn irv97() -> Self {
        Self {
            satk: 0x4A00,
            k: 1.230174104914001_f64 as f32,
            steps: vec![
                LiftingStep::Irreversible {
                    a: 0.443506852043971_f64 as f32,
                },
                LiftingStep::Irreversible {
                    a: 0.882911075530934_f64 as f32,
                },
                LiftingStep::Irreversible {
                    a: -0.052980118572961_f64 as f32,
                },
                LiftingStep::Irreversible {
                    a: -1.586134342059924_f64 as f32,
                },
            ],
        }
    }

    /// The standard reversible 5/3 kernel.
    pub fn rev53() -> Self {
        Self {
            satk: 0x5801,
            k: 1.0,
            steps: vec![
                LiftingStep::Reversible { a: 1, b: 2, e: 2 },
                LiftingStep::Reversible { a: -1, b: 1, e: 1 },
            ],
        }
    }

    /// Builds a custom kernel for index 2..=255.
    ///
    /// Steps are given in signalling order: `steps[0]` is the last step
    /// applied by analysis and the first applied by synthesis.
    pub fn custom(
        index: u8,
        coefficient_type: CoefficientType,
        k: f32,
        steps: Vec<LiftingStep>,
    ) -> Result<Self, CodestreamError> {
        let invalid = |msg: &str| Err(CodestreamError::InvalidConfiguration(msg.to_string()));
        if index < 2 {
            return invalid("custom kernel indices start at 2");
        }
        if steps.is_empty() || steps.len() > 255 {
            return invalid("a kernel needs between 1 and 255 lifting steps");
        }
        let reversible = matches!(steps[0], LiftingStep::Reversible { .. });
        if reversible && !coefficient_type.is_integer() {
            return invalid("reversible kernels need integer coefficients");
        }
        for step in &steps {
            match (*step, reversible) {
                (LiftingStep::Reversible { a, .. }, true) => {
                    if coefficient_type == CoefficientType::Int8 && i8::try_from(a).is_err() {
                        return invalid("coefficient does not fit in 8 bits");
                    }
                }
                (LiftingStep::Irreversible { a }, false) => {
                    if !coefficient_fits(a, coefficient_type) {
                        return invalid("coefficient is not representable in its coefficient type");
                    }
                }
                _ => return invalid("reversible and irreversible steps cannot be mixed"),
            }
        }
        if !reversible && !coefficient_fits(k, coefficient_type) {
            return invalid("K is not representable in its coefficient type");
        }
        let satk = u16::from(index)
            | u16::from(u8::from(coefficient_type)) << 8
            | SATK_WHOLE_SAMPLE
            | if reversible { SATK_REVERSIBLE } else { 0 }
            | SATK_WS_EXTENSION;
        Ok(Self {
            satk,
            k: if reversible { 1.0 } else { k },
            steps,
        })
    }

    pub fn index(&self) -> u8 {
        (self.satk & 0xFF) as u8
    }

    pub fn coefficient_type(&self) -> Option<CoefficientType> {
        CoefficientType::try_from(((self.satk >> 8) & 0x7) as u8).ok()
    }

    pub fn is_reversible(&self) -> bool {
        self.satk & SATK_REVERSIBLE != 0
    }

    pub fn is_whole_sample(&self) -> bool {
        self.satk & SATK_WHOLE_SAMPLE != 0
    }

    pub fn is_m_init0(&self) -> bool {
        self.satk & SATK_M_INIT1 == 0
    }

    pub fn is_using_ws_extension(&self) -> bool {
        self.satk & SATK_WS_EXTENSION != 0
    }

    pub fn k(&self) -> f32 {
        self.k
    }

    pub fn steps(&self) -> &[LiftingStep] {
        &self.steps
    }

    pub fn num_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn write(&self, writer: &mut StreamWriter) {
        let ty = self.coefficient_type().unwrap_or(CoefficientType::Int8);
        let coeff = ty.byte_len();
        let per_step = if self.is_reversible() { 4 + coeff } else { 1 + coeff };
        let k_len = if self.is_reversible() { 0 } else { coeff };
        let latk = 2 + 2 + k_len + 1 + per_step * self.steps.len();

        writer.write_marker(MarkerCode::ArbitraryTransformKernel);
        writer.write_u16(latk as u16);
        writer.write_u16(self.satk);
        if !self.is_reversible() {
            write_float_coefficient(writer, ty, self.k);
        }
        writer.write_u8(self.steps.len() as u8);
        for step in &self.steps {
            match *step {
                LiftingStep::Reversible { a, b, e } => {
                    writer.write_u8(e);
                    writer.write_i16(b);
                    writer.write_u8(1);
                    if ty == CoefficientType::Int8 {
                        writer.write_i8(a as i8);
                    } else {
                        writer.write_i16(a);
                    }
                }
                LiftingStep::Irreversible { a } => {
                    writer.write_u8(1);
                    write_float_coefficient(writer, ty, a);
                }
            }
        }
    }

    /// Reads an ATK segment body; the marker code has already been consumed.
    pub fn read(reader: &mut StreamReader<'_>) -> Result<Self, CodestreamError> {
        let marker = MarkerCode::ArbitraryTransformKernel;
        let latk = reader.read_u16()? as usize;
        let start = reader.position();
        let satk = reader.read_u16()?;
        let index = (satk & 0xFF) as u8;
        if index < 2 {
            return Err(CodestreamError::malformed(
                marker,
                "ATK-Satk sets the kernel index to 0 or 1, which are reserved",
            ));
        }
        let mut kernel = Self {
            satk,
            k: 1.0,
            steps: Vec::new(),
        };
        let ty = kernel.coefficient_type().ok_or(CodestreamError::malformed(
            marker,
            "ATK-Satk specifies an unknown coefficient type",
        ))?;
        if !kernel.is_m_init0() {
            return Err(CodestreamError::unsupported(
                marker,
                "m_init of 1 (odd-indexed first reconstruction step)",
            ));
        }
        if !kernel.is_whole_sample() {
            return Err(CodestreamError::unsupported(marker, "ARB filters"));
        }
        if kernel.is_reversible() && !ty.is_integer() {
            return Err(CodestreamError::malformed(
                marker,
                "a reversible kernel cannot employ floating-point coefficients",
            ));
        }
        if !kernel.is_using_ws_extension() {
            return Err(CodestreamError::unsupported(
                marker,
                "boundary extension other than constant (whole-sample symmetric)",
            ));
        }
        if !kernel.is_reversible() {
            kernel.k = read_float_coefficient(reader, ty)?;
        }
        let natk = reader.read_u8()?;
        kernel.steps.reserve(natk as usize);
        for _ in 0..natk {
            let step = if kernel.is_reversible() {
                let e = reader.read_u8()?;
                let b = reader.read_i16()?;
                read_tap_count(reader)?;
                let a = match ty {
                    CoefficientType::Int8 => i16::from(reader.read_i8()?),
                    _ => reader.read_i16()?,
                };
                LiftingStep::Reversible { a, b, e }
            } else {
                read_tap_count(reader)?;
                LiftingStep::Irreversible {
                    a: read_float_coefficient(reader, ty)?,
                }
            };
            kernel.steps.push(step);
        }
        let consumed = reader.position() - start;
        if latk != consumed + 2 {
            return Err(CodestreamError::length(marker, latk, consumed + 2));
        }
        Ok(kernel)
    }
}

fn read_tap_count(reader: &mut StreamReader<'_>) -> Result<(), CodestreamError> {
    let marker = MarkerCode::ArbitraryTransformKernel;
    match reader.read_u8()? {
        0 => Err(CodestreamError::malformed(marker, "ATK-LCatk value of zero")),
        1 => Ok(()),
        _ => Err(CodestreamError::unsupported(
            marker,
            "multitap lifting steps (ATK-LCatk greater than 1)",
        )),
    }
}

fn coefficient_fits(value: f32, ty: CoefficientType) -> bool {
    match ty {
        CoefficientType::Int8 => value.fract() == 0.0 && (0.0..=255.0).contains(&value),
        CoefficientType::Int16 => value.fract() == 0.0 && (0.0..=65535.0).contains(&value),
        _ => value.is_finite(),
    }
}

fn read_float_coefficient(
    reader: &mut StreamReader<'_>,
    ty: CoefficientType,
) -> Result<f32, CodestreamError> {
    let value = match ty {
        CoefficientType::Int8 => f64::from(reader.read_u8()?),
        CoefficientType::Int16 => f64::from(reader.read_u16()?),
        CoefficientType::Float32 => f64::from(f32::from_bits(reader.read_u32()?)),
        CoefficientType::Float64 => f64::from_bits(reader.read_u64()?),
        CoefficientType::Float128 => {
            let high = reader.read_u64()?;
            let low = reader.read_u64()?;
            return Ok(truncate_to_f32(f128_to_f64(high, low)));
        }
    };
    Ok(value as f32)
}

/// Narrows to binary32 toward zero, so dropped mantissa bits never round up.
fn truncate_to_f32(value: f64) -> f32 {
    let narrowed = value as f32;
    if f64::from(narrowed).abs() > value.abs() {
        f32::from_bits(narrowed.to_bits() - 1)
    } else {
        narrowed
    }
}

fn write_float_coefficient(writer: &mut StreamWriter, ty: CoefficientType, value: f32) {
    match ty {
        CoefficientType::Int8 => writer.write_u8(value as u8),
        CoefficientType::Int16 => writer.write_u16(value as u16),
        CoefficientType::Float32 => writer.write_u32(value.to_bits()),
        CoefficientType::Float64 => writer.write_u64(f64::from(value).to_bits()),
        CoefficientType::Float128 => {
            let (high, low) = f64_to_f128(f64::from(value));
            writer.write_u64(high);
            writer.write_u64(low);
        }
    }
}

/// Narrows an IEEE binary128 value to binary64 by re-biasing the 15-bit
/// exponent and keeping the top 52 mantissa bits. The mantissa is truncated,
/// not rounded, and the exponent is masked rather than range-checked.
pub fn f128_to_f64(high: u64, low: u64) -> f64 {
    let sign = high & 0x8000_0000_0000_0000;
    let exponent = (((high >> 48) & 0x7FFF) as i64 - 16383 + 1023) & 0x7FF;
    let mantissa = ((high & 0x0000_FFFF_FFFF_FFFF) << 4) | (low >> 60);
    f64::from_bits(sign | (exponent as u64) << 52 | mantissa)
}

/// Widens a binary64 value to binary128, returned as (high, low) words.
pub fn f64_to_f128(value: f64) -> (u64, u64) {
    let bits = value.to_bits();
    let sign = bits & 0x8000_0000_0000_0000;
    let exponent = ((bits >> 52) & 0x7FF) as i64;
    let mantissa = bits & 0x000F_FFFF_FFFF_FFFF;
    if exponent == 0 && mantissa == 0 {
        return (sign, 0);
    }
    let exponent = ((exponent - 1023 + 16383) as u64) & 0x7FFF;
    (
        sign | exponent << 48 | mantissa >> 4,
        (mantissa & 0xF) << 60,
    )
}

/// Kernel registry: the standard kernels plus any kernels read from ATK
/// segments, keyed by kernel index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Atk {
    kernels: OverrideList<Kernel>,
}

impl Atk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: u8) -> Option<&Kernel> {
        self.kernels.get(u16::from(index))
    }

    /// Looks a kernel up, synthesizing the standard kernels on first use.
    pub fn resolve(&mut self, index: u8) -> Option<&Kernel> {
        let key = u16::from(index);
        if !self.kernels.contains(key) {
            match index {
                DWT_IRV97 => {
                    self.kernels.insert(key, Kernel::irv97());
                }
                DWT_REV53 => {
                    self.kernels.insert(key, Kernel::rev53());
                }
                _ => return None,
            }
        }
        self.kernels.get(key)
    }

    pub fn add(&mut self, kernel: Kernel) -> Result<(), CodestreamError> {
        let key = u16::from(kernel.index());
        if self.kernels.contains(key) {
            return Err(CodestreamError::InvalidConfiguration(format!(
                "kernel index {key} is already defined"
            )));
        }
        self.kernels.insert(key, kernel);
        Ok(())
    }

    pub fn read(&mut self, reader: &mut StreamReader<'_>) -> Result<(), CodestreamError> {
        let kernel = Kernel::read(reader)?;
        if self.kernels.contains(u16::from(kernel.index())) {
            return Err(CodestreamError::malformed(
                MarkerCode::ArbitraryTransformKernel,
                "ATK-Satk repeats a kernel index that is already defined",
            ));
        }
        self.kernels.insert(u16::from(kernel.index()), kernel);
        Ok(())
    }

    /// Writes every custom kernel; the standard kernels are never signalled.
    pub fn write(&self, writer: &mut StreamWriter) {
        for (_, kernel) in self.kernels.iter().filter(|(key, _)| *key >= 2) {
            kernel.write(writer);
        }
    }

    pub fn custom_kernels(&self) -> impl Iterator<Item = &Kernel> {
        self.kernels
            .iter()
            .filter(|(key, _)| *key >= 2)
            .map(|(_, kernel)| kernel)
    }

    pub fn clear(&mut self) {
        self.kernels.clear();
    }
}
