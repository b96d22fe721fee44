//! Quantization default (QCD) and quantization component (QCC) segments,
//! together with the derivation of step sizes from the coding configuration.
//!
//! Reversible coding signals one exponent byte per subband, `(exponent -
//! guard_bits) << 3`, sized from the BIBO gains of the transform. Irreversible
//! coding signals one `(exponent << 11) | mantissa` word per subband, scaled
//! from a base step size by the square-root energy gains.

use super::cod::{Cod, CodingStyle};
use super::dfs::DfsRecord;
use super::gains;
use super::siz::{MAX_BIT_DEPTH, Siz};
use super::{OverrideList, component_field_width};
use crate::error::CodestreamError;
use crate::marker_code::MarkerCode;
use crate::stream_reader::StreamReader;
use crate::stream_writer::StreamWriter;

/// Largest number of subbands a segment can describe: 1 + 3 * 32.
pub const MAX_SUBBANDS: usize = 97;

const STYLE_NO_QUANTIZATION: u8 = 0;
const STYLE_SCALAR_DERIVED: u8 = 1;
const STYLE_SCALAR_EXPOUNDED: u8 = 2;

/// One QCD or QCC record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuantizationRecord {
    sqcd: u8,
    /// Exponent bytes (reversible) or exponent/mantissa words (irreversible).
    step_sizes: Vec<u16>,
    base_delta: Option<f32>,
}

impl QuantizationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base step size for irreversible coding; the default is `2^-bit_depth`.
    pub fn set_delta(&mut self, delta: f32) -> Result<(), CodestreamError> {
        if !(delta.is_finite() && delta > 0.0) {
            return Err(CodestreamError::InvalidConfiguration(format!(
                "quantization step size must be positive, got {delta}"
            )));
        }
        self.base_delta = Some(delta);
        Ok(())
    }

    pub fn base_delta(&self) -> Option<f32> {
        self.base_delta
    }

    pub fn style(&self) -> u8 {
        self.sqcd & 0x1F
    }

    pub fn is_reversible(&self) -> bool {
        self.style() == STYLE_NO_QUANTIZATION
    }

    pub fn num_guard_bits(&self) -> u32 {
        u32::from(self.sqcd >> 5)
    }

    pub fn num_subbands(&self) -> usize {
        self.step_sizes.len()
    }

    pub fn step_sizes(&self) -> &[u16] {
        &self.step_sizes
    }

    /// Derives reversible exponents for a `num_decomps`-level transform of a
    /// `bit_depth`-bit component, with one extra bit when the component goes
    /// through the reversible colour transform.
    pub fn set_rev_quant(
        &mut self,
        num_decomps: u32,
        bit_depth: u32,
        color_transform: bool,
    ) -> Result<(), CodestreamError> {
        let b = bit_depth + u32::from(color_transform);
        let bits = |g1: f32, g2: f32| {
            let product = f64::from(g1) * f64::from(g2);
            b + (product.ln() / std::f64::consts::LN_2).ceil() as u32
        };

        let mut exponents = Vec::with_capacity(1 + 3 * num_decomps as usize);
        let bibo_l = gains::bibo_gain_l(num_decomps, true);
        exponents.push(bits(bibo_l, bibo_l));
        for d in (1..=num_decomps).rev() {
            let bibo_l = gains::bibo_gain_l(d, true);
            let bibo_h = gains::bibo_gain_h(d - 1, true);
            let hl = bits(bibo_h, bibo_l);
            exponents.extend([hl, hl, bits(bibo_h, bibo_h)]);
        }

        let max_bits = exponents.iter().copied().max().unwrap_or(b);
        if max_bits > MAX_BIT_DEPTH {
            return Err(CodestreamError::PrecisionOverflow { bits: max_bits });
        }
        let guard_bits = max_bits.saturating_sub(31).max(1);
        self.sqcd = (guard_bits << 5) as u8;
        self.step_sizes = exponents
            .into_iter()
            .map(|e| ((e - guard_bits) << 3) as u16)
            .collect();
        Ok(())
    }

    /// Derives irreversible step sizes from the base step size, which must
    /// already be set.
    pub fn set_irrev_quant(&mut self, num_decomps: u32) -> Result<(), CodestreamError> {
        let base_delta = self.base_delta.ok_or_else(|| {
            CodestreamError::InvalidConfiguration(
                "irreversible quantization needs a base step size".into(),
            )
        })?;
        self.sqcd = (1 << 5) | STYLE_SCALAR_EXPOUNDED;
        self.step_sizes.clear();
        self.step_sizes.reserve(1 + 3 * num_decomps as usize);

        let gain_l = gains::sqrt_energy_gain_l(num_decomps, false);
        self.step_sizes
            .push(encode_irrev_delta(base_delta / (gain_l * gain_l))?);
        for d in (1..=num_decomps).rev() {
            let gain_l = gains::sqrt_energy_gain_l(d, false);
            let gain_h = gains::sqrt_energy_gain_h(d - 1, false);
            let hl = encode_irrev_delta(base_delta / (gain_l * gain_h))?;
            let hh = encode_irrev_delta(base_delta / (gain_h * gain_h))?;
            self.step_sizes.extend([hl, hl, hh]);
        }
        Ok(())
    }

    fn subband_slot(
        &self,
        dfs: Option<&DfsRecord>,
        num_decompositions: u32,
        resolution: u32,
        subband: u32,
    ) -> usize {
        let idx = match dfs {
            Some(record) => record.subband_index(num_decompositions, resolution, subband),
            None if resolution == 0 => 0,
            None => (resolution - 1) * 3 + subband,
        } as usize;
        let count = self.num_subbands();
        if idx >= count {
            linfo!(
                "Trying to access quantization step size for subband {} when the QCD/QCC \
                 marker segment specifies quantization step sizes for {} subbands only; \
                 using the step size for subband {}, which can produce incorrect results",
                idx + 1,
                count,
                count.max(1) - 1
            );
            return count.saturating_sub(1);
        }
        idx
    }

    /// Number of magnitude bit planes of a subband, including guard bits.
    pub fn kmax(
        &self,
        dfs: Option<&DfsRecord>,
        num_decompositions: u32,
        resolution: u32,
        subband: u32,
    ) -> u32 {
        let slot = self.subband_slot(dfs, num_decompositions, resolution, subband);
        let Some(&value) = self.step_sizes.get(slot) else {
            return self.num_guard_bits();
        };
        self.magnitude_bits(value) + self.num_guard_bits()
    }

    pub fn largest_kmax(&self) -> u32 {
        let bits = self
            .step_sizes
            .iter()
            .map(|&value| self.magnitude_bits(value))
            .max()
            .unwrap_or(0);
        bits + self.num_guard_bits()
    }

    fn magnitude_bits(&self, value: u16) -> u32 {
        if self.is_reversible() {
            u32::from(value >> 3).saturating_sub(1)
        } else {
            u32::from(value >> 11).saturating_sub(1)
        }
    }

    /// Step size of an irreversible subband, relative to a unit dynamic range.
    pub fn irrev_delta(
        &self,
        dfs: Option<&DfsRecord>,
        num_decompositions: u32,
        resolution: u32,
        subband: u32,
    ) -> f32 {
        const NOMINAL_RANGE: [f32; 4] = [1.0, 2.0, 2.0, 4.0];
        let slot = self.subband_slot(dfs, num_decompositions, resolution, subband);
        let Some(&value) = self.step_sizes.get(slot) else {
            return 0.0;
        };
        let eps = i32::from(value >> 11);
        let mantissa = f32::from((value & 0x7FF) | 0x800) * NOMINAL_RANGE[(subband & 3) as usize];
        mantissa / 2048.0 / 2f32.powi(eps)
    }

    /// Largest number of magnitude bits over all subbands.
    fn magb(&self) -> u32 {
        let guard = i64::from(self.num_guard_bits());
        let num_decomps = self.num_subbands().saturating_sub(1) as i64 / 3;
        let mut b = 0i64;
        for (i, &value) in self.step_sizes.iter().enumerate() {
            let t = if self.is_reversible() {
                i64::from(value >> 3) + guard - 1
            } else {
                let level = num_decomps - if i == 0 { 0 } else { (i as i64 - 1) / 3 };
                i64::from(value >> 11) + guard - level
            };
            b = b.max(t);
        }
        b as u32
    }

    fn segment_length(&self, header: usize) -> usize {
        let per_subband = if self.is_reversible() { 1 } else { 2 };
        header + per_subband * self.num_subbands()
    }

    fn write_body(&self, writer: &mut StreamWriter) {
        writer.write_u8(self.sqcd);
        for &value in &self.step_sizes {
            if self.is_reversible() {
                writer.write_u8(value as u8);
            } else {
                writer.write_u16(value);
            }
        }
    }

    /// Reads Sqcd and the step sizes; `header` is the fixed part of the
    /// declared length (3 for QCD, 4 or 5 for QCC).
    fn read_body(
        reader: &mut StreamReader<'_>,
        marker: MarkerCode,
        declared: usize,
        header: usize,
    ) -> Result<Self, CodestreamError> {
        let sqcd = reader.read_u8()?;
        let payload = declared.saturating_sub(header);
        let (count, width) = match sqcd & 0x1F {
            STYLE_NO_QUANTIZATION => (payload, 1),
            STYLE_SCALAR_DERIVED => {
                return Err(CodestreamError::unsupported(
                    marker,
                    "scalar derived quantization",
                ));
            }
            STYLE_SCALAR_EXPOUNDED => (payload / 2, 2),
            _ => return Err(CodestreamError::malformed(marker, "wrong Sqcd value")),
        };
        if count > MAX_SUBBANDS || declared != header + width * count {
            return Err(CodestreamError::length(
                marker,
                declared,
                header + width * count.min(MAX_SUBBANDS),
            ));
        }
        let mut step_sizes = Vec::with_capacity(count);
        for _ in 0..count {
            step_sizes.push(if width == 1 {
                u16::from(reader.read_u8()?)
            } else {
                reader.read_u16()?
            });
        }
        Ok(Self {
            sqcd,
            step_sizes,
            base_delta: None,
        })
    }
}

/// Encodes a step size as a 5-bit exponent and an 11-bit mantissa with an
/// implicit leading one.
fn encode_irrev_delta(delta: f32) -> Result<u16, CodestreamError> {
    let mut delta = delta;
    let mut exp = 0u32;
    while delta < 1.0 {
        exp += 1;
        delta *= 2.0;
        if exp > 31 {
            return Err(CodestreamError::InvalidConfiguration(
                "quantization step size is too small to be signalled".into(),
            ));
        }
    }
    let mantissa = ((delta * 2048.0).round() as i32 - 2048).min(0x7FF);
    Ok(((exp << 11) as u16) | mantissa as u16)
}

/// Derives a record for one component from its coding style.
fn derive(
    record: &mut QuantizationRecord,
    style: &CodingStyle,
    num_decomps: u32,
    bit_depth: u32,
    color_transform: bool,
) -> Result<(), CodestreamError> {
    if style.wavelet_kernel() > 1 {
        lwarn!(
            "Quantization for wavelet kernel {} uses the gains of the standard kernel \
             with the same reversibility",
            style.wavelet_kernel()
        );
    }
    if style.is_reversible() {
        record.set_rev_quant(num_decomps, bit_depth, color_transform)
    } else {
        if record.base_delta.is_none() {
            record.base_delta = Some(1.0 / 2f32.powi(bit_depth as i32));
        }
        record.set_irrev_quant(num_decomps)
    }
}

/// QCD plus its QCC overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Qcd {
    main: QuantizationRecord,
    overrides: OverrideList<QuantizationRecord>,
}

impl Qcd {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn main(&self) -> &QuantizationRecord {
        &self.main
    }

    pub fn resolve(&self, comp: u16) -> &QuantizationRecord {
        self.overrides.get(comp).unwrap_or(&self.main)
    }

    pub fn resolve_mut(&mut self, comp: u16) -> &mut QuantizationRecord {
        self.overrides
            .get_or_insert_with(comp, QuantizationRecord::new)
    }

    pub fn add_override(&mut self, comp: u16) -> &mut QuantizationRecord {
        self.overrides.insert(comp, QuantizationRecord::new())
    }

    pub fn has_override(&self, comp: u16) -> bool {
        self.overrides.contains(comp)
    }

    pub fn overrides(&self) -> impl Iterator<Item = (u16, &QuantizationRecord)> {
        self.overrides.iter()
    }

    pub fn set_delta(&mut self, delta: f32) -> Result<(), CodestreamError> {
        self.main.set_delta(delta)
    }

    /// Sets the base step size of one component, creating its QCC.
    pub fn set_component_delta(&mut self, comp: u16, delta: f32) -> Result<(), CodestreamError> {
        self.resolve_mut(comp).set_delta(delta)
    }

    /// Fills in step sizes for every component from SIZ and COD.
    ///
    /// The QCD is configured from the default coding style and the first
    /// component without a QCC. Components the QCD cannot describe receive a
    /// QCC; existing QCCs are refreshed.
    pub fn check_validity(&mut self, siz: &Siz, cod: &Cod) -> Result<(), CodestreamError> {
        let num_comps = siz.num_components();
        self.trim(num_comps);

        let signature = |c: u16| {
            (
                cod.component_num_decompositions(c),
                siz.bit_depth(c),
                siz.is_signed(c),
                cod.resolve(c).wavelet_kernel(),
            )
        };

        let mut all_same = true;
        let mut other_comps_exist = false;
        let mut first_comp = None;
        for c in 0..num_comps {
            if self.overrides.contains(c) {
                other_comps_exist = true;
                continue;
            }
            match first_comp {
                None => first_comp = Some((c, signature(c))),
                Some((_, first)) => all_same &= first == signature(c),
            }
        }

        let qcd_comp = first_comp.map_or(0, |(c, _)| c);
        let color_transform = cod.is_using_color_transform();
        let main_signature = (
            cod.num_decompositions(),
            siz.bit_depth(qcd_comp),
            siz.is_signed(qcd_comp),
            cod.main().wavelet_kernel(),
        );
        derive(
            &mut self.main,
            cod.main(),
            main_signature.0,
            main_signature.1,
            qcd_comp < 3 && color_transform,
        )?;

        for c in 0..num_comps {
            let refresh = if !all_same {
                signature(c) != main_signature
            } else {
                other_comps_exist && self.overrides.contains(c)
            };
            if !refresh {
                continue;
            }
            let record = self.resolve_mut(c);
            derive(
                record,
                cod.resolve(c),
                cod.component_num_decompositions(c),
                siz.bit_depth(c),
                c < 3 && color_transform,
            )?;
        }
        Ok(())
    }

    /// Largest magnitude bit count over the QCD and all QCCs.
    pub fn magb(&self) -> u32 {
        self.overrides
            .iter()
            .map(|(_, record)| record.magb())
            .fold(self.main.magb(), u32::max)
    }

    /// Bit depth the block coder needs for `comp`: the largest Kmax over the
    /// colour-transformed components, or over `comp` alone, plus the sign bit
    /// and one bit of headroom.
    pub fn propose_precision(&self, comp: u16, cod: &Cod) -> u32 {
        let precision = if cod.is_using_color_transform() && comp < 3 {
            (0..3)
                .map(|c| self.resolve(c).largest_kmax())
                .max()
                .unwrap_or(0)
        } else {
            self.resolve(comp).largest_kmax()
        };
        precision + 2
    }

    pub fn write(&self, writer: &mut StreamWriter) {
        writer.write_marker(MarkerCode::QuantizationDefault);
        writer.write_u16(self.main.segment_length(3) as u16);
        self.main.write_body(writer);
    }

    pub fn write_qcc(&self, writer: &mut StreamWriter, num_comps: u16) {
        let field = component_field_width(num_comps);
        for (comp, record) in self.overrides.iter().filter(|(c, _)| *c < num_comps) {
            writer.write_marker(MarkerCode::QuantizationComponent);
            writer.write_u16(record.segment_length(3 + field) as u16);
            if field == 1 {
                writer.write_u8(comp as u8);
            } else {
                writer.write_u16(comp);
            }
            record.write_body(writer);
        }
    }

    pub fn read(&mut self, reader: &mut StreamReader<'_>) -> Result<(), CodestreamError> {
        let lqcd = reader.read_u16()? as usize;
        self.main =
            QuantizationRecord::read_body(reader, MarkerCode::QuantizationDefault, lqcd, 3)?;
        Ok(())
    }

    /// Reads a QCC segment body and returns the component it belongs to.
    pub fn read_qcc(
        &mut self,
        reader: &mut StreamReader<'_>,
        num_comps: u16,
    ) -> Result<u16, CodestreamError> {
        let lqcc = reader.read_u16()? as usize;
        let field = component_field_width(num_comps);
        let comp = if field == 1 {
            u16::from(reader.read_u8()?)
        } else {
            reader.read_u16()?
        };
        let record = QuantizationRecord::read_body(
            reader,
            MarkerCode::QuantizationComponent,
            lqcc,
            3 + field,
        )?;
        if self.overrides.contains(comp) {
            return Err(CodestreamError::malformed(
                MarkerCode::QuantizationComponent,
                "more than one QCC segment for the same component",
            ));
        }
        self.overrides.insert(comp, record);
        Ok(comp)
    }

    /// Drops QCCs of components that no longer exist.
    pub fn trim(&mut self, num_comps: u16) {
        for comp in self.overrides.trim(u32::from(num_comps)) {
            linfo!(
                "Removing the quantization override of component {}, which does not exist; \
                 the image has {} components",
                comp,
                num_comps
            );
        }
    }

    pub fn clear(&mut self) {
        self.main = QuantizationRecord::default();
        self.overrides.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Point;

    fn image(num_comps: u16, bit_depth: u32) -> Siz {
        let mut siz = Siz::new();
        siz.set_image_extent(Point::new(512, 512));
        siz.set_num_components(num_comps).unwrap();
        for c in 0..num_comps {
            siz.set_component(c, Point::new(1, 1), bit_depth, false)
                .unwrap();
        }
        siz
    }

    #[test]
    fn test_reversible_five_levels() {
        let siz = image(1, 8);
        let mut cod = Cod::new();
        cod.set_reversible(true);
        let mut qcd = Qcd::new();
        qcd.check_validity(&siz, &cod).unwrap();

        let main = qcd.main();
        assert!(main.is_reversible());
        assert_eq!(main.num_subbands(), 16);
        assert_eq!(main.num_guard_bits(), 1);
        // LL5: 8 + ceil(log2(1.7067^2)) = 10; stored minus one guard bit.
        assert_eq!(main.step_sizes()[0], 9 << 3);
        // HH1: 8 + ceil(log2(2.0^2)) = 10.
        assert_eq!(main.step_sizes()[15], 9 << 3);
        assert_eq!(qcd.magb(), 10);
    }

    #[test]
    fn test_reversible_precision_overflow() {
        let mut record = QuantizationRecord::new();
        assert!(matches!(
            record.set_rev_quant(5, 37, true),
            Err(CodestreamError::PrecisionOverflow { bits }) if bits > 38
        ));
        // HH5: 32 + ceil(log2(2.8198^2)) = 35 -> 4 guard bits.
        record.set_rev_quant(5, 32, false).unwrap();
        assert_eq!(record.num_guard_bits(), 4);
    }

    #[test]
    fn test_guard_bits_monotone_in_bit_depth() {
        let mut previous = (0, vec![0u16; 16]);
        for bit_depth in 1..=30 {
            let mut record = QuantizationRecord::new();
            record.set_rev_quant(5, bit_depth, false).unwrap();
            let exponents: Vec<u16> = record
                .step_sizes()
                .iter()
                .map(|v| (v >> 3) + record.num_guard_bits() as u16)
                .collect();
            assert!(record.num_guard_bits() >= previous.0);
            assert!(exponents.iter().zip(&previous.1).all(|(a, b)| a >= b));
            assert!(record.magb() + 1 <= MAX_BIT_DEPTH);
            previous = (record.num_guard_bits(), exponents);
        }
    }

    #[test]
    fn test_irreversible_default_delta() {
        let siz = image(1, 8);
        let cod = Cod::new();
        let mut qcd = Qcd::new();
        qcd.check_validity(&siz, &cod).unwrap();

        let main = qcd.main();
        assert_eq!(main.style(), 2);
        assert_eq!(main.num_guard_bits(), 1);
        assert_eq!(main.num_subbands(), 16);
        assert_eq!(main.base_delta(), Some(1.0 / 256.0));
        // LL5: (1/256) / 5.8245^2 lies in [2^-14, 2^-13).
        assert_eq!(main.step_sizes()[0] >> 11, 14);

        let delta = main.irrev_delta(None, 5, 0, 0);
        let expected = 1.0 / 256.0 / (5.8245f32 * 5.8245);
        assert!((delta - expected).abs() / expected < 1e-3);
    }

    #[test]
    fn test_kmax_clamps_subband_index() {
        let mut record = QuantizationRecord::new();
        record.set_rev_quant(2, 8, false).unwrap();
        assert_eq!(record.num_subbands(), 7);
        let last = record.kmax(None, 2, 2, 3);
        assert_eq!(record.kmax(None, 5, 5, 3), last);
        assert_eq!(record.largest_kmax(), record.magb());
    }

    #[test]
    fn test_divergent_components_get_qcc() {
        let mut siz = image(3, 8);
        siz.set_component(2, Point::new(1, 1), 12, false).unwrap();
        let mut cod = Cod::new();
        cod.set_reversible(true);
        let mut qcd = Qcd::new();
        qcd.check_validity(&siz, &cod).unwrap();

        assert!(!qcd.has_override(0));
        assert!(!qcd.has_override(1));
        assert!(qcd.has_override(2));
        assert_eq!(qcd.resolve(2).step_sizes()[0], 13 << 3);
        assert!(qcd.propose_precision(2, &cod) > qcd.propose_precision(0, &cod));
    }

    #[test]
    fn test_existing_qcc_refreshed_and_trimmed() {
        let siz = image(2, 8);
        let cod = Cod::new();
        let mut qcd = Qcd::new();
        qcd.set_component_delta(1, 0.5).unwrap();
        qcd.set_component_delta(4, 0.5).unwrap();
        qcd.check_validity(&siz, &cod).unwrap();

        assert!(!qcd.has_override(4));
        let qcc = qcd.resolve(1);
        assert_eq!(qcc.num_subbands(), 16);
        assert_eq!(qcc.base_delta(), Some(0.5));
        assert_ne!(qcc.step_sizes(), qcd.main().step_sizes());
    }

    #[test]
    fn test_qcc_roundtrip() {
        for num_comps in [256u16, 257] {
            let siz = image(num_comps, 10);
            let cod = Cod::new();
            let mut qcd = Qcd::new();
            qcd.set_component_delta(num_comps - 1, 0.25).unwrap();
            qcd.check_validity(&siz, &cod).unwrap();

            let mut writer = StreamWriter::new();
            qcd.write(&mut writer);
            qcd.write_qcc(&mut writer, num_comps);
            let bytes = writer.into_bytes();

            let mut reader = StreamReader::new(&bytes);
            let mut parsed = Qcd::new();
            assert_eq!(reader.read_u16().unwrap(), 0xFF5C);
            parsed.read(&mut reader).unwrap();
            assert_eq!(reader.read_u16().unwrap(), 0xFF5D);
            parsed.read_qcc(&mut reader, num_comps).unwrap();
            assert!(reader.is_empty());
            assert_eq!(parsed.main().step_sizes(), qcd.main().step_sizes());
            assert_eq!(
                parsed.resolve(num_comps - 1).step_sizes(),
                qcd.resolve(num_comps - 1).step_sizes()
            );
        }
    }

    #[test]
    fn test_read_rejects_bad_segments() {
        // scalar derived
        let mut reader = StreamReader::new(&[0x00, 0x05, 0x21, 0x00, 0x00]);
        assert!(matches!(
            Qcd::new().read(&mut reader),
            Err(CodestreamError::Unsupported { .. })
        ));
        // odd payload for 16-bit steps
        let mut reader = StreamReader::new(&[0x00, 0x06, 0x22, 0x00, 0x00, 0x00]);
        assert!(matches!(
            Qcd::new().read(&mut reader),
            Err(CodestreamError::LengthMismatch { .. })
        ));
        // reserved style
        let mut reader = StreamReader::new(&[0x00, 0x04, 0x23, 0x00]);
        assert!(matches!(
            Qcd::new().read(&mut reader),
            Err(CodestreamError::Malformed { .. })
        ));
    }
}
