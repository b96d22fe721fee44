//! Non-linearity point transformation (NLT) segment.
//!
//! Records are keyed by component; component 65535 is the record that applies
//! to every component without a record of its own.

use super::OverrideList;
use super::siz::{MAX_BIT_DEPTH, RSIZ_EXT_FLAG, RSIZ_NLT_FLAG, Siz};
use crate::error::CodestreamError;
use crate::marker_code::MarkerCode;
use crate::stream_reader::StreamReader;
use crate::stream_writer::StreamWriter;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Cnlt value addressing all components.
pub const ALL_COMPS: u16 = 65535;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum NonlinearityType {
    #[default]
    NoNlt = 0,
    /// Binary complement to sign-magnitude conversion.
    BinaryComplement = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct NltRecord {
    bd_nlt: u8,
    tnlt: NonlinearityType,
    enabled: bool,
}

impl NltRecord {
    fn set_bit_depth(&mut self, siz: &Siz, comp: u16) {
        let depth = siz.bit_depth(comp).saturating_sub(1) as u8;
        self.bd_nlt = depth | if siz.is_signed(comp) { 0x80 } else { 0 };
    }

    fn write(&self, writer: &mut StreamWriter, cnlt: u16) {
        writer.write_marker(MarkerCode::Nonlinearity);
        writer.write_u16(6);
        writer.write_u16(cnlt);
        writer.write_u8(self.bd_nlt);
        writer.write_u8(self.tnlt.into());
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nlt {
    all: NltRecord,
    components: OverrideList<NltRecord>,
}

impl Nlt {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_mut(&mut self, comp: u16) -> &mut NltRecord {
        if comp == ALL_COMPS {
            &mut self.all
        } else {
            self.components
                .get_or_insert_with(comp, NltRecord::default)
        }
    }

    /// Requests a non-linearity for one component, or for all components
    /// with [`ALL_COMPS`].
    pub fn set_nonlinear_transform(&mut self, comp: u16, nl_type: NonlinearityType) {
        let record = self.record_mut(comp);
        record.tnlt = nl_type;
        record.enabled = true;
    }

    /// Returns `(bit_depth, is_signed, type)` of the transform in effect for
    /// `comp`, if any.
    pub fn get_nonlinear_transform(&self, comp: u16) -> Option<(u32, bool, NonlinearityType)> {
        let record = self
            .components
            .get(comp)
            .filter(|record| record.enabled)
            .unwrap_or(&self.all);
        record.enabled.then(|| {
            let bit_depth = (u32::from(record.bd_nlt & 0x7F) + 1).min(MAX_BIT_DEPTH);
            (bit_depth, record.bd_nlt & 0x80 != 0, record.tnlt)
        })
    }

    pub fn is_any_enabled(&self) -> bool {
        self.all.enabled || self.components.iter().any(|(_, record)| record.enabled)
    }

    /// Fills in bit depths from SIZ, splits the all-components record when
    /// the components it covers differ, and flags the extension in Rsiz.
    pub fn check_validity(&mut self, siz: &mut Siz) {
        if !self.is_any_enabled() {
            return;
        }
        if self.all.enabled && self.all.tnlt == NonlinearityType::NoNlt {
            self.all.enabled = false;
        }

        let num_comps = siz.num_components();
        if self.all.enabled {
            let mut all_same = true;
            let mut first = None;
            for c in 0..num_comps {
                match self.components.get_mut(c).filter(|record| record.enabled) {
                    Some(record) => record.set_bit_depth(siz, c),
                    None => {
                        let current = (siz.bit_depth(c), siz.is_signed(c));
                        match first {
                            None => first = Some((c, current)),
                            Some((_, seen)) => all_same &= seen == current,
                        }
                    }
                }
            }

            if !all_same {
                self.all.enabled = false;
                for c in 0..num_comps {
                    let record = self
                        .components
                        .get_or_insert_with(c, NltRecord::default);
                    if !record.enabled {
                        record.enabled = true;
                        record.tnlt = NonlinearityType::BinaryComplement;
                        record.set_bit_depth(siz, c);
                    }
                }
            } else if let Some((c, _)) = first {
                self.all.set_bit_depth(siz, c);
            }
        } else {
            for c in 0..num_comps {
                if let Some(record) = self.components.get_mut(c).filter(|r| r.enabled) {
                    record.set_bit_depth(siz, c);
                }
            }
        }

        self.trim(num_comps);
        if self.is_any_enabled() {
            siz.set_rsiz_flag(RSIZ_EXT_FLAG | RSIZ_NLT_FLAG);
        }
    }

    /// Drops records of components that no longer exist.
    pub fn trim(&mut self, num_comps: u16) {
        for comp in self.components.trim(u32::from(num_comps)) {
            linfo!(
                "The NLT marker segment for the non-existing component {} has been removed",
                comp
            );
        }
    }

    pub fn write(&self, writer: &mut StreamWriter) {
        if self.all.enabled {
            self.all.write(writer, ALL_COMPS);
        }
        for (comp, record) in self.components.iter().filter(|(_, r)| r.enabled) {
            record.write(writer, comp);
        }
    }

    pub fn read(&mut self, reader: &mut StreamReader<'_>) -> Result<(), CodestreamError> {
        let marker = MarkerCode::Nonlinearity;
        let lnlt = reader.read_u16()? as usize;
        let cnlt = reader.read_u16()?;
        let bd_nlt = reader.read_u8()?;
        let tnlt = reader.read_u8()?;
        if lnlt != 6 {
            return Err(CodestreamError::length(marker, lnlt, 6));
        }
        let tnlt = NonlinearityType::try_from(tnlt).map_err(|_| {
            CodestreamError::unsupported(
                marker,
                "non-linearities other than type 0 or type 3 (binary complement)",
            )
        })?;
        *self.record_mut(cnlt) = NltRecord {
            bd_nlt,
            tnlt,
            enabled: true,
        };
        Ok(())
    }

    pub fn clear(&mut self) {
        self.all = NltRecord::default();
        self.components.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Point;

    fn image(depths: &[(u32, bool)]) -> Siz {
        let mut siz = Siz::new();
        siz.set_image_extent(Point::new(16, 16));
        siz.set_num_components(depths.len() as u16).unwrap();
        for (c, &(depth, signed)) in depths.iter().enumerate() {
            siz.set_component(c as u16, Point::new(1, 1), depth, signed)
                .unwrap();
        }
        siz
    }

    #[test]
    fn test_all_components_record() {
        let mut siz = image(&[(12, true), (12, true)]);
        let mut nlt = Nlt::new();
        nlt.set_nonlinear_transform(ALL_COMPS, NonlinearityType::BinaryComplement);
        nlt.check_validity(&mut siz);

        assert_eq!(
            nlt.get_nonlinear_transform(1),
            Some((12, true, NonlinearityType::BinaryComplement))
        );
        assert_ne!(siz.rsiz() & RSIZ_NLT_FLAG, 0);
        let mut writer = StreamWriter::new();
        nlt.write(&mut writer);
        assert_eq!(
            writer.as_bytes(),
            &[0xFF, 0x76, 0x00, 0x06, 0xFF, 0xFF, 0x8B, 0x03]
        );
    }

    #[test]
    fn test_mixed_components_split() {
        let mut siz = image(&[(8, false), (10, true), (8, false)]);
        let mut nlt = Nlt::new();
        nlt.set_nonlinear_transform(ALL_COMPS, NonlinearityType::BinaryComplement);
        nlt.check_validity(&mut siz);

        assert!(!nlt.all.enabled);
        for c in 0..3 {
            assert!(nlt.components.get(c).is_some_and(|r| r.enabled));
        }
        assert_eq!(
            nlt.get_nonlinear_transform(1),
            Some((10, true, NonlinearityType::BinaryComplement))
        );
    }

    #[test]
    fn test_no_nlt_default_is_disabled() {
        let mut siz = image(&[(8, false)]);
        let mut nlt = Nlt::new();
        nlt.set_nonlinear_transform(ALL_COMPS, NonlinearityType::NoNlt);
        nlt.set_nonlinear_transform(5, NonlinearityType::BinaryComplement);
        nlt.check_validity(&mut siz);
        assert!(!nlt.is_any_enabled());
        assert_eq!(siz.rsiz() & RSIZ_NLT_FLAG, 0);
        assert_eq!(nlt.get_nonlinear_transform(0), None);
    }

    #[test]
    fn test_read() {
        let mut nlt = Nlt::new();
        nlt.read(&mut StreamReader::new(&[0x00, 0x06, 0x00, 0x02, 0x07, 0x03]))
            .unwrap();
        assert_eq!(
            nlt.get_nonlinear_transform(2),
            Some((8, false, NonlinearityType::BinaryComplement))
        );
        assert_eq!(nlt.get_nonlinear_transform(0), None);

        let lut = [0x00, 0x06, 0x00, 0x02, 0x07, 0x01];
        assert!(matches!(
            nlt.read(&mut StreamReader::new(&lut)),
            Err(CodestreamError::Unsupported { .. })
        ));
    }
}
