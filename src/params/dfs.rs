//! Downsampling factor styles (DFS) segment.
//!
//! A DFS record tells, per decomposition level, whether the level splits the
//! tile-component in both directions, horizontally only, vertically only, or
//! not at all. Coding styles reference a record through its Sdfs index.

use super::{OverrideList, Point};
use crate::error::CodestreamError;
use crate::marker_code::MarkerCode;
use crate::stream_reader::StreamReader;
use crate::stream_writer::StreamWriter;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Largest number of levels a record stores; 2 bits per level.
pub const MAX_LEVELS: u8 = 32;
const DDFS_BYTES: usize = MAX_LEVELS as usize / 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DwtType {
    NoDwt = 0,
    Bidirectional = 1,
    Horizontal = 2,
    Vertical = 3,
}

impl DwtType {
    /// Number of detail subbands a level of this type produces.
    fn subband_count(self) -> u32 {
        match self {
            Self::NoDwt => 0,
            Self::Bidirectional => 3,
            Self::Horizontal | Self::Vertical => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfsRecord {
    sdfs: u16,
    ids: u8,
    ddfs: [u8; DDFS_BYTES],
}

impl DfsRecord {
    /// Builds a record from level types, level 1 first.
    pub fn new(sdfs: u16, levels: &[DwtType]) -> Result<Self, CodestreamError> {
        if sdfs > 15 {
            return Err(CodestreamError::InvalidConfiguration(format!(
                "DFS index must be at most 15, got {sdfs}"
            )));
        }
        if levels.len() > MAX_LEVELS as usize {
            return Err(CodestreamError::InvalidConfiguration(format!(
                "a DFS record describes at most {MAX_LEVELS} levels"
            )));
        }
        let mut ddfs = [0u8; DDFS_BYTES];
        for (d, &ty) in levels.iter().enumerate() {
            ddfs[d >> 2] |= u8::from(ty) << (6 - 2 * (d & 3));
        }
        Ok(Self {
            sdfs,
            ids: levels.len() as u8,
            ddfs,
        })
    }

    pub fn index(&self) -> u16 {
        self.sdfs
    }

    pub fn num_levels(&self) -> u8 {
        self.ids
    }

    /// Decomposition type of `level` (1-based); levels past the last one
    /// signalled repeat the last one.
    pub fn dwt_type(&self, level: u32) -> DwtType {
        let level = level.min(u32::from(self.ids));
        if level == 0 {
            return DwtType::Bidirectional;
        }
        let d = (level - 1) as usize;
        let value = (self.ddfs[d >> 2] >> (6 - 2 * (d & 3))) & 0x3;
        DwtType::try_from(value).unwrap_or(DwtType::Bidirectional)
    }

    /// Maps (resolution, subband) to the position of its step size in a
    /// QCD/QCC segment.
    pub fn subband_index(&self, num_decompositions: u32, resolution: u32, subband: u32) -> u32 {
        if resolution == 0 {
            return 0;
        }
        let mut idx = 0;
        for i in 1..resolution {
            idx += self
                .dwt_type((num_decompositions + 1).saturating_sub(i))
                .subband_count();
        }
        let ty = self.dwt_type((num_decompositions + 1).saturating_sub(resolution));
        idx += subband;
        if ty == DwtType::Vertical && subband == 2 {
            idx -= 1;
        }
        idx
    }

    /// Accumulated downsampling after `skipped` resolutions are dropped.
    pub fn resolution_downsampling(&self, skipped: u32) -> Point {
        let mut factor = Point::new(1, 1);
        for level in 1..=skipped {
            match self.dwt_type(level) {
                DwtType::Bidirectional => {
                    factor.x = factor.x.saturating_mul(2);
                    factor.y = factor.y.saturating_mul(2);
                }
                DwtType::Horizontal => factor.x = factor.x.saturating_mul(2),
                DwtType::Vertical => factor.y = factor.y.saturating_mul(2),
                DwtType::NoDwt => {}
            }
        }
        factor
    }

    pub fn write(&self, writer: &mut StreamWriter) {
        let bytes = usize::from(self.ids).div_ceil(4);
        writer.write_marker(MarkerCode::DownsamplingFactorStyles);
        writer.write_u16((5 + bytes) as u16);
        writer.write_u16(self.sdfs);
        writer.write_u8(self.ids);
        writer.write_bytes(&self.ddfs[..bytes]);
    }

    /// Reads a DFS segment body; the marker code has already been consumed.
    pub fn read(reader: &mut StreamReader<'_>) -> Result<Self, CodestreamError> {
        let marker = MarkerCode::DownsamplingFactorStyles;
        let ldfs = reader.read_u16()? as usize;
        let sdfs = reader.read_u16()?;
        if sdfs > 15 {
            return Err(CodestreamError::malformed(
                marker,
                "the DFS-Sdfs parameter is larger than the permissible 15",
            ));
        }
        let declared_ids = reader.read_u8()?;
        if declared_ids > MAX_LEVELS {
            linfo!(
                "The DFS-Ids parameter is {}; while valid, no more than {} are needed",
                declared_ids,
                MAX_LEVELS
            );
        }
        let ids = declared_ids.min(MAX_LEVELS);
        let kept = usize::from(ids).div_ceil(4);
        let total = usize::from(declared_ids).div_ceil(4);
        let mut ddfs = [0u8; DDFS_BYTES];
        ddfs[..kept].copy_from_slice(reader.read_bytes(kept)?);
        reader.advance(total - kept)?;
        if ldfs != 5 + total {
            return Err(CodestreamError::length(marker, ldfs, 5 + total));
        }
        Ok(Self { sdfs, ids, ddfs })
    }
}

/// All DFS records of a codestream, keyed by Sdfs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dfs {
    records: OverrideList<DfsRecord>,
}

impl Dfs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn get(&self, index: u16) -> Option<&DfsRecord> {
        self.records.get(index)
    }

    /// Adds a record; an index seen before keeps its first definition.
    pub fn add(&mut self, record: DfsRecord) {
        if self.records.contains(record.sdfs) {
            lwarn!("Ignoring a repeated DFS segment with index {}", record.sdfs);
            return;
        }
        self.records.insert(record.sdfs, record);
    }

    pub fn read(&mut self, reader: &mut StreamReader<'_>) -> Result<(), CodestreamError> {
        let record = DfsRecord::read(reader)?;
        self.add(record);
        Ok(())
    }

    pub fn write(&self, writer: &mut StreamWriter) {
        for (_, record) in self.records.iter() {
            record.write(writer);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DfsRecord> {
        self.records.iter().map(|(_, record)| record)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dwt_type_unpacking() {
        let record = DfsRecord::new(
            1,
            &[
                DwtType::Bidirectional,
                DwtType::Horizontal,
                DwtType::Vertical,
                DwtType::NoDwt,
                DwtType::Horizontal,
            ],
        )
        .unwrap();
        // 01 10 11 00 | 10 00 00 00
        assert_eq!(record.ddfs[0], 0b0110_1100);
        assert_eq!(record.ddfs[1], 0b1000_0000);
        assert_eq!(record.dwt_type(2), DwtType::Horizontal);
        assert_eq!(record.dwt_type(3), DwtType::Vertical);
        assert_eq!(record.dwt_type(5), DwtType::Horizontal);
        // clamped to the last signalled level
        assert_eq!(record.dwt_type(9), DwtType::Horizontal);
    }

    #[test]
    fn test_subband_index_remap() {
        let record = DfsRecord::new(
            0,
            &[DwtType::Bidirectional, DwtType::Vertical, DwtType::Horizontal],
        )
        .unwrap();
        // Resolution 1 is produced by level 3 (horizontal, one subband).
        assert_eq!(record.subband_index(3, 0, 0), 0);
        assert_eq!(record.subband_index(3, 1, 1), 1);
        // Resolution 2 is produced by level 2 (vertical); subband 2 folds onto 1.
        assert_eq!(record.subband_index(3, 2, 2), 1 + 1);
        // Resolution 3 is level 1 (bidirectional).
        assert_eq!(record.subband_index(3, 3, 3), 1 + 1 + 3);
    }

    #[test]
    fn test_resolution_downsampling() {
        let record =
            DfsRecord::new(0, &[DwtType::Horizontal, DwtType::Bidirectional]).unwrap();
        assert_eq!(record.resolution_downsampling(0), Point::new(1, 1));
        assert_eq!(record.resolution_downsampling(1), Point::new(2, 1));
        assert_eq!(record.resolution_downsampling(3), Point::new(8, 4));
    }

    #[test]
    fn test_read_skips_excess_levels() {
        let mut data = vec![
            0x00, 0x0E, // Ldfs = 5 + 9
            0x00, 0x02, // Sdfs
            33,   // Ids
        ];
        data.extend_from_slice(&[0x55; 9]);
        data.push(0xAB);
        let mut reader = StreamReader::new(&data);
        let record = DfsRecord::read(&mut reader).unwrap();
        assert_eq!(record.num_levels(), 32);
        assert_eq!(record.dwt_type(32), DwtType::Bidirectional);
        assert_eq!(reader.remaining_data(), &[0xAB]);
    }

    #[test]
    fn test_rejects_large_sdfs() {
        let data = [0x00, 0x06, 0x00, 0x10, 0x01, 0x40];
        let mut reader = StreamReader::new(&data);
        assert!(DfsRecord::read(&mut reader).is_err());
    }
}
