//! Tile-part lengths (TLM) segment, written with 16-bit tile indices and
//! 32-bit tile-part lengths.

use crate::error::CodestreamError;
use crate::marker_code::MarkerCode;
use crate::stream_reader::StreamReader;
use crate::stream_writer::StreamWriter;

const STLM_T16_P32: u8 = 0x60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePartLength {
    pub tile_index: u16,
    pub length: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tlm {
    num_pairs: usize,
    pairs: Vec<TilePartLength>,
}

impl Tlm {
    /// Prepares a segment for `num_pairs` tile-parts.
    pub fn new(num_pairs: usize) -> Result<Self, CodestreamError> {
        if 4 + 6 * num_pairs > 65535 {
            return Err(CodestreamError::InvalidConfiguration(format!(
                "a TLM segment holds at most 10921 tile-parts, {num_pairs} requested"
            )));
        }
        Ok(Self {
            num_pairs,
            pairs: Vec::with_capacity(num_pairs),
        })
    }

    /// Records the next tile-part; `payload_len` excludes the SOT and SOD
    /// markers.
    pub fn set_next_pair(&mut self, tile_index: u16, payload_len: u32) -> Result<(), CodestreamError> {
        if self.pairs.len() == self.num_pairs {
            return Err(CodestreamError::InvalidConfiguration(
                "all TLM tile-part entries are already set".into(),
            ));
        }
        self.pairs.push(TilePartLength {
            tile_index,
            length: payload_len + 14,
        });
        Ok(())
    }

    pub fn pairs(&self) -> &[TilePartLength] {
        &self.pairs
    }

    pub fn write(&self, writer: &mut StreamWriter) -> Result<(), CodestreamError> {
        if self.pairs.len() != self.num_pairs {
            return Err(CodestreamError::InvalidConfiguration(format!(
                "{} of {} TLM tile-part entries are set",
                self.pairs.len(),
                self.num_pairs
            )));
        }
        writer.write_marker(MarkerCode::TilePartLengths);
        writer.write_u16((4 + 6 * self.num_pairs) as u16);
        writer.write_u8(0);
        writer.write_u8(STLM_T16_P32);
        for pair in &self.pairs {
            writer.write_u16(pair.tile_index);
            writer.write_u32(pair.length);
        }
        Ok(())
    }

    /// Reads a TLM segment body; only the layout this module writes is
    /// accepted.
    pub fn read(reader: &mut StreamReader<'_>) -> Result<Self, CodestreamError> {
        let marker = MarkerCode::TilePartLengths;
        let ltlm = reader.read_u16()? as usize;
        let _ztlm = reader.read_u8()?;
        if reader.read_u8()? != STLM_T16_P32 {
            return Err(CodestreamError::unsupported(
                marker,
                "Stlm other than 16-bit tile indices with 32-bit lengths",
            ));
        }
        let payload = ltlm.saturating_sub(4);
        if ltlm < 4 || payload % 6 != 0 {
            return Err(CodestreamError::length(marker, ltlm, 4 + payload / 6 * 6));
        }
        let num_pairs = payload / 6;
        let mut pairs = Vec::with_capacity(num_pairs);
        for _ in 0..num_pairs {
            pairs.push(TilePartLength {
                tile_index: reader.read_u16()?,
                length: reader.read_u32()?,
            });
        }
        Ok(Self { num_pairs, pairs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_requires_all_pairs() {
        let mut tlm = Tlm::new(2).unwrap();
        tlm.set_next_pair(0, 100).unwrap();
        let mut writer = StreamWriter::new();
        assert!(tlm.write(&mut writer).is_err());

        tlm.set_next_pair(1, 50).unwrap();
        assert!(tlm.set_next_pair(2, 1).is_err());
        tlm.write(&mut writer).unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(
            bytes,
            [
                0xFF, 0x55, 0x00, 0x10, 0x00, 0x60, // marker, Ltlm, Ztlm, Stlm
                0x00, 0x00, 0x00, 0x00, 0x00, 0x72, // tile 0, 114
                0x00, 0x01, 0x00, 0x00, 0x00, 0x40, // tile 1, 64
            ]
        );
        assert_eq!(Tlm::read(&mut StreamReader::new(&bytes[2..])).unwrap(), tlm);
    }

    #[test]
    fn test_size_limit() {
        assert!(Tlm::new(10921).is_ok());
        assert!(Tlm::new(10922).is_err());
    }
}
