//! Start of tile-part (SOT) segment.

use crate::error::CodestreamError;
use crate::marker_code::MarkerCode;
use crate::stream_reader::StreamReader;
use crate::stream_writer::StreamWriter;

const LSOT: u16 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sot {
    isot: u16,
    psot: u32,
    tpsot: u8,
    tnsot: u8,
}

impl Sot {
    pub fn new(tile_index: u16, tile_part_index: u8, num_tile_parts: u8) -> Self {
        Self {
            isot: tile_index,
            psot: 0,
            tpsot: tile_part_index,
            tnsot: num_tile_parts,
        }
    }

    pub fn tile_index(&self) -> u16 {
        self.isot
    }

    /// Psot as signalled: the tile-part length from the SOT marker on.
    pub fn tile_part_length(&self) -> u32 {
        self.psot
    }

    /// Bytes following the SOT segment, SOD marker included.
    pub fn payload_length(&self) -> u32 {
        self.psot.saturating_sub(12)
    }

    pub fn tile_part_index(&self) -> u8 {
        self.tpsot
    }

    pub fn num_tile_parts(&self) -> u8 {
        self.tnsot
    }

    /// Writes the segment for `payload_len` bytes of tile data following the
    /// SOD marker.
    pub fn write(&mut self, writer: &mut StreamWriter, payload_len: u32) {
        self.psot = payload_len + 14;
        self.write_fields(writer);
    }

    /// Writes the segment with explicit tile-part numbering, leaving the
    /// stored record untouched.
    pub fn write_with_parts(
        &self,
        writer: &mut StreamWriter,
        payload_len: u32,
        tile_part_index: u8,
        num_tile_parts: u8,
    ) {
        Sot {
            psot: payload_len + 14,
            tpsot: tile_part_index,
            tnsot: num_tile_parts,
            ..*self
        }
        .write_fields(writer);
    }

    fn write_fields(&self, writer: &mut StreamWriter) {
        writer.write_marker(MarkerCode::StartOfTile);
        writer.write_u16(LSOT);
        writer.write_u16(self.isot);
        writer.write_u32(self.psot);
        writer.write_u8(self.tpsot);
        writer.write_u8(self.tnsot);
    }

    /// Reads an SOT segment body; the marker code has already been consumed.
    pub fn read(reader: &mut StreamReader<'_>) -> Result<Self, CodestreamError> {
        let marker = MarkerCode::StartOfTile;
        let lsot = reader.read_u16()?;
        if lsot != LSOT {
            return Err(CodestreamError::length(marker, lsot.into(), LSOT.into()));
        }
        let isot = reader.read_u16()?;
        if isot == 0xFFFF {
            return Err(CodestreamError::malformed(
                marker,
                "tile index in SOT marker cannot be 0xFFFF",
            ));
        }
        Ok(Self {
            isot,
            psot: reader.read_u32()?,
            tpsot: reader.read_u8()?,
            tnsot: reader.read_u8()?,
        })
    }

    /// Reads an SOT segment of a possibly damaged codestream. On failure the
    /// record is zeroed and `false` is returned so the caller can skip the
    /// tile-part.
    pub fn read_resilient(&mut self, reader: &mut StreamReader<'_>) -> bool {
        match Self::read(reader) {
            Ok(sot) => {
                *self = sot;
                true
            }
            Err(err) => {
                linfo!("Skipping a damaged SOT marker segment: {}", err);
                *self = Self::default();
                false
            }
        }
    }
}
