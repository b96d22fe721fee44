//! HTJ2K main-header and tile-part-header driver.
//!
//! Ties the marker-segment records together: cross-segment validation and
//! main-header emission on the encoder side, marker dispatch up to the first
//! tile-part on the decoder side.

use crate::error::CodestreamError;
use crate::marker_code::MarkerCode;
use crate::params::{Atk, Cap, Cod, Comment, Dfs, Nlt, Qcd, Siz, Sot};
use crate::stream_reader::StreamReader;
use crate::stream_writer::StreamWriter;

/// One tile-part located by [`Codestream::read_tile_part`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePart<'a> {
    pub sot: Sot,
    /// Bytes following the SOD marker.
    pub data: &'a [u8],
    /// False when a resilient read had to skip a damaged tile-part; `sot` is
    /// zeroed and `data` is empty in that case.
    pub intact: bool,
}

impl TilePart<'_> {
    fn damaged() -> Self {
        Self {
            sot: Sot::default(),
            data: &[],
            intact: false,
        }
    }
}

/// The main-header parameter set of one codestream.
#[derive(Debug, Clone, Default)]
pub struct Codestream {
    siz: Siz,
    cap: Cap,
    cod: Cod,
    qcd: Qcd,
    nlt: Nlt,
    dfs: Dfs,
    atk: Atk,
    comments: Vec<Comment>,
}

impl Codestream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn siz(&self) -> &Siz {
        &self.siz
    }

    pub fn siz_mut(&mut self) -> &mut Siz {
        &mut self.siz
    }

    pub fn cap(&self) -> &Cap {
        &self.cap
    }

    pub fn cod(&self) -> &Cod {
        &self.cod
    }

    pub fn cod_mut(&mut self) -> &mut Cod {
        &mut self.cod
    }

    pub fn qcd(&self) -> &Qcd {
        &self.qcd
    }

    pub fn qcd_mut(&mut self) -> &mut Qcd {
        &mut self.qcd
    }

    pub fn nlt(&self) -> &Nlt {
        &self.nlt
    }

    pub fn nlt_mut(&mut self) -> &mut Nlt {
        &mut self.nlt
    }

    pub fn dfs(&self) -> &Dfs {
        &self.dfs
    }

    pub fn dfs_mut(&mut self) -> &mut Dfs {
        &mut self.dfs
    }

    pub fn atk(&self) -> &Atk {
        &self.atk
    }

    pub fn atk_mut(&mut self) -> &mut Atk {
        &mut self.atk
    }

    /// Comments collected by [`read_headers`](Self::read_headers), including
    /// the version comment the writer emits.
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Validates the configuration and writes the main header, from SOC up
    /// to (excluding) the first SOT.
    pub fn write_headers(
        &mut self,
        writer: &mut StreamWriter,
        comments: &[Comment],
    ) -> Result<(), CodestreamError> {
        self.siz.check_validity()?;
        self.cod.check_validity(&self.siz)?;
        self.cod.update_atk(&mut self.atk)?;
        self.qcd.check_validity(&self.siz, &self.cod)?;
        self.cap.check_validity(&self.cod, &self.qcd);
        self.nlt.check_validity(&mut self.siz);

        let num_comps = self.siz.num_components();
        writer.write_marker(MarkerCode::StartOfCodestream);
        self.siz.write(writer);
        self.cap.write(writer);
        self.atk.write(writer);
        self.dfs.write(writer);
        self.cod.write(writer);
        self.cod.write_coc(writer, num_comps);
        self.qcd.write(writer);
        self.qcd.write_qcc(writer, num_comps);
        self.nlt.write(writer);

        version_comment()?.write(writer);
        for comment in comments {
            comment.write(writer);
        }
        ldebug!("Main header written, {} bytes", writer.len());
        Ok(())
    }

    /// Parses the main header. On success the reader is left on the first
    /// SOT marker.
    pub fn read_headers(&mut self, reader: &mut StreamReader<'_>) -> Result<(), CodestreamError> {
        let soc = reader.read_u16()?;
        if soc != u16::from(MarkerCode::StartOfCodestream) {
            return Err(CodestreamError::UnexpectedMarker(soc));
        }
        let siz = reader.read_u16()?;
        if siz != u16::from(MarkerCode::ImageAndTileSize) {
            return Err(CodestreamError::UnexpectedMarker(siz));
        }
        self.siz = Siz::read(reader)?;
        let num_comps = self.siz.num_components();

        let mut have_cod = false;
        let mut have_qcd = false;
        loop {
            let code = reader.peek_u16().ok_or(CodestreamError::UnexpectedEndOfData)?;
            let marker =
                MarkerCode::try_from(code).map_err(|_| CodestreamError::UnexpectedMarker(code))?;
            if marker == MarkerCode::StartOfTile {
                break;
            }
            reader.advance(2)?;

            match marker {
                MarkerCode::Capabilities => self.cap = Cap::read(reader)?,
                MarkerCode::CodingStyleDefault => {
                    self.cod.read(reader)?;
                    have_cod = true;
                }
                MarkerCode::CodingStyleComponent => {
                    let comp = self.cod.read_coc(reader, num_comps)?;
                    if comp >= num_comps {
                        linfo!(
                            "The codestream carries a COC segment for component {}, which does \
                             not exist; the image has {} components",
                            comp,
                            num_comps
                        );
                    }
                }
                MarkerCode::QuantizationDefault => {
                    self.qcd.read(reader)?;
                    have_qcd = true;
                }
                MarkerCode::QuantizationComponent => {
                    let comp = self.qcd.read_qcc(reader, num_comps)?;
                    if comp >= num_comps {
                        return Err(CodestreamError::malformed(
                            marker,
                            "QCC segment for a component that does not exist",
                        ));
                    }
                }
                MarkerCode::Nonlinearity => self.nlt.read(reader)?,
                MarkerCode::DownsamplingFactorStyles => self.dfs.read(reader)?,
                MarkerCode::ArbitraryTransformKernel => self.atk.read(reader)?,
                MarkerCode::Comment => self.comments.push(Comment::read(reader)?),
                MarkerCode::RegionOfInterest
                | MarkerCode::ProgressionOrderChange
                | MarkerCode::PackedPacketHeadersMain => {
                    lwarn!("Skipping {} marker segment; it is not supported", marker);
                    reader.skip_segment()?;
                }
                MarkerCode::ComponentRegistration => {
                    linfo!("Skipping CRG marker segment; component registration is not used");
                    reader.skip_segment()?;
                }
                MarkerCode::TilePartLengths
                | MarkerCode::PacketLengthsMain
                | MarkerCode::Profile
                | MarkerCode::CorrespondingProfile => reader.skip_segment()?,
                _ => return Err(CodestreamError::UnexpectedMarker(code)),
            }
        }

        if !have_cod || !have_qcd {
            return Err(CodestreamError::malformed(
                MarkerCode::StartOfCodestream,
                "the main header needs both a COD and a QCD segment",
            ));
        }
        if self.cod.num_layers() > 1 {
            lwarn!(
                "The codestream signals {} quality layers; only one layer is decoded",
                self.cod.num_layers()
            );
        }
        self.cod.update_atk(&mut self.atk)?;
        Ok(())
    }

    /// Reads the next tile-part, or `None` once the EOC marker is reached.
    ///
    /// Tile-part header segments between SOT and SOD are skipped. In
    /// resilient mode a damaged SOT, an out-of-range tile index, a tile-part
    /// too short for SOT and SOD, or an unreadable tile-part header yields a
    /// [`TilePart`] with `intact == false` and the reader is moved to the
    /// next SOT or EOC marker; a missing EOC ends the sequence quietly.
    pub fn read_tile_part<'a>(
        &self,
        reader: &mut StreamReader<'a>,
        resilient: bool,
    ) -> Result<Option<TilePart<'a>>, CodestreamError> {
        let code = match reader.peek_u16() {
            Some(code) => code,
            None if resilient => {
                linfo!("The codestream ends without an EOC marker");
                return Ok(None);
            }
            None => return Err(CodestreamError::UnexpectedEndOfData),
        };
        if code == u16::from(MarkerCode::EndOfCodestream) {
            reader.advance(2)?;
            return Ok(None);
        }
        if code != u16::from(MarkerCode::StartOfTile) {
            return Err(CodestreamError::UnexpectedMarker(code));
        }

        let tile_part = reader.remaining_data();
        reader.advance(2)?;
        let sot = if resilient {
            let mut sot = Sot::default();
            if !sot.read_resilient(reader) {
                skip_to_next_tile_part(reader)?;
                return Ok(Some(TilePart::damaged()));
            }
            sot
        } else {
            Sot::read(reader)?
        };

        let tiles = self.siz.num_tiles();
        if u64::from(sot.tile_index()) >= u64::from(tiles.w) * u64::from(tiles.h) {
            if !resilient {
                return Err(CodestreamError::malformed(
                    MarkerCode::StartOfTile,
                    "tile index in SOT exceeds the number of tiles",
                ));
            }
            lwarn!("Skipping tile-part of non-existing tile {}", sot.tile_index());
            skip_to_next_tile_part(reader)?;
            return Ok(Some(TilePart::damaged()));
        }

        let length = match sot.tile_part_length() as usize {
            // Last tile-part: it runs to the EOC marker.
            0 => {
                let rest = tile_part.len();
                if tile_part.ends_with(&[0xFF, 0xD9]) { rest - 2 } else { rest }
            }
            length if length > tile_part.len() && length >= 14 => {
                if !resilient {
                    return Err(CodestreamError::UnexpectedEndOfData);
                }
                lwarn!(
                    "Tile-part of tile {} is truncated; {} of {} bytes are present",
                    sot.tile_index(),
                    tile_part.len(),
                    length
                );
                tile_part.len()
            }
            length => length,
        };
        if length < 14 {
            if !resilient {
                return Err(CodestreamError::malformed(
                    MarkerCode::StartOfTile,
                    "tile-part is too short to hold the SOT segment and SOD marker",
                ));
            }
            lwarn!("Skipping tile-part of tile {} with only {} bytes", sot.tile_index(), length);
            skip_to_next_tile_part(reader)?;
            return Ok(Some(TilePart::damaged()));
        }

        match tile_part_data(&tile_part[12..length], sot.tile_index()) {
            Ok(data) => {
                reader.advance(length - 12)?;
                Ok(Some(TilePart {
                    sot,
                    data,
                    intact: true,
                }))
            }
            Err(e) if resilient => {
                lwarn!("Skipping tile-part of tile {}: {}", sot.tile_index(), e);
                skip_to_next_tile_part(reader)?;
                Ok(Some(TilePart::damaged()))
            }
            Err(e) => Err(e),
        }
    }

    /// Returns every record to its default, keeping override storage for
    /// reuse on the next codestream.
    pub fn restart(&mut self) {
        self.siz = Siz::default();
        self.cap = Cap::default();
        self.cod.clear();
        self.qcd.clear();
        self.nlt.clear();
        self.dfs.clear();
        self.atk.clear();
        self.comments.clear();
    }
}

fn version_comment() -> Result<Comment, CodestreamError> {
    Comment::text(&format!("HTJ2K-core Ver {}.", env!("CARGO_PKG_VERSION")))
}

/// Skips the segments between SOT and SOD and returns the bytes after SOD.
fn tile_part_data(body: &[u8], tile_index: u16) -> Result<&[u8], CodestreamError> {
    let mut body = StreamReader::new(body);
    loop {
        let code = body.read_u16()?;
        match MarkerCode::try_from(code) {
            Ok(MarkerCode::StartOfData) => return Ok(body.remaining_data()),
            Ok(MarkerCode::PacketLengthsTile) | Ok(MarkerCode::Comment) => body.skip_segment()?,
            Ok(marker) if !marker.is_delimiter() => {
                lwarn!(
                    "Ignoring {} marker segment in the header of tile {}",
                    marker,
                    tile_index
                );
                body.skip_segment()?;
            }
            _ => return Err(CodestreamError::UnexpectedMarker(code)),
        }
    }
}

/// Moves the reader onto the next SOT or EOC marker, or to the end.
fn skip_to_next_tile_part(reader: &mut StreamReader<'_>) -> Result<(), CodestreamError> {
    let rest = reader.remaining_data();
    let offset = rest
        .windows(2)
        .position(|pair| pair == [0xFF, 0x90] || pair == [0xFF, 0xD9])
        .unwrap_or(rest.len());
    reader.advance(offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{Point, Size};

    fn gray_image(width: u32, height: u32) -> Codestream {
        let mut cs = Codestream::new();
        let siz = cs.siz_mut();
        siz.set_image_extent(Point::new(width, height));
        siz.set_num_components(1).unwrap();
        siz.set_component(0, Point::new(1, 1), 8, false).unwrap();
        cs.cod_mut().set_reversible(true);
        cs
    }

    fn with_tile_parts(header: &[u8], parts: &[(u16, &[u8])], last_open: bool) -> Vec<u8> {
        let mut writer = StreamWriter::new();
        writer.write_bytes(header);
        for (i, &(tile, payload)) in parts.iter().enumerate() {
            if last_open && i + 1 == parts.len() {
                // Psot = 0: the tile-part runs to EOC.
                writer.write_marker(MarkerCode::StartOfTile);
                writer.write_u16(10);
                writer.write_u16(tile);
                writer.write_u32(0);
                writer.write_u8(0);
                writer.write_u8(1);
            } else {
                Sot::new(tile, 0, 1).write(&mut writer, payload.len() as u32);
            }
            writer.write_marker(MarkerCode::StartOfData);
            writer.write_bytes(payload);
        }
        writer.write_marker(MarkerCode::EndOfCodestream);
        writer.into_bytes()
    }

    #[test]
    fn test_write_headers_marker_order() {
        let mut cs = gray_image(64, 64);
        cs.cod_mut().resolve_mut(0).set_num_decompositions(2).unwrap();
        let mut writer = StreamWriter::new();
        cs.write_headers(&mut writer, &[]).unwrap();
        let bytes = writer.into_bytes();

        let mut reader = StreamReader::new(&bytes);
        let mut order = vec![reader.read_u16().unwrap()];
        while !reader.is_empty() {
            order.push(reader.read_u16().unwrap());
            reader.skip_segment().unwrap();
        }
        assert_eq!(
            order,
            [0xFF4F, 0xFF51, 0xFF50, 0xFF52, 0xFF53, 0xFF5C, 0xFF64]
        );
    }

    #[test]
    fn test_read_headers_roundtrip() {
        let mut cs = gray_image(100, 80);
        cs.cod_mut().set_num_decompositions(3).unwrap();
        let comment = Comment::text("scan 7").unwrap();
        let mut writer = StreamWriter::new();
        cs.write_headers(&mut writer, &[comment.clone()]).unwrap();
        let header = writer.into_bytes();
        let bytes = with_tile_parts(&header, &[(0, &[1, 2, 3])], false);

        let mut parsed = Codestream::new();
        let mut reader = StreamReader::new(&bytes);
        parsed.read_headers(&mut reader).unwrap();
        assert_eq!(reader.peek_u16(), Some(0xFF90));
        assert_eq!(parsed.siz().image_extent(), Point::new(100, 80));
        assert_eq!(parsed.cod().num_decompositions(), 3);
        assert!(parsed.cod().is_reversible());
        assert_eq!(parsed.qcd().main().num_subbands(), 10);
        assert_eq!(parsed.comments().len(), 2);
        assert!(
            parsed.comments()[0]
                .as_text()
                .is_some_and(|text| text.starts_with("HTJ2K-core Ver"))
        );
        assert_eq!(parsed.comments()[1], comment);
        assert!(parsed.cod().main().kernel().is_some());
    }

    #[test]
    fn test_read_headers_requires_cod_and_qcd() {
        let mut cs = gray_image(16, 16);
        let mut writer = StreamWriter::new();
        cs.siz_mut().check_validity().unwrap();
        writer.write_marker(MarkerCode::StartOfCodestream);
        cs.siz().write(&mut writer);
        cs.cod().write(&mut writer);
        Sot::new(0, 0, 1).write(&mut writer, 0);
        let bytes = writer.into_bytes();

        let result = Codestream::new().read_headers(&mut StreamReader::new(&bytes));
        assert!(matches!(result, Err(CodestreamError::Malformed { .. })));
    }

    #[test]
    fn test_read_headers_skips_known_segments() {
        let mut cs = gray_image(16, 16);
        let mut writer = StreamWriter::new();
        cs.write_headers(&mut writer, &[]).unwrap();
        // An RGN and a PRF segment ahead of the first tile-part.
        writer.write_bytes(&[0xFF, 0x5E, 0x00, 0x05, 0x00, 0x00, 0x03]);
        writer.write_bytes(&[0xFF, 0x56, 0x00, 0x04, 0x12, 0x34]);
        Sot::new(0, 0, 1).write(&mut writer, 0);
        let bytes = writer.into_bytes();

        let mut reader = StreamReader::new(&bytes);
        Codestream::new().read_headers(&mut reader).unwrap();
        assert_eq!(reader.peek_u16(), Some(0xFF90));
    }

    #[test]
    fn test_read_headers_rejects_missing_soc_and_eof() {
        let result = Codestream::new().read_headers(&mut StreamReader::new(&[0xFF, 0x51]));
        assert_eq!(result, Err(CodestreamError::UnexpectedMarker(0xFF51)));

        let mut cs = gray_image(16, 16);
        let mut writer = StreamWriter::new();
        cs.write_headers(&mut writer, &[]).unwrap();
        let bytes = writer.into_bytes();
        let result = Codestream::new().read_headers(&mut StreamReader::new(&bytes));
        assert_eq!(result, Err(CodestreamError::UnexpectedEndOfData));
    }

    #[test]
    fn test_read_tile_parts() {
        let mut cs = gray_image(64, 64);
        cs.siz_mut().set_tile_size(Size::new(32, 64));
        let mut writer = StreamWriter::new();
        cs.write_headers(&mut writer, &[]).unwrap();
        let header = writer.into_bytes();
        let bytes = with_tile_parts(&header, &[(0, &[0xAA, 0xBB]), (1, &[0xCC])], true);

        let mut parsed = Codestream::new();
        let mut reader = StreamReader::new(&bytes);
        parsed.read_headers(&mut reader).unwrap();

        let first = parsed.read_tile_part(&mut reader, false).unwrap().unwrap();
        assert!(first.intact);
        assert_eq!(first.sot.tile_index(), 0);
        assert_eq!(first.data, &[0xAA, 0xBB]);

        let last = parsed.read_tile_part(&mut reader, false).unwrap().unwrap();
        assert_eq!(last.sot.tile_index(), 1);
        assert_eq!(last.sot.tile_part_length(), 0);
        assert_eq!(last.data, &[0xCC]);

        assert_eq!(parsed.read_tile_part(&mut reader, false).unwrap(), None);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_resilient_tile_part_skips_bad_tile_index() {
        let mut cs = gray_image(32, 32);
        let mut writer = StreamWriter::new();
        cs.write_headers(&mut writer, &[]).unwrap();
        let header = writer.into_bytes();
        let bytes = with_tile_parts(&header, &[(5, &[0x01]), (0, &[0x02])], false);

        let mut parsed = Codestream::new();
        let mut reader = StreamReader::new(&bytes);
        parsed.read_headers(&mut reader).unwrap();
        let start = reader.position();
        assert!(parsed.read_tile_part(&mut reader, false).is_err());

        let mut reader = StreamReader::new(&bytes);
        reader.advance(start).unwrap();
        let skipped = parsed.read_tile_part(&mut reader, true).unwrap().unwrap();
        assert!(!skipped.intact);
        assert_eq!(skipped.sot, Sot::default());
        let good = parsed.read_tile_part(&mut reader, true).unwrap().unwrap();
        assert!(good.intact);
        assert_eq!(good.data, &[0x02]);
    }

    #[test]
    fn test_open_tile_part_too_short_for_sod() {
        let mut cs = gray_image(32, 32);
        let mut writer = StreamWriter::new();
        cs.write_headers(&mut writer, &[]).unwrap();
        let mut bytes = writer.into_bytes();
        let start = bytes.len();
        // SOT with Psot = 0 directly followed by EOC.
        bytes.extend_from_slice(&[0xFF, 0x90, 0x00, 0x0A, 0x00, 0x00]);
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0xFF, 0xD9]);

        let mut parsed = Codestream::new();
        parsed
            .read_headers(&mut StreamReader::new(&bytes))
            .unwrap();

        let mut reader = StreamReader::new(&bytes);
        reader.advance(start).unwrap();
        assert!(matches!(
            parsed.read_tile_part(&mut reader, false),
            Err(CodestreamError::Malformed { .. })
        ));

        let mut reader = StreamReader::new(&bytes);
        reader.advance(start).unwrap();
        let part = parsed.read_tile_part(&mut reader, true).unwrap().unwrap();
        assert!(!part.intact);
        assert_eq!(parsed.read_tile_part(&mut reader, true), Ok(None));

        // TPsot and TNsot happen to read as an EOC marker.
        bytes.truncate(start);
        bytes.extend_from_slice(&[0xFF, 0x90, 0x00, 0x0A, 0x00, 0x00]);
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0xFF, 0xD9]);
        let mut reader = StreamReader::new(&bytes);
        reader.advance(start).unwrap();
        let part = parsed.read_tile_part(&mut reader, true).unwrap().unwrap();
        assert!(!part.intact);
        assert_eq!(parsed.read_tile_part(&mut reader, true), Ok(None));
    }

    #[test]
    fn test_resilient_tile_part_without_sod() {
        let mut cs = gray_image(32, 32);
        let mut writer = StreamWriter::new();
        cs.write_headers(&mut writer, &[]).unwrap();
        let header = writer.into_bytes();

        // Psot = 16 covers SOT and an empty COM segment but no SOD.
        let mut writer = StreamWriter::new();
        writer.write_bytes(&header);
        writer.write_marker(MarkerCode::StartOfTile);
        writer.write_u16(10);
        writer.write_u16(0);
        writer.write_u32(16);
        writer.write_u8(0);
        writer.write_u8(2);
        writer.write_marker(MarkerCode::Comment);
        writer.write_u16(2);
        let bytes = writer.into_bytes();
        let bytes = with_tile_parts(&bytes, &[(0, &[0x07, 0x08])], false);

        let mut reader = StreamReader::new(&bytes);
        let mut parsed = Codestream::new();
        parsed.read_headers(&mut reader).unwrap();
        let start = reader.position();
        assert_eq!(
            parsed.read_tile_part(&mut reader, false),
            Err(CodestreamError::UnexpectedEndOfData)
        );

        let mut reader = StreamReader::new(&bytes);
        reader.advance(start).unwrap();
        let damaged = parsed.read_tile_part(&mut reader, true).unwrap().unwrap();
        assert!(!damaged.intact);
        let good = parsed.read_tile_part(&mut reader, true).unwrap().unwrap();
        assert!(good.intact);
        assert_eq!(good.data, &[0x07, 0x08]);
        assert_eq!(parsed.read_tile_part(&mut reader, true), Ok(None));

        // An open tile-part with no SOD before EOC.
        let mut bytes = header.clone();
        bytes.extend_from_slice(&[0xFF, 0x90, 0x00, 0x0A, 0x00, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0xFF, 0x64, 0x00, 0x02]);
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        let mut reader = StreamReader::new(&bytes);
        reader.advance(header.len()).unwrap();
        let damaged = parsed.read_tile_part(&mut reader, true).unwrap().unwrap();
        assert!(!damaged.intact);
        assert_eq!(parsed.read_tile_part(&mut reader, true), Ok(None));
    }

    #[test]
    fn test_restart_keeps_capacity() {
        let mut cs = gray_image(16, 16);
        for comp in 0..4 {
            cs.qcd_mut().set_component_delta(comp, 0.5).unwrap();
        }
        cs.restart();
        assert!(!cs.qcd().has_override(0));
        assert_eq!(cs.siz().num_components(), 0);
        assert!(cs.comments().is_empty());
    }
}
