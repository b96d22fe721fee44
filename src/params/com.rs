//! Comment (COM) segment.

use crate::error::CodestreamError;
use crate::marker_code::MarkerCode;
use crate::stream_reader::StreamReader;
use crate::stream_writer::StreamWriter;

/// Largest comment payload that fits the 16-bit length field.
pub const MAX_COMMENT_LEN: usize = 65531;

const RCOM_BINARY: u16 = 0;
const RCOM_LATIN: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    rcom: u16,
    data: Vec<u8>,
}

impl Comment {
    /// A Latin-1 text comment.
    pub fn text(text: &str) -> Result<Self, CodestreamError> {
        Self::with_registration(RCOM_LATIN, text.as_bytes().to_vec())
    }

    pub fn binary(data: Vec<u8>) -> Result<Self, CodestreamError> {
        Self::with_registration(RCOM_BINARY, data)
    }

    fn with_registration(rcom: u16, data: Vec<u8>) -> Result<Self, CodestreamError> {
        if data.len() > MAX_COMMENT_LEN {
            return Err(CodestreamError::InvalidConfiguration(format!(
                "a comment holds at most {MAX_COMMENT_LEN} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self { rcom, data })
    }

    pub fn is_text(&self) -> bool {
        self.rcom == RCOM_LATIN
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The comment as text, if it is a text comment.
    pub fn as_text(&self) -> Option<String> {
        self.is_text()
            .then(|| self.data.iter().map(|&b| char::from(b)).collect())
    }

    pub fn write(&self, writer: &mut StreamWriter) {
        writer.write_marker(MarkerCode::Comment);
        writer.write_u16((4 + self.data.len()) as u16);
        writer.write_u16(self.rcom);
        writer.write_bytes(&self.data);
    }

    /// Reads a COM segment body; the marker code has already been consumed.
    pub fn read(reader: &mut StreamReader<'_>) -> Result<Self, CodestreamError> {
        let lcom = reader.read_u16()? as usize;
        if lcom < 4 {
            return Err(CodestreamError::length(MarkerCode::Comment, lcom, 4));
        }
        let rcom = reader.read_u16()?;
        let data = reader.read_bytes(lcom - 4)?.to_vec();
        Ok(Self { rcom, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_comment() {
        let comment = Comment::text("htj2k").unwrap();
        let mut writer = StreamWriter::new();
        comment.write(&mut writer);
        let bytes = writer.into_bytes();
        assert_eq!(&bytes[..6], &[0xFF, 0x64, 0x00, 0x09, 0x00, 0x01]);

        let parsed = Comment::read(&mut StreamReader::new(&bytes[2..])).unwrap();
        assert_eq!(parsed.as_text().as_deref(), Some("htj2k"));
    }

    #[test]
    fn test_length_limit() {
        assert!(Comment::binary(vec![0; MAX_COMMENT_LEN]).is_ok());
        assert!(Comment::binary(vec![0; MAX_COMMENT_LEN + 1]).is_err());
    }
}
