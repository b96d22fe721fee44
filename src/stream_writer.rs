//! Codestream writer utilities.
//!
//! [`StreamWriter`] emits markers and big-endian fields into a growable buffer.

use crate::marker_code::MarkerCode;

/// A writer for JPEG 2000 codestreams that appends big-endian fields.
#[derive(Debug, Default, Clone)]
pub struct StreamWriter {
    destination: Vec<u8>,
}

impl StreamWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            destination: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.destination.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destination.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.destination
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.destination
    }

    pub fn write_u8(&mut self, value: u8) {
        self.destination.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.destination.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u16(&mut self, value: u16) {
        self.destination.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.destination.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.destination.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.destination.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.destination.extend_from_slice(bytes);
    }

    pub fn write_marker(&mut self, marker: MarkerCode) {
        self.write_u16(marker.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_markers_and_fields() {
        let mut writer = StreamWriter::new();
        writer.write_marker(MarkerCode::StartOfCodestream);
        writer.write_u16(0x0102);
        writer.write_u32(0x0304_0506);
        writer.write_i16(-2);
        assert_eq!(
            writer.as_bytes(),
            &[0xFF, 0x4F, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0xFF, 0xFE]
        );
    }
}
