//! Big-endian field reader over an in-memory codestream.

use crate::error::CodestreamError;

/// Sequential reader of big-endian fixed-width fields.
///
/// Every read that would run past the end of the source fails with
/// [`CodestreamError::UnexpectedEndOfData`] and leaves the position unchanged.
pub struct StreamReader<'a> {
    source: &'a [u8],
    position: usize,
}

impl<'a> StreamReader<'a> {
    pub fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining_data(&self) -> &'a [u8] {
        &self.source[self.position..]
    }

    pub fn is_empty(&self) -> bool {
        self.position >= self.source.len()
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], CodestreamError> {
        let end = self
            .position
            .checked_add(count)
            .filter(|&end| end <= self.source.len())
            .ok_or(CodestreamError::UnexpectedEndOfData)?;
        let bytes = &self.source[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodestreamError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodestreamError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, CodestreamError> {
        Ok(i8::from_be_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16, CodestreamError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, CodestreamError> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodestreamError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodestreamError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    /// Returns the next two bytes as a big-endian value without consuming them.
    pub fn peek_u16(&self) -> Option<u16> {
        let bytes = self.source.get(self.position..self.position + 2)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn advance(&mut self, count: usize) -> Result<(), CodestreamError> {
        self.read_bytes(count).map(|_| ())
    }

    /// Skips a marker segment whose marker code has already been consumed.
    pub fn skip_segment(&mut self) -> Result<(), CodestreamError> {
        let length = self.read_u16()? as usize;
        if length < 2 {
            return Err(CodestreamError::UnexpectedEndOfData);
        }
        self.advance(length - 2)
    }
}
