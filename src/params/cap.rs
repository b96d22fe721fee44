//! Extended capabilities (CAP) segment.

use super::cod::Cod;
use super::qcd::Qcd;
use crate::error::CodestreamError;
use crate::marker_code::MarkerCode;
use crate::stream_reader::StreamReader;
use crate::stream_writer::StreamWriter;

/// Pcap bit announcing Part 15 (HTJ2K) capabilities.
pub const PCAP_PART15: u32 = 0x0002_0000;

const CCAP_IRREVERSIBLE: u16 = 0x0020;

#[derive(Debug, Clone, PartialEq)]
pub struct Cap {
    pcap: u32,
    ccap: Vec<u16>,
}

impl Default for Cap {
    fn default() -> Self {
        Self {
            pcap: PCAP_PART15,
            ccap: vec![0],
        }
    }
}

impl Cap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pcap(&self) -> u32 {
        self.pcap
    }

    pub fn ccap(&self) -> &[u16] {
        &self.ccap
    }

    /// Part 15 capability word: irreversible flag and magnitude-bound code.
    pub fn part15(&self) -> u16 {
        self.ccap.first().copied().unwrap_or(0)
    }

    pub fn is_irreversible(&self) -> bool {
        self.part15() & CCAP_IRREVERSIBLE != 0
    }

    /// Recomputes Ccap15 from the coding style and the quantization.
    pub fn check_validity(&mut self, cod: &Cod, qcd: &Qcd) {
        let mut ccap = self.part15();
        if cod.main().wavelet_kernel() == super::atk::DWT_REV53 {
            ccap &= !CCAP_IRREVERSIBLE;
        } else {
            ccap |= CCAP_IRREVERSIBLE;
        }
        ccap &= 0xFFE0;

        let b = qcd.magb();
        let bp = if b <= 8 {
            0
        } else if b < 28 {
            b - 8
        } else {
            13 + (b >> 2)
        };
        ccap |= bp as u16;

        self.pcap = PCAP_PART15;
        self.ccap.clear();
        self.ccap.push(ccap);
    }

    pub fn write(&self, writer: &mut StreamWriter) {
        writer.write_marker(MarkerCode::Capabilities);
        writer.write_u16((6 + 2 * self.ccap.len()) as u16);
        writer.write_u32(self.pcap);
        for &value in &self.ccap {
            writer.write_u16(value);
        }
    }

    /// Reads a CAP segment body; the marker code has already been consumed.
    pub fn read(reader: &mut StreamReader<'_>) -> Result<Self, CodestreamError> {
        let marker = MarkerCode::Capabilities;
        let lcap = reader.read_u16()? as usize;
        let pcap = reader.read_u32()?;
        if pcap & !PCAP_PART15 != 0 {
            return Err(CodestreamError::unsupported(
                marker,
                "Pcap has options that are not supported",
            ));
        }
        if pcap & PCAP_PART15 == 0 {
            return Err(CodestreamError::malformed(
                marker,
                "Pcap^15 is not set; this is not an HTJ2K codestream",
            ));
        }
        let count = pcap.count_ones() as usize;
        let mut ccap = Vec::with_capacity(count);
        for _ in 0..count {
            ccap.push(reader.read_u16()?);
        }
        if lcap != 6 + 2 * count {
            return Err(CodestreamError::length(marker, lcap, 6 + 2 * count));
        }
        Ok(Self { pcap, ccap })
    }
}
