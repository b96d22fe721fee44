use crate::marker_code::MarkerCode;
use thiserror::Error;

/// Errors raised while building, validating, reading or writing a codestream
/// header, or while running the lifting transform.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodestreamError {
    #[error("Unexpected end of data")]
    UnexpectedEndOfData,

    #[error("Wrong length in {marker} segment: declared {declared}, expected {expected}")]
    LengthMismatch {
        marker: MarkerCode,
        declared: usize,
        expected: usize,
    },

    #[error("Malformed {marker} segment: {detail}")]
    Malformed {
        marker: MarkerCode,
        detail: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unsupported feature in {marker} segment: {detail}")]
    Unsupported {
        marker: MarkerCode,
        detail: &'static str,
    },

    #[error(
        "The combination of bit depth, colour transform and wavelet kernel requires {bits} bits; \
         at most 38 are allowed"
    )]
    PrecisionOverflow { bits: u32 },

    #[error(
        "A coding style segment employs the DWT kernel atk = {0}, but a corresponding ATK \
         segment cannot be found"
    )]
    KernelNotFound(u8),

    #[error("Unexpected marker 0x{0:04X}")]
    UnexpectedMarker(u16),

    #[error("Line buffers passed to one transform call do not share a sample type")]
    LineTypeMismatch,
}

impl CodestreamError {
    pub(crate) fn malformed(marker: MarkerCode, detail: &'static str) -> Self {
        Self::Malformed { marker, detail }
    }

    pub(crate) fn unsupported(marker: MarkerCode, detail: &'static str) -> Self {
        Self::Unsupported { marker, detail }
    }

    pub(crate) fn length(marker: MarkerCode, declared: usize, expected: usize) -> Self {
        Self::LengthMismatch {
            marker,
            declared,
            expected,
        }
    }
}
