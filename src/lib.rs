//! HTJ2K (JPEG 2000 Part 15) codestream parameter model and lifting wavelet
//! transform core.
//!
//! - [`params`] holds typed records for the main-header marker segments,
//!   the quantization deriver and the wavelet kernel registry.
//! - [`codestream`] validates, writes and parses a complete main header.
//! - [`transform`] runs one level of the forward or inverse DWT on sample
//!   lines.

#[macro_use]
mod log;

pub mod codestream;
pub mod error;
pub mod marker_code;
pub mod params;
pub mod stream_reader;
pub mod stream_writer;
pub mod transform;

pub use codestream::{Codestream, TilePart};
pub use error::CodestreamError;
pub use marker_code::MarkerCode;
pub use stream_reader::StreamReader;
pub use stream_writer::StreamWriter;
