//! Marker-segment parameter model.
//!
//! This module contains the typed records for the main-header and tile-part
//! header marker segments of an HTJ2K codestream:
//! - `siz`: image and tile geometry (SIZ).
//! - `cap`: extended capabilities (CAP).
//! - `cod`: coding style default and component overrides (COD/COC).
//! - `qcd`: quantization default and component overrides (QCD/QCC).
//! - `nlt`: non-linearity point transformation (NLT).
//! - `dfs`: downsampling factor styles (DFS).
//! - `atk`: arbitrary transformation kernels and the kernel registry (ATK).
//! - `sot`, `tlm`, `com`: tile-part header, tile-part lengths and comments.
//! - `gains`: energy and BIBO gain tables of the standard wavelet kernels.

pub mod atk;
pub mod cap;
pub mod cod;
pub mod com;
pub mod dfs;
pub mod gains;
pub mod nlt;
pub mod overrides;
pub mod qcd;
pub mod siz;
pub mod sot;
pub mod tlm;

pub use atk::{Atk, CoefficientType, Kernel, LiftingStep};
pub use cap::Cap;
pub use cod::{Cod, CodingStyle, ProgressionOrder};
pub use com::Comment;
pub use dfs::{Dfs, DfsRecord, DwtType};
pub use nlt::{Nlt, NonlinearityType};
pub use overrides::OverrideList;
pub use qcd::{Qcd, QuantizationRecord};
pub use siz::{ComponentInfo, Siz};
pub use sot::Sot;
pub use tlm::Tlm;

/// A position on the reference grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// A width and height pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub const fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }
}

/// Width in bytes of a component index field in COC/QCC segments.
pub(crate) fn component_field_width(num_comps: u16) -> usize {
    if num_comps < 257 { 1 } else { 2 }
}
