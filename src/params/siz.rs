//! Image and tile size (SIZ) segment.

use super::cod::Cod;
use super::dfs::Dfs;
use super::{Point, Size};
use crate::error::CodestreamError;
use crate::marker_code::MarkerCode;
use crate::stream_reader::StreamReader;
use crate::stream_writer::StreamWriter;

/// Rsiz bit announcing a non-linearity point transformation (Part 2).
pub const RSIZ_NLT_FLAG: u16 = 0x0200;
/// Rsiz bit announcing an HTJ2K (Part 15) codestream.
pub const RSIZ_HT_FLAG: u16 = 0x4000;
/// Rsiz bit announcing Part 2 extensions.
pub const RSIZ_EXT_FLAG: u16 = 0x8000;

const RSIZ_WS_KERNEL_FLAG: u16 = 0x0020;
const RSIZ_DFS_FLAG: u16 = 0x0080;
const RSIZ_UNIMPLEMENTED_EXT: u16 = 0x0D5F;

/// Largest number of components a SIZ segment may declare.
pub const MAX_COMPONENTS: u16 = 16384;
/// Largest supported component bit depth.
pub const MAX_BIT_DEPTH: u32 = 38;

/// Per-component precision and subsampling, as carried in SIZ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Bit depth minus one, with bit 7 set for signed samples.
    pub ssiz: u8,
    /// Horizontal subsampling factor.
    pub xrsiz: u8,
    /// Vertical subsampling factor.
    pub yrsiz: u8,
}

impl Default for ComponentInfo {
    fn default() -> Self {
        Self {
            ssiz: 7,
            xrsiz: 1,
            yrsiz: 1,
        }
    }
}

impl ComponentInfo {
    pub fn bit_depth(&self) -> u32 {
        u32::from(self.ssiz & 0x7F) + 1
    }

    pub fn is_signed(&self) -> bool {
        self.ssiz & 0x80 != 0
    }

    pub fn downsampling(&self) -> Point {
        Point::new(u32::from(self.xrsiz), u32::from(self.yrsiz))
    }
}

/// The SIZ segment: reference grid, tiling and component descriptors.
#[derive(Debug, Clone, PartialEq)]
pub struct Siz {
    rsiz: u16,
    image_extent: Point,
    image_offset: Point,
    tile_size: Size,
    tile_offset: Point,
    components: Vec<ComponentInfo>,
    skipped_resolutions: u32,
    ws_kernel_support_needed: bool,
    dfs_support_needed: bool,
}

impl Default for Siz {
    fn default() -> Self {
        Self {
            rsiz: RSIZ_HT_FLAG,
            image_extent: Point::default(),
            image_offset: Point::default(),
            tile_size: Size::default(),
            tile_offset: Point::default(),
            components: Vec::new(),
            skipped_resolutions: 0,
            ws_kernel_support_needed: false,
            dfs_support_needed: false,
        }
    }
}

impl Siz {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_image_extent(&mut self, extent: Point) {
        self.image_extent = extent;
    }

    pub fn set_image_offset(&mut self, offset: Point) {
        self.image_offset = offset;
    }

    pub fn set_tile_size(&mut self, size: Size) {
        self.tile_size = size;
    }

    pub fn set_tile_offset(&mut self, offset: Point) {
        self.tile_offset = offset;
    }

    /// Resizes the component array; every component is reset to 8-bit
    /// unsigned without subsampling.
    pub fn set_num_components(&mut self, num_comps: u16) -> Result<(), CodestreamError> {
        if num_comps == 0 || num_comps > MAX_COMPONENTS {
            return Err(CodestreamError::InvalidConfiguration(format!(
                "number of components must be in 1..={MAX_COMPONENTS}, got {num_comps}"
            )));
        }
        self.components.clear();
        self.components
            .resize(num_comps as usize, ComponentInfo::default());
        Ok(())
    }

    pub fn set_component(
        &mut self,
        comp: u16,
        downsampling: Point,
        bit_depth: u32,
        is_signed: bool,
    ) -> Result<(), CodestreamError> {
        let num_comps = self.num_components();
        let info = self.components.get_mut(comp as usize).ok_or_else(|| {
            CodestreamError::InvalidConfiguration(format!(
                "component {comp} does not exist; the image has {num_comps} components"
            ))
        })?;
        if !(1..=MAX_BIT_DEPTH).contains(&bit_depth) {
            return Err(CodestreamError::InvalidConfiguration(format!(
                "bit depth must be in 1..={MAX_BIT_DEPTH}, got {bit_depth}"
            )));
        }
        if !(1..=255).contains(&downsampling.x) || !(1..=255).contains(&downsampling.y) {
            return Err(CodestreamError::InvalidConfiguration(
                "component downsampling factors must be in 1..=255".into(),
            ));
        }
        info.ssiz = (bit_depth - 1) as u8 | if is_signed { 0x80 } else { 0 };
        info.xrsiz = downsampling.x as u8;
        info.yrsiz = downsampling.y as u8;
        Ok(())
    }

    pub fn set_skipped_resolutions(&mut self, skipped: u32) {
        self.skipped_resolutions = skipped;
    }

    pub fn set_rsiz_flag(&mut self, flag: u16) {
        self.rsiz |= flag;
    }

    pub fn reset_rsiz_flag(&mut self, flag: u16) {
        self.rsiz &= !flag;
    }

    pub fn rsiz(&self) -> u16 {
        self.rsiz
    }

    pub fn image_extent(&self) -> Point {
        self.image_extent
    }

    pub fn image_offset(&self) -> Point {
        self.image_offset
    }

    pub fn tile_size(&self) -> Size {
        self.tile_size
    }

    pub fn tile_offset(&self) -> Point {
        self.tile_offset
    }

    pub fn num_components(&self) -> u16 {
        self.components.len() as u16
    }

    pub fn components(&self) -> &[ComponentInfo] {
        &self.components
    }

    pub fn component(&self, comp: u16) -> Option<&ComponentInfo> {
        self.components.get(comp as usize)
    }

    /// Bit depth of `comp`; components outside the array report 0.
    pub fn bit_depth(&self, comp: u16) -> u32 {
        self.component(comp).map_or(0, ComponentInfo::bit_depth)
    }

    pub fn is_signed(&self, comp: u16) -> bool {
        self.component(comp).is_some_and(ComponentInfo::is_signed)
    }

    pub fn downsampling(&self, comp: u16) -> Point {
        self.component(comp)
            .map_or(Point::new(1, 1), ComponentInfo::downsampling)
    }

    pub fn is_ws_kernel_support_needed(&self) -> bool {
        self.ws_kernel_support_needed
    }

    pub fn is_dfs_support_needed(&self) -> bool {
        self.dfs_support_needed
    }

    /// Component width on its own sampling grid.
    pub fn width(&self, comp: u16) -> u32 {
        let ds = self.downsampling(comp).x;
        self.image_extent
            .x
            .div_ceil(ds)
            .saturating_sub(self.image_offset.x.div_ceil(ds))
    }

    /// Component height on its own sampling grid.
    pub fn height(&self, comp: u16) -> u32 {
        let ds = self.downsampling(comp).y;
        self.image_extent
            .y
            .div_ceil(ds)
            .saturating_sub(self.image_offset.y.div_ceil(ds))
    }

    /// Overall downsampling of `comp` once `skipped_resolutions` levels are
    /// dropped during reconstruction.
    pub fn recon_downsampling(&self, comp: u16, cod: &Cod, dfs: &Dfs) -> Point {
        let skipped = self.skipped_resolutions;
        let shifted = 1u32.checked_shl(skipped).unwrap_or(u32::MAX);
        let mut factor = Point::new(shifted, shifted);
        if let Some(record) = cod
            .resolve(comp)
            .dfs_index()
            .and_then(|index| dfs.get(index))
        {
            factor = record.resolution_downsampling(skipped);
        }
        let ds = self.downsampling(comp);
        Point::new(factor.x.saturating_mul(ds.x), factor.y.saturating_mul(ds.y))
    }

    pub fn recon_size(&self, comp: u16, cod: &Cod, dfs: &Dfs) -> Point {
        let factor = self.recon_downsampling(comp, cod, dfs);
        Point::new(
            self.image_extent
                .x
                .div_ceil(factor.x)
                .saturating_sub(self.image_offset.x.div_ceil(factor.x)),
            self.image_extent
                .y
                .div_ceil(factor.y)
                .saturating_sub(self.image_offset.y.div_ceil(factor.y)),
        )
    }

    /// Number of tiles across and down the image.
    pub fn num_tiles(&self) -> Size {
        if self.tile_size.w == 0 || self.tile_size.h == 0 {
            return Size::new(0, 0);
        }
        let across = self.image_extent.x.saturating_sub(self.tile_offset.x);
        let down = self.image_extent.y.saturating_sub(self.tile_offset.y);
        Size::new(
            across.div_ceil(self.tile_size.w),
            down.div_ceil(self.tile_size.h),
        )
    }

    /// Fills in a default single-tile size and checks the tiling geometry.
    pub fn check_validity(&mut self) -> Result<(), CodestreamError> {
        if self.tile_size.w == 0 && self.tile_size.h == 0 {
            self.tile_size = Size::new(
                self.image_extent.x.wrapping_add(self.image_offset.x),
                self.image_extent.y.wrapping_add(self.image_offset.y),
            );
        }
        if self.image_extent.x == 0
            || self.image_extent.y == 0
            || self.tile_size.w == 0
            || self.tile_size.h == 0
        {
            return Err(CodestreamError::InvalidConfiguration(
                "You cannot set image extent nor tile size to zero".into(),
            ));
        }
        if self.tile_offset.x > self.image_offset.x || self.tile_offset.y > self.image_offset.y {
            return Err(CodestreamError::InvalidConfiguration(
                "tile offset has to be smaller than image offset".into(),
            ));
        }
        let tile_right = u64::from(self.tile_size.w) + u64::from(self.tile_offset.x);
        let tile_bottom = u64::from(self.tile_size.h) + u64::from(self.tile_offset.y);
        if tile_right <= u64::from(self.image_offset.x)
            || tile_bottom <= u64::from(self.image_offset.y)
        {
            return Err(CodestreamError::InvalidConfiguration(
                "the top left tile must intersect with the image".into(),
            ));
        }
        if self.components.is_empty() {
            return Err(CodestreamError::InvalidConfiguration(
                "the image must have at least one component".into(),
            ));
        }
        Ok(())
    }

    pub fn write(&self, writer: &mut StreamWriter) {
        let csiz = self.num_components();
        writer.write_marker(MarkerCode::ImageAndTileSize);
        writer.write_u16(38 + 3 * csiz);
        writer.write_u16(self.rsiz);
        writer.write_u32(self.image_extent.x);
        writer.write_u32(self.image_extent.y);
        writer.write_u32(self.image_offset.x);
        writer.write_u32(self.image_offset.y);
        writer.write_u32(self.tile_size.w);
        writer.write_u32(self.tile_size.h);
        writer.write_u32(self.tile_offset.x);
        writer.write_u32(self.tile_offset.y);
        writer.write_u16(csiz);
        for info in &self.components {
            writer.write_u8(info.ssiz);
            writer.write_u8(info.xrsiz);
            writer.write_u8(info.yrsiz);
        }
    }

    /// Reads a SIZ segment body; the marker code has already been consumed.
    pub fn read(reader: &mut StreamReader<'_>) -> Result<Self, CodestreamError> {
        let marker = MarkerCode::ImageAndTileSize;
        let lsiz = reader.read_u16()? as usize;
        let num_comps = lsiz.saturating_sub(38) / 3;
        if lsiz != 38 + 3 * num_comps || num_comps == 0 {
            return Err(CodestreamError::length(marker, lsiz, 38 + 3 * num_comps.max(1)));
        }
        let rsiz = reader.read_u16()?;
        if rsiz & RSIZ_HT_FLAG == 0 {
            return Err(CodestreamError::malformed(
                marker,
                "Rsiz bit 14 is not set (this is not an HTJ2K codestream)",
            ));
        }
        if rsiz & RSIZ_EXT_FLAG != 0 && rsiz & RSIZ_UNIMPLEMENTED_EXT != 0 {
            lwarn!("Rsiz in SIZ has unimplemented fields (0x{:04X})", rsiz);
        }

        let mut siz = Siz {
            rsiz,
            ..Siz::default()
        };
        siz.image_extent = Point::new(reader.read_u32()?, reader.read_u32()?);
        siz.image_offset = Point::new(reader.read_u32()?, reader.read_u32()?);
        siz.tile_size = Size::new(reader.read_u32()?, reader.read_u32()?);
        siz.tile_offset = Point::new(reader.read_u32()?, reader.read_u32()?);
        if siz.image_offset.x >= siz.image_extent.x || siz.image_offset.y >= siz.image_extent.y {
            return Err(CodestreamError::malformed(
                marker,
                "image offset must be smaller than the image extent",
            ));
        }
        let csiz = reader.read_u16()?;
        if csiz as usize != num_comps {
            return Err(CodestreamError::malformed(
                marker,
                "Csiz does not match the SIZ marker size",
            ));
        }
        siz.components.reserve(num_comps);
        for _ in 0..csiz {
            let info = ComponentInfo {
                ssiz: reader.read_u8()?,
                xrsiz: reader.read_u8()?,
                yrsiz: reader.read_u8()?,
            };
            if info.xrsiz == 0 || info.yrsiz == 0 {
                return Err(CodestreamError::malformed(
                    marker,
                    "component subsampling factor of zero",
                ));
            }
            siz.components.push(info);
        }

        siz.ws_kernel_support_needed = rsiz & RSIZ_WS_KERNEL_FLAG != 0;
        siz.dfs_support_needed = rsiz & RSIZ_DFS_FLAG != 0;
        Ok(siz)
    }
}
