//! Coding style default (COD) and coding style component (COC) segments.

use std::fmt;
use std::str::FromStr;

use super::atk::{Atk, DWT_IRV97, DWT_REV53, Kernel};
use super::siz::Siz;
use super::{OverrideList, Size, component_field_width};
use crate::error::CodestreamError;
use crate::marker_code::MarkerCode;
use crate::stream_reader::StreamReader;
use crate::stream_writer::StreamWriter;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Largest number of decomposition levels.
pub const MAX_DECOMPOSITIONS: u32 = 32;

const SCOD_PRECINCTS: u8 = 0x01;
const SCOD_SOP: u8 = 0x02;
const SCOD_EPH: u8 = 0x04;

const VERT_CAUSAL_MODE: u8 = 0x08;
const HT_MODE: u8 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ProgressionOrder {
    Lrcp = 0,
    Rlcp = 1,
    #[default]
    Rpcl = 2,
    Pcrl = 3,
    Cprl = 4,
}

impl ProgressionOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lrcp => "LRCP",
            Self::Rlcp => "RLCP",
            Self::Rpcl => "RPCL",
            Self::Pcrl => "PCRL",
            Self::Cprl => "CPRL",
        }
    }
}

impl fmt::Display for ProgressionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressionOrder {
    type Err = CodestreamError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        if name.len() != 4 {
            return Err(CodestreamError::InvalidConfiguration(format!(
                "improper progression order \"{name}\""
            )));
        }
        match name {
            "LRCP" => Ok(Self::Lrcp),
            "RLCP" => Ok(Self::Rlcp),
            "RPCL" => Ok(Self::Rpcl),
            "PCRL" => Ok(Self::Pcrl),
            "CPRL" => Ok(Self::Cprl),
            _ => Err(CodestreamError::InvalidConfiguration(format!(
                "unknown progression order \"{name}\""
            ))),
        }
    }
}

/// The per-component part of a coding style (Scod bit 0 plus SPcod), shared
/// by COD and COC.
#[derive(Debug, Clone, PartialEq)]
pub struct CodingStyle {
    scod: u8,
    /// Raw decomposition byte; bit 7 marks a DFS reference in COC.
    num_decomp: u8,
    block_width: u8,
    block_height: u8,
    block_style: u8,
    wavelet_trans: u8,
    precinct_size: [u8; MAX_DECOMPOSITIONS as usize + 1],
    kernel: Option<Kernel>,
}

impl Default for CodingStyle {
    fn default() -> Self {
        Self {
            scod: 0,
            num_decomp: 5,
            block_width: 4,
            block_height: 4,
            block_style: HT_MODE,
            wavelet_trans: DWT_IRV97,
            precinct_size: [0; MAX_DECOMPOSITIONS as usize + 1],
            kernel: None,
        }
    }
}

impl CodingStyle {
    pub fn set_num_decompositions(&mut self, levels: u32) -> Result<(), CodestreamError> {
        if levels > MAX_DECOMPOSITIONS {
            return Err(CodestreamError::InvalidConfiguration(
                "maximum number of decompositions cannot exceed 32".into(),
            ));
        }
        self.num_decomp = levels as u8;
        Ok(())
    }

    /// Sets the code-block size; both sides are powers of two in 4..=1024
    /// with an area of at most 4096 samples.
    pub fn set_block_dims(&mut self, width: u32, height: u32) -> Result<(), CodestreamError> {
        let valid = |v: u32| v.is_power_of_two() && v >= 4;
        if !valid(width)
            || !valid(height)
            || width.trailing_zeros() + height.trailing_zeros() > 12
        {
            return Err(CodestreamError::InvalidConfiguration(
                "incorrect code block dimensions".into(),
            ));
        }
        self.block_width = (width.trailing_zeros() - 2) as u8;
        self.block_height = (height.trailing_zeros() - 2) as u8;
        Ok(())
    }

    /// Sets precinct sizes from the lowest resolution up; resolutions past
    /// the end of `sizes` repeat its last entry. An empty slice selects the
    /// default maximal precincts.
    pub fn set_precinct_size(&mut self, sizes: &[Size]) -> Result<(), CodestreamError> {
        let Some(last) = sizes.last() else {
            self.scod &= !SCOD_PRECINCTS;
            return Ok(());
        };
        let levels = if self.is_dfs_defined() {
            MAX_DECOMPOSITIONS
        } else {
            u32::from(self.num_decomp)
        };
        let mut packed = self.precinct_size;
        for (i, slot) in packed.iter_mut().enumerate().take(levels as usize + 1) {
            let t = sizes.get(i).unwrap_or(last);
            if t.w == 0 || t.h == 0 {
                return Err(CodestreamError::InvalidConfiguration(
                    "precinct width or height cannot be 0".into(),
                ));
            }
            if !t.w.is_power_of_two() || !t.h.is_power_of_two() {
                return Err(CodestreamError::InvalidConfiguration(
                    "precinct width and height should be a power of 2".into(),
                ));
            }
            let (ppx, ppy) = (t.w.trailing_zeros(), t.h.trailing_zeros());
            if ppx > 15 || ppy > 15 {
                return Err(CodestreamError::InvalidConfiguration(
                    "precinct size is too large".into(),
                ));
            }
            if i > 0 && (ppx == 0 || ppy == 0) {
                return Err(CodestreamError::InvalidConfiguration(
                    "precinct size is too small".into(),
                ));
            }
            *slot = (ppx | ppy << 4) as u8;
        }
        self.precinct_size = packed;
        self.scod |= SCOD_PRECINCTS;
        Ok(())
    }

    /// Selects the standard reversible 5/3 or irreversible 9/7 kernel.
    pub fn set_reversible(&mut self, reversible: bool) {
        self.wavelet_trans = if reversible { DWT_REV53 } else { DWT_IRV97 };
        self.kernel = None;
    }

    /// Selects a kernel by index; indices 2..=255 need a matching ATK segment.
    pub fn set_wavelet_kernel(&mut self, index: u8) {
        self.wavelet_trans = index;
        self.kernel = None;
    }

    /// References DFS record `index` (0..=15) for this component override.
    pub fn set_dfs_index(&mut self, index: u8) -> Result<(), CodestreamError> {
        if index > 15 {
            return Err(CodestreamError::InvalidConfiguration(format!(
                "DFS index must be at most 15, got {index}"
            )));
        }
        self.num_decomp = 0x80 | index;
        Ok(())
    }

    pub fn set_vertical_causality(&mut self, enabled: bool) {
        if enabled {
            self.block_style |= VERT_CAUSAL_MODE;
        } else {
            self.block_style &= !VERT_CAUSAL_MODE;
        }
    }

    pub fn is_dfs_defined(&self) -> bool {
        self.num_decomp & 0x80 != 0
    }

    pub fn dfs_index(&self) -> Option<u16> {
        self.is_dfs_defined()
            .then_some(u16::from(self.num_decomp & 0xF))
    }

    pub fn log_block_dims(&self) -> Size {
        Size::new(
            u32::from(self.block_width) + 2,
            u32::from(self.block_height) + 2,
        )
    }

    pub fn block_dims(&self) -> Size {
        let log = self.log_block_dims();
        Size::new(1 << log.w, 1 << log.h)
    }

    pub fn block_style(&self) -> u8 {
        self.block_style
    }

    pub fn block_vertical_causality(&self) -> bool {
        self.block_style & VERT_CAUSAL_MODE != 0
    }

    pub fn uses_precincts(&self) -> bool {
        self.scod & SCOD_PRECINCTS != 0
    }

    pub fn log_precinct_size(&self, resolution: u32) -> Size {
        if !self.uses_precincts() {
            return Size::new(15, 15);
        }
        let packed = self.precinct_size[(resolution as usize).min(MAX_DECOMPOSITIONS as usize)];
        Size::new(u32::from(packed & 0xF), u32::from(packed >> 4))
    }

    pub fn precinct_size(&self, resolution: u32) -> Size {
        let log = self.log_precinct_size(resolution);
        Size::new(1 << log.w, 1 << log.h)
    }

    pub fn wavelet_kernel(&self) -> u8 {
        self.wavelet_trans
    }

    /// The kernel resolved by [`Cod::update_atk`], if it has run.
    pub fn kernel(&self) -> Option<&Kernel> {
        self.kernel.as_ref()
    }

    pub fn is_reversible(&self) -> bool {
        match self.wavelet_trans {
            DWT_IRV97 => false,
            DWT_REV53 => true,
            _ => self.kernel.as_ref().is_some_and(Kernel::is_reversible),
        }
    }

    fn as_override(&self) -> Self {
        Self {
            scod: self.scod & SCOD_PRECINCTS,
            ..self.clone()
        }
    }

    fn validate(&self, marker: MarkerCode, num_decompositions: u32) -> Result<(), CodestreamError> {
        if num_decompositions > MAX_DECOMPOSITIONS
            || self.block_width > 8
            || self.block_height > 8
            || self.block_width + self.block_height > 8
        {
            return Err(CodestreamError::malformed(
                marker,
                "wrong settings in the SPcod parameters",
            ));
        }
        if self.block_style & HT_MODE != HT_MODE || self.block_style & 0xB7 != 0 {
            return Err(CodestreamError::unsupported(
                marker,
                "code-block style other than HT with optional vertical causality",
            ));
        }
        Ok(())
    }

    fn write_body(&self, writer: &mut StreamWriter, num_decompositions: u32) {
        writer.write_u8(self.num_decomp);
        writer.write_u8(self.block_width);
        writer.write_u8(self.block_height);
        writer.write_u8(self.block_style);
        writer.write_u8(self.wavelet_trans);
        if self.uses_precincts() {
            writer.write_bytes(&self.precinct_size[..=num_decompositions as usize]);
        }
    }

    /// Reads SPcod/SPcoc. `main_decompositions` is the COD level count a DFS
    /// reference falls back to.
    fn read_body(
        reader: &mut StreamReader<'_>,
        marker: MarkerCode,
        scod: u8,
        main_decompositions: Option<u8>,
    ) -> Result<(Self, u32), CodestreamError> {
        let mut style = Self {
            scod,
            num_decomp: reader.read_u8()?,
            block_width: reader.read_u8()?,
            block_height: reader.read_u8()?,
            block_style: reader.read_u8()?,
            wavelet_trans: reader.read_u8()?,
            ..Self::default()
        };
        let levels = match main_decompositions {
            Some(main) if style.is_dfs_defined() => u32::from(main),
            _ => u32::from(style.num_decomp),
        };
        style.validate(marker, levels)?;
        if style.uses_precincts() {
            let count = levels as usize + 1;
            style.precinct_size[..count].copy_from_slice(reader.read_bytes(count)?);
        }
        Ok((style, levels))
    }
}

/// COD plus its COC overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Cod {
    main: CodingStyle,
    progression_order: ProgressionOrder,
    num_layers: u16,
    color_transform: bool,
    overrides: OverrideList<CodingStyle>,
}

impl Default for Cod {
    fn default() -> Self {
        Self {
            main: CodingStyle::default(),
            progression_order: ProgressionOrder::default(),
            num_layers: 1,
            color_transform: false,
            overrides: OverrideList::new(),
        }
    }
}

impl Cod {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn main(&self) -> &CodingStyle {
        &self.main
    }

    pub fn main_mut(&mut self) -> &mut CodingStyle {
        &mut self.main
    }

    /// The coding style in effect for `comp`.
    pub fn resolve(&self, comp: u16) -> &CodingStyle {
        self.overrides.get(comp).unwrap_or(&self.main)
    }

    /// Mutable access to the override of `comp`, created from the default
    /// record on first use.
    pub fn resolve_mut(&mut self, comp: u16) -> &mut CodingStyle {
        let main = &self.main;
        self.overrides
            .get_or_insert_with(comp, || main.as_override())
    }

    /// Adds (or resets) the override of `comp` to a copy of the default.
    pub fn add_override(&mut self, comp: u16) -> &mut CodingStyle {
        let record = self.main.as_override();
        self.overrides.insert(comp, record)
    }

    pub fn has_override(&self, comp: u16) -> bool {
        self.overrides.contains(comp)
    }

    pub fn overrides(&self) -> impl Iterator<Item = (u16, &CodingStyle)> {
        self.overrides.iter()
    }

    pub fn set_num_decompositions(&mut self, levels: u32) -> Result<(), CodestreamError> {
        self.main.set_num_decompositions(levels)
    }

    pub fn set_block_dims(&mut self, width: u32, height: u32) -> Result<(), CodestreamError> {
        self.main.set_block_dims(width, height)
    }

    pub fn set_precinct_size(&mut self, sizes: &[Size]) -> Result<(), CodestreamError> {
        self.main.set_precinct_size(sizes)
    }

    pub fn set_progression_order(&mut self, order: ProgressionOrder) {
        self.progression_order = order;
    }

    pub fn set_color_transform(&mut self, enabled: bool) {
        self.color_transform = enabled;
    }

    pub fn set_reversible(&mut self, reversible: bool) {
        self.main.set_reversible(reversible);
    }

    pub fn set_num_layers(&mut self, layers: u16) -> Result<(), CodestreamError> {
        if layers == 0 {
            return Err(CodestreamError::InvalidConfiguration(
                "the number of quality layers cannot be zero".into(),
            ));
        }
        self.num_layers = layers;
        Ok(())
    }

    pub fn progression_order(&self) -> ProgressionOrder {
        self.progression_order
    }

    pub fn num_layers(&self) -> u16 {
        self.num_layers
    }

    pub fn is_using_color_transform(&self) -> bool {
        self.color_transform
    }

    pub fn is_reversible(&self) -> bool {
        self.main.is_reversible()
    }

    pub fn num_decompositions(&self) -> u32 {
        u32::from(self.main.num_decomp)
    }

    /// Decomposition count of `comp`; a DFS-based override takes the count
    /// from the default record.
    pub fn component_num_decompositions(&self, comp: u16) -> u32 {
        let style = self.resolve(comp);
        if style.is_dfs_defined() {
            self.num_decompositions()
        } else {
            u32::from(style.num_decomp)
        }
    }

    pub fn packets_may_use_sop(&self) -> bool {
        self.main.scod & SCOD_SOP != 0
    }

    pub fn packets_use_eph(&self) -> bool {
        self.main.scod & SCOD_EPH != 0
    }

    pub fn set_packet_markers(&mut self, sop: bool, eph: bool) {
        self.main.scod &= SCOD_PRECINCTS;
        if sop {
            self.main.scod |= SCOD_SOP;
        }
        if eph {
            self.main.scod |= SCOD_EPH;
        }
    }

    /// Checks the colour transform and progression order against the image.
    pub fn check_validity(&self, siz: &Siz) -> Result<(), CodestreamError> {
        let num_comps = siz.num_components();
        if self.color_transform {
            if num_comps < 3 {
                return Err(CodestreamError::InvalidConfiguration(
                    "color transform can only be employed when the image has 3 or more \
                     color components"
                        .into(),
                ));
            }
            let first = (siz.downsampling(0), siz.bit_depth(0), siz.is_signed(0));
            for c in 1..3 {
                if siz.downsampling(c) != first.0 {
                    return Err(CodestreamError::InvalidConfiguration(
                        "when color transform is used, the first 3 colour components must \
                         have the same downsampling factor"
                            .into(),
                    ));
                }
                if siz.bit_depth(c) != first.1 {
                    return Err(CodestreamError::InvalidConfiguration(
                        "when color transform is used, the first 3 colour components must \
                         have the same bit depth"
                            .into(),
                    ));
                }
                if siz.is_signed(c) != first.2 {
                    return Err(CodestreamError::InvalidConfiguration(
                        "when color transform is used, the first 3 colour components must \
                         have the same signedness"
                            .into(),
                    ));
                }
            }
        }

        if matches!(
            self.progression_order,
            ProgressionOrder::Rpcl | ProgressionOrder::Pcrl
        ) {
            for c in 0..num_comps {
                let r = siz.downsampling(c);
                if !r.x.is_power_of_two() || !r.y.is_power_of_two() {
                    return Err(CodestreamError::InvalidConfiguration(
                        "for RPCL and PCRL progression orders, component downsampling \
                         factors have to be powers of 2"
                            .into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Resolves the wavelet kernel of the default record and every override.
    pub fn update_atk(&mut self, atk: &mut Atk) -> Result<(), CodestreamError> {
        let index = self.main.wavelet_trans;
        self.main.kernel = Some(
            atk.resolve(index)
                .cloned()
                .ok_or(CodestreamError::KernelNotFound(index))?,
        );
        for (_, style) in self.overrides.iter_mut() {
            let index = style.wavelet_trans;
            style.kernel = Some(
                atk.resolve(index)
                    .cloned()
                    .ok_or(CodestreamError::KernelNotFound(index))?,
            );
        }
        Ok(())
    }

    pub fn write(&self, writer: &mut StreamWriter) {
        let levels = self.num_decompositions();
        let precincts = if self.main.uses_precincts() { 1 + levels } else { 0 };
        writer.write_marker(MarkerCode::CodingStyleDefault);
        writer.write_u16((12 + precincts) as u16);
        writer.write_u8(self.main.scod);
        writer.write_u8(self.progression_order.into());
        writer.write_u16(self.num_layers);
        writer.write_u8(u8::from(self.color_transform));
        self.main.write_body(writer, levels);
    }

    /// Writes a COC segment for every override of an existing component.
    pub fn write_coc(&self, writer: &mut StreamWriter, num_comps: u16) {
        let field = component_field_width(num_comps);
        for (comp, style) in self.overrides.iter().filter(|(c, _)| *c < num_comps) {
            let levels = self.component_num_decompositions(comp);
            let precincts = if style.uses_precincts() { 1 + levels as usize } else { 0 };
            writer.write_marker(MarkerCode::CodingStyleComponent);
            writer.write_u16((8 + field + precincts) as u16);
            if field == 1 {
                writer.write_u8(comp as u8);
            } else {
                writer.write_u16(comp);
            }
            writer.write_u8(style.scod);
            style.write_body(writer, levels);
        }
    }

    /// Reads a COD segment body into the default record.
    pub fn read(&mut self, reader: &mut StreamReader<'_>) -> Result<(), CodestreamError> {
        let marker = MarkerCode::CodingStyleDefault;
        let lcod = reader.read_u16()? as usize;
        let scod = reader.read_u8()?;
        self.progression_order = ProgressionOrder::try_from(reader.read_u8()?).map_err(|_| {
            CodestreamError::malformed(marker, "unknown progression order in COD-SGcod")
        })?;
        self.num_layers = reader.read_u16()?;
        self.color_transform = match reader.read_u8()? {
            0 => false,
            1 => true,
            other => {
                lwarn!(
                    "Multiple component transform {} in COD-SGcod is not supported; \
                     no colour transform is applied",
                    other
                );
                false
            }
        };
        let (style, levels) = CodingStyle::read_body(reader, marker, scod, None)?;
        let expected = 12 + if style.uses_precincts() { 1 + levels as usize } else { 0 };
        if lcod != expected {
            return Err(CodestreamError::length(marker, lcod, expected));
        }
        self.main = style;
        Ok(())
    }

    /// Reads a COC segment body into the override of its component and
    /// returns that component index.
    pub fn read_coc(
        &mut self,
        reader: &mut StreamReader<'_>,
        num_comps: u16,
    ) -> Result<u16, CodestreamError> {
        let marker = MarkerCode::CodingStyleComponent;
        let lcoc = reader.read_u16()? as usize;
        let field = component_field_width(num_comps);
        let comp = if field == 1 {
            u16::from(reader.read_u8()?)
        } else {
            reader.read_u16()?
        };
        let scoc = reader.read_u8()?;
        if scoc & 0xF8 != 0 {
            lwarn!("Unsupported options in Scoc field of the COC segment");
        }
        let (style, levels) =
            CodingStyle::read_body(reader, marker, scoc, Some(self.main.num_decomp))?;
        let expected =
            8 + field + if style.uses_precincts() { 1 + levels as usize } else { 0 };
        if lcoc != expected {
            return Err(CodestreamError::length(marker, lcoc, expected));
        }
        if self.overrides.contains(comp) {
            return Err(CodestreamError::malformed(
                marker,
                "more than one COC segment for the same component",
            ));
        }
        ldebug!("COC for component {}", comp);
        self.overrides.insert(comp, style);
        Ok(comp)
    }

    /// Drops overrides of components that no longer exist.
    pub fn trim(&mut self, num_comps: u16) {
        for comp in self.overrides.trim(u32::from(num_comps)) {
            linfo!(
                "Removing the coding style override of component {}, which does not exist; \
                 the image has {} components",
                comp,
                num_comps
            );
        }
    }

    /// Returns to the default configuration, keeping override storage.
    pub fn clear(&mut self) {
        self.main = CodingStyle::default();
        self.progression_order = ProgressionOrder::default();
        self.num_layers = 1;
        self.color_transform = false;
        self.overrides.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Point;

    fn written(cod: &Cod, num_comps: u16) -> Vec<u8> {
        let mut writer = StreamWriter::new();
        cod.write(&mut writer);
        cod.write_coc(&mut writer, num_comps);
        writer.into_bytes()
    }

    #[test]
    fn test_parse_cod() {
        let data = vec![
            0x00, 0x0C, // Lcod = 12
            0x06, // Scod: SOP, EPH
            0x00, // LRCP
            0x00, 0x03, // 3 layers
            0x01, // colour transform
            0x05, // 5 decompositions
            0x04, 0x04, // 64x64 blocks
            0x40, // HT
            0x01, // 5/3
        ];
        let mut reader = StreamReader::new(&data);
        let mut cod = Cod::new();
        cod.read(&mut reader).unwrap();

        assert_eq!(cod.progression_order(), ProgressionOrder::Lrcp);
        assert_eq!(cod.num_layers(), 3);
        assert!(cod.is_using_color_transform());
        assert!(cod.packets_may_use_sop());
        assert!(cod.packets_use_eph());
        assert!(cod.is_reversible());
        assert_eq!(cod.main().block_dims(), Size::new(64, 64));
        assert_eq!(cod.main().log_precinct_size(3), Size::new(15, 15));
        assert_eq!(written(&cod, 1)[2..], data[..]);
    }

    #[test]
    fn test_precinct_sizes_repeat_last() {
        let mut cod = Cod::new();
        cod.set_num_decompositions(3).unwrap();
        cod.set_precinct_size(&[Size::new(128, 128), Size::new(256, 256)])
            .unwrap();
        assert_eq!(cod.main().precinct_size(0), Size::new(128, 128));
        assert_eq!(cod.main().precinct_size(3), Size::new(256, 256));

        let bytes = written(&cod, 1);
        // Lcod = 12 + 1 + 3
        assert_eq!(&bytes[2..4], &[0x00, 0x10]);
        assert_eq!(&bytes[14..], &[0x77, 0x88, 0x88, 0x88]);

        assert!(cod.set_precinct_size(&[Size::new(96, 128)]).is_err());
        assert!(
            cod.set_precinct_size(&[Size::new(1, 1), Size::new(1, 2)])
                .is_err()
        );
    }

    #[test]
    fn test_setters_validate() {
        let mut cod = Cod::new();
        assert!(cod.set_num_decompositions(33).is_err());
        assert!(cod.set_block_dims(128, 64).is_err());
        assert!(cod.set_block_dims(2, 64).is_err());
        assert!(cod.set_block_dims(48, 64).is_err());
        cod.set_block_dims(1024, 4).unwrap();
        assert_eq!(cod.main().log_block_dims(), Size::new(10, 2));
    }

    #[test]
    fn test_progression_order_from_str() {
        assert_eq!("CPRL".parse::<ProgressionOrder>(), Ok(ProgressionOrder::Cprl));
        assert!(matches!(
            "XYZW".parse::<ProgressionOrder>(),
            Err(CodestreamError::InvalidConfiguration(msg)) if msg.starts_with("unknown")
        ));
        assert!(matches!(
            "RPC".parse::<ProgressionOrder>(),
            Err(CodestreamError::InvalidConfiguration(msg)) if msg.starts_with("improper")
        ));
        assert_eq!(ProgressionOrder::Rpcl.to_string(), "RPCL");
    }

    #[test]
    fn test_override_resolution_and_trim() {
        let mut cod = Cod::new();
        cod.set_reversible(true);
        cod.add_override(3).set_num_decompositions(2).unwrap();
        assert_eq!(cod.component_num_decompositions(3), 2);
        assert_eq!(cod.component_num_decompositions(1), 5);
        assert!(cod.resolve(3).is_reversible());

        cod.trim(3);
        assert!(!cod.has_override(3));
        assert_eq!(cod.component_num_decompositions(3), 5);
    }

    #[test]
    fn test_coc_roundtrip_wide_component_field() {
        for (num_comps, comp) in [(256u16, 255u16), (257, 256)] {
            let mut cod = Cod::new();
            let style = cod.resolve_mut(comp);
            style.set_num_decompositions(2).unwrap();
            style.set_reversible(true);
            style.set_precinct_size(&[Size::new(64, 64)]).unwrap();

            let mut writer = StreamWriter::new();
            cod.write_coc(&mut writer, num_comps);
            let bytes = writer.into_bytes();
            let field = component_field_width(num_comps);
            assert_eq!(bytes.len(), 2 + 2 + field + 1 + 5 + 3);

            let mut parsed = Cod::new();
            parsed
                .read_coc(&mut StreamReader::new(&bytes[2..]), num_comps)
                .unwrap();
            assert_eq!(parsed.resolve(comp), cod.resolve(comp));
        }
    }

    #[test]
    fn test_coc_with_dfs_takes_main_decompositions() {
        let mut cod = Cod::new();
        cod.set_num_decompositions(3).unwrap();
        cod.resolve_mut(1).set_dfs_index(2).unwrap();
        assert_eq!(cod.resolve(1).dfs_index(), Some(2));
        assert_eq!(cod.component_num_decompositions(1), 3);

        let mut writer = StreamWriter::new();
        cod.write_coc(&mut writer, 2);
        let bytes = writer.into_bytes();
        let mut parsed = Cod::new();
        parsed.set_num_decompositions(3).unwrap();
        parsed
            .read_coc(&mut StreamReader::new(&bytes[2..]), 2)
            .unwrap();
        assert_eq!(parsed.resolve(1).dfs_index(), Some(2));
    }

    #[test]
    fn test_read_rejects_bad_spcod() {
        let mut base = vec![0x00, 0x0C, 0x00, 0x02, 0x00, 0x01, 0x00, 0x05, 0x04, 0x04, 0x40, 0x00];
        // 128x64 blocks
        base[8] = 0x05;
        assert!(Cod::new().read(&mut StreamReader::new(&base)).is_err());
        // non-HT block coder
        base[8] = 0x04;
        base[10] = 0x00;
        assert!(matches!(
            Cod::new().read(&mut StreamReader::new(&base)),
            Err(CodestreamError::Unsupported { .. })
        ));
        // length disagrees with precinct flag
        base[10] = 0x40;
        base[2] = 0x01;
        assert!(Cod::new().read(&mut StreamReader::new(&base)).is_err());
    }

    #[test]
    fn test_check_validity() {
        let mut siz = Siz::new();
        siz.set_image_extent(Point::new(64, 64));
        siz.set_num_components(3).unwrap();
        siz.set_component(2, Point::new(2, 2), 8, false).unwrap();

        let mut cod = Cod::new();
        cod.set_color_transform(true);
        assert!(cod.check_validity(&siz).is_err());

        cod.set_color_transform(false);
        cod.check_validity(&siz).unwrap();

        siz.set_component(2, Point::new(3, 1), 8, false).unwrap();
        assert!(cod.check_validity(&siz).is_err());
        cod.set_progression_order(ProgressionOrder::Lrcp);
        cod.check_validity(&siz).unwrap();
    }

    #[test]
    fn test_update_atk_reports_missing_kernel() {
        let mut atk = Atk::new();
        let mut cod = Cod::new();
        cod.resolve_mut(0).set_wavelet_kernel(4);
        assert_eq!(cod.update_atk(&mut atk), Err(CodestreamError::KernelNotFound(4)));

        let mut cod = Cod::new();
        cod.set_reversible(true);
        cod.update_atk(&mut atk).unwrap();
        assert!(cod.main().kernel().is_some_and(Kernel::is_reversible));
    }
}
