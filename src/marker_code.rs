use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// JPEG 2000 (ISO/IEC 15444-1, -2, -15) codestream marker codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum MarkerCode {
    /// SOC: Start of codestream.
    StartOfCodestream = 0xFF4F,
    /// CAP: Extended capabilities.
    Capabilities = 0xFF50,
    /// SIZ: Image and tile size.
    ImageAndTileSize = 0xFF51,
    /// COD: Coding style default.
    CodingStyleDefault = 0xFF52,
    /// COC: Coding style component.
    CodingStyleComponent = 0xFF53,
    /// TLM: Tile-part lengths.
    TilePartLengths = 0xFF55,
    /// PRF: Profile.
    Profile = 0xFF56,
    /// PLM: Packet lengths, main header.
    PacketLengthsMain = 0xFF57,
    /// PLT: Packet lengths, tile-part header.
    PacketLengthsTile = 0xFF58,
    /// CPF: Corresponding profile.
    CorrespondingProfile = 0xFF59,
    /// QCD: Quantization default.
    QuantizationDefault = 0xFF5C,
    /// QCC: Quantization component.
    QuantizationComponent = 0xFF5D,
    /// RGN: Region of interest.
    RegionOfInterest = 0xFF5E,
    /// POC: Progression order change.
    ProgressionOrderChange = 0xFF5F,
    /// PPM: Packed packet headers, main header.
    PackedPacketHeadersMain = 0xFF60,
    /// PPT: Packed packet headers, tile-part header.
    PackedPacketHeadersTile = 0xFF61,
    /// CRG: Component registration.
    ComponentRegistration = 0xFF63,
    /// COM: Comment.
    Comment = 0xFF64,
    /// DFS: Downsampling factor styles.
    DownsamplingFactorStyles = 0xFF72,
    /// ADS: Arbitrary decomposition styles.
    ArbitraryDecompositionStyles = 0xFF73,
    /// NLT: Non-linearity point transformation.
    Nonlinearity = 0xFF76,
    /// ATK: Arbitrary transformation kernels.
    ArbitraryTransformKernel = 0xFF79,
    /// SOT: Start of tile-part.
    StartOfTile = 0xFF90,
    /// SOP: Start of packet.
    StartOfPacket = 0xFF91,
    /// EPH: End of packet header.
    EndOfPacketHeader = 0xFF92,
    /// SOD: Start of data.
    StartOfData = 0xFF93,
    /// EOC: End of codestream.
    EndOfCodestream = 0xFFD9,
}

impl MarkerCode {
    /// The three-letter mnemonic used by the standard.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::StartOfCodestream => "SOC",
            Self::Capabilities => "CAP",
            Self::ImageAndTileSize => "SIZ",
            Self::CodingStyleDefault => "COD",
            Self::CodingStyleComponent => "COC",
            Self::TilePartLengths => "TLM",
            Self::Profile => "PRF",
            Self::PacketLengthsMain => "PLM",
            Self::PacketLengthsTile => "PLT",
            Self::CorrespondingProfile => "CPF",
            Self::QuantizationDefault => "QCD",
            Self::QuantizationComponent => "QCC",
            Self::RegionOfInterest => "RGN",
            Self::ProgressionOrderChange => "POC",
            Self::PackedPacketHeadersMain => "PPM",
            Self::PackedPacketHeadersTile => "PPT",
            Self::ComponentRegistration => "CRG",
            Self::Comment => "COM",
            Self::DownsamplingFactorStyles => "DFS",
            Self::ArbitraryDecompositionStyles => "ADS",
            Self::Nonlinearity => "NLT",
            Self::ArbitraryTransformKernel => "ATK",
            Self::StartOfTile => "SOT",
            Self::StartOfPacket => "SOP",
            Self::EndOfPacketHeader => "EPH",
            Self::StartOfData => "SOD",
            Self::EndOfCodestream => "EOC",
        }
    }

    /// True for delimiting markers that carry no length field.
    pub fn is_delimiter(self) -> bool {
        matches!(
            self,
            Self::StartOfCodestream
                | Self::StartOfData
                | Self::EndOfCodestream
                | Self::EndOfPacketHeader
        )
    }
}

impl fmt::Display for MarkerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
