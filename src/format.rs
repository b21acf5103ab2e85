//! Engine-owned pixel formats and their mapping tables
//!
//! `PixelFormatKind` is what ends up in asset files. The graphics side works on
//! `TransferFormat`, and the two are related only through the explicit tables
//! below, never through numeric casts.

use image_dds::ImageFormat;

/// Pixel format of a texture as stored by the content pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormatKind {
    /// Uncompressed 4-channel 8-bit pixels, BGRA byte order
    Bgra8,
    /// DXT1 / BC1, 8 bytes per 4x4 block
    Dxt1,
    /// DXT3 / BC2, 16 bytes per 4x4 block, explicit alpha
    Dxt3,
    /// DXT5 / BC3, 16 bytes per 4x4 block, interpolated alpha
    Dxt5,
    /// Lossless PNG container (serialized bitmap levels only)
    Png,
    /// Lossy JPEG container (serialized bitmap levels only)
    Jpeg,
}

/// Every format kind, in wire-code order
pub const ALL_FORMATS: [PixelFormatKind; 6] = [
    PixelFormatKind::Png,
    PixelFormatKind::Jpeg,
    PixelFormatKind::Bgra8,
    PixelFormatKind::Dxt1,
    PixelFormatKind::Dxt3,
    PixelFormatKind::Dxt5,
];

impl PixelFormatKind {
    /// Numeric code written to asset files
    pub fn code(self) -> i32 {
        match self {
            PixelFormatKind::Png => 1,
            PixelFormatKind::Jpeg => 2,
            PixelFormatKind::Bgra8 => 0x1908,
            PixelFormatKind::Dxt1 => 0x83F1,
            PixelFormatKind::Dxt3 => 0x83F2,
            PixelFormatKind::Dxt5 => 0x83F3,
        }
    }

    /// Parse a numeric code read from an asset file
    pub fn from_code(code: i32) -> Option<Self> {
        ALL_FORMATS.iter().copied().find(|f| f.code() == code)
    }

    /// True for the block-compressed kinds
    pub fn is_block_compressed(self) -> bool {
        self.block_format().is_some()
    }

    /// True for the CPU image container kinds, which never reach the GPU
    pub fn is_container(self) -> bool {
        matches!(self, PixelFormatKind::Png | PixelFormatKind::Jpeg)
    }

    /// Block transfer format for compressed kinds
    pub fn block_format(self) -> Option<TransferFormat> {
        match self {
            PixelFormatKind::Dxt1 => Some(TransferFormat::Bc1),
            PixelFormatKind::Dxt3 => Some(TransferFormat::Bc2),
            PixelFormatKind::Dxt5 => Some(TransferFormat::Bc3),
            PixelFormatKind::Bgra8 | PixelFormatKind::Png | PixelFormatKind::Jpeg => None,
        }
    }

    /// Internal (destination) format used when uploading with this output kind
    pub fn upload_internal_format(self) -> TransferFormat {
        self.block_format().unwrap_or(TransferFormat::Rgba8)
    }

    /// Source format used to interpret pixel data of this input kind
    pub fn upload_source_format(self) -> TransferFormat {
        self.block_format().unwrap_or(TransferFormat::Bgra8)
    }

    /// Get format name for logging
    pub fn name(&self) -> &'static str {
        match self {
            PixelFormatKind::Bgra8 => "BGRA8",
            PixelFormatKind::Dxt1 => "DXT1",
            PixelFormatKind::Dxt3 => "DXT3",
            PixelFormatKind::Dxt5 => "DXT5",
            PixelFormatKind::Png => "PNG",
            PixelFormatKind::Jpeg => "JPEG",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BGRA" | "BGRA8" | "RGBA" | "RGBA8" | "B8G8R8A8" | "UNCOMPRESSED" => {
                Some(PixelFormatKind::Bgra8)
            }
            "DXT1" | "BC1" | "BC1_UNORM" => Some(PixelFormatKind::Dxt1),
            "DXT3" | "BC2" | "BC2_UNORM" => Some(PixelFormatKind::Dxt3),
            "DXT5" | "BC3" | "BC3_UNORM" => Some(PixelFormatKind::Dxt5),
            "PNG" => Some(PixelFormatKind::Png),
            "JPG" | "JPEG" => Some(PixelFormatKind::Jpeg),
            _ => None,
        }
    }
}

impl std::fmt::Display for PixelFormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.name())
    }
}

/// Formats understood by GPU transfers (upload source, internal storage, readback)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferFormat {
    Rgba8,
    Bgra8,
    Bc1,
    Bc2,
    Bc3,
}

impl TransferFormat {
    pub fn is_block_compressed(self) -> bool {
        matches!(self, TransferFormat::Bc1 | TransferFormat::Bc2 | TransferFormat::Bc3)
    }

    /// Bytes per 4x4 block, or per pixel for uncompressed formats
    pub fn unit_bytes(self) -> u32 {
        match self {
            TransferFormat::Rgba8 | TransferFormat::Bgra8 => 4,
            TransferFormat::Bc1 => 8,
            TransferFormat::Bc2 | TransferFormat::Bc3 => 16,
        }
    }

    /// Size in bytes of one image of the given dimensions
    pub fn level_byte_size(self, width: u32, height: u32) -> usize {
        if self.is_block_compressed() {
            let blocks = width.div_ceil(4) as usize * height.div_ceil(4) as usize;
            blocks * self.unit_bytes() as usize
        } else {
            width as usize * height as usize * self.unit_bytes() as usize
        }
    }

    /// Equivalent `wgpu` texture format
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TransferFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
            TransferFormat::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
            TransferFormat::Bc1 => wgpu::TextureFormat::Bc1RgbaUnorm,
            TransferFormat::Bc2 => wgpu::TextureFormat::Bc2RgbaUnorm,
            TransferFormat::Bc3 => wgpu::TextureFormat::Bc3RgbaUnorm,
        }
    }

    /// Equivalent `image_dds` format, used by the CPU block codec
    pub fn to_image_format(self) -> ImageFormat {
        match self {
            TransferFormat::Rgba8 => ImageFormat::Rgba8Unorm,
            TransferFormat::Bgra8 => ImageFormat::Bgra8Unorm,
            TransferFormat::Bc1 => ImageFormat::BC1RgbaUnorm,
            TransferFormat::Bc2 => ImageFormat::BC2RgbaUnorm,
            TransferFormat::Bc3 => ImageFormat::BC3RgbaUnorm,
        }
    }

    /// Block transfer format for a DDS surface format, if we can upload it as-is
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::BC1RgbaUnorm | ImageFormat::BC1RgbaUnormSrgb => Some(TransferFormat::Bc1),
            ImageFormat::BC2RgbaUnorm | ImageFormat::BC2RgbaUnormSrgb => Some(TransferFormat::Bc2),
            ImageFormat::BC3RgbaUnorm | ImageFormat::BC3RgbaUnormSrgb => Some(TransferFormat::Bc3),
            _ => None,
        }
    }
}

/// Number of levels in a full mip chain (down to 1x1)
pub fn full_chain_len(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Dimensions of a mip level in a full chain
pub fn level_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> level).max(1), (height >> level).max(1))
}
