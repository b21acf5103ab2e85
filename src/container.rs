//! On-disk texture asset container
//!
//! Layout (little-endian): magic `MFTX`, u32 version, i32 width, i32 height,
//! i32 format code, u8 generate flag, i32 mip count, i32 level count, then
//! each level as written by [`MipLevelRecord::serialize`].

use anyhow::{Context, Result};
use binrw::prelude::*;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use tracing::debug;

use crate::builder::{BuiltTexture, TextureMetadata};
use crate::error::BuildError;
use crate::format::PixelFormatKind;
use crate::record::MipLevelRecord;
use crate::writer::{ContentReader, ContentWriter};

/// Current container version
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little, magic = b"MFTX")]
struct AssetHeader {
    version: u32,
    width: i32,
    height: i32,
    format_code: i32,
    generate_mipmaps: u8,
    mip_count: i32,
    level_count: i32,
}

/// A built texture as stored on disk
#[derive(Debug, Clone, PartialEq)]
pub struct TextureAsset {
    pub metadata: TextureMetadata,
    pub levels: Vec<MipLevelRecord>,
}

impl From<BuiltTexture> for TextureAsset {
    fn from(built: BuiltTexture) -> Self {
        Self {
            metadata: built.metadata,
            levels: built.levels,
        }
    }
}

impl TextureAsset {
    pub fn write_to<W: Write + Seek>(&self, writer: &mut ContentWriter<W>) -> Result<(), BuildError> {
        let header = AssetHeader {
            version: FORMAT_VERSION,
            width: int32(self.metadata.width, "width")?,
            height: int32(self.metadata.height, "height")?,
            format_code: self.metadata.format.code(),
            generate_mipmaps: self.metadata.generate_mipmaps as u8,
            mip_count: int32(self.metadata.mip_count, "mip count")?,
            level_count: int32(self.levels.len() as u32, "level count")?,
        };
        header.write(writer.get_mut())?;

        for level in &self.levels {
            level.serialize(writer)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_from<R: Read + Seek>(reader: &mut ContentReader<R>) -> Result<Self, BuildError> {
        let header = AssetHeader::read(reader.get_mut())?;
        if header.version != FORMAT_VERSION {
            return Err(BuildError::Malformed(format!(
                "unsupported container version {}",
                header.version
            )));
        }

        let format = PixelFormatKind::from_code(header.format_code)
            .ok_or(BuildError::UnknownFormat(header.format_code))?;
        let generate_mipmaps = match header.generate_mipmaps {
            0 => false,
            1 => true,
            other => {
                return Err(BuildError::Malformed(format!(
                    "invalid generate flag {other}"
                )))
            }
        };

        let metadata = TextureMetadata {
            width: uint32(header.width, "width")?,
            height: uint32(header.height, "height")?,
            format,
            generate_mipmaps,
            mip_count: uint32(header.mip_count, "mip count")?,
        };
        let level_count = uint32(header.level_count, "level count")?;

        let levels = (0..level_count)
            .map(|_| MipLevelRecord::read(reader))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { metadata, levels })
    }

    /// Write the asset to `path`, replacing any existing file
    pub fn save(&self, path: &Path, jpeg_quality: u8) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        let mut writer = ContentWriter::new(BufWriter::new(file)).with_jpeg_quality(jpeg_quality);
        self.write_to(&mut writer)
            .with_context(|| format!("Failed to write texture asset {:?}", path))?;
        debug!("Saved {} level(s) to {:?}", self.levels.len(), path);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let mut reader = ContentReader::new(BufReader::new(file));
        Self::read_from(&mut reader)
            .with_context(|| format!("Failed to read texture asset {:?}", path))
    }
}

fn int32(value: u32, what: &str) -> Result<i32, BuildError> {
    i32::try_from(value).map_err(|_| BuildError::Malformed(format!("{what} {value} exceeds int32")))
}

fn uint32(value: i32, what: &str) -> Result<u32, BuildError> {
    u32::try_from(value).map_err(|_| BuildError::Malformed(format!("negative {what} {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build, TextureBuildRequest};
    use crate::capability::DriverVersion;
    use crate::gpu::SoftwareContext;
    use crate::record::MipPayload;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn built(output: PixelFormatKind) -> BuiltTexture {
        let data: Vec<u8> = (0..16 * 16 * 4).map(|i| (i % 251) as u8).collect();
        let request = TextureBuildRequest::new(&data, 16, 16, PixelFormatKind::Bgra8, output)
            .with_generated_mipmaps(3);
        build(&mut SoftwareContext::new(DriverVersion::new(4, 5)), &request).unwrap()
    }

    fn to_bytes(asset: &TextureAsset) -> Vec<u8> {
        let mut writer = ContentWriter::new(Cursor::new(Vec::new()));
        asset.write_to(&mut writer).unwrap();
        writer.into_inner().into_inner()
    }

    #[test]
    fn test_header_layout() {
        let asset = TextureAsset {
            metadata: TextureMetadata {
                width: 4,
                height: 4,
                format: PixelFormatKind::Dxt1,
                generate_mipmaps: false,
                mip_count: 1,
            },
            levels: vec![MipLevelRecord::compressed(4, 4, PixelFormatKind::Dxt1, vec![0; 8])],
        };
        let bytes = to_bytes(&asset);

        assert_eq!(&bytes[0..4], b"MFTX");
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[16..20], &0x83F1i32.to_le_bytes());
        assert_eq!(bytes[20], 0);
        assert_eq!(&bytes[25..29], &1i32.to_le_bytes());
        // header + one level header + 8 bytes of blocks
        assert_eq!(bytes.len(), 29 + 16 + 8);
    }

    #[test]
    fn test_compressed_asset_round_trip() {
        let asset = TextureAsset::from(built(PixelFormatKind::Dxt3));
        let back =
            TextureAsset::read_from(&mut ContentReader::new(Cursor::new(to_bytes(&asset)))).unwrap();
        assert_eq!(back, asset);
        assert_eq!(back.levels.len(), 5);
        assert_eq!(back.metadata.mip_count, 3);
    }

    #[test]
    fn test_png_asset_round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("texture.mftx");

        let asset = TextureAsset::from(built(PixelFormatKind::Png));
        asset.save(&path, 90).unwrap();
        let back = TextureAsset::load(&path).unwrap();

        assert_eq!(back.metadata, asset.metadata);
        for (a, b) in asset.levels.iter().zip(&back.levels) {
            assert!(matches!(b.payload(), MipPayload::Bitmap(_)));
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_rejects_bad_magic_and_version() {
        let asset = TextureAsset::from(built(PixelFormatKind::Dxt1));
        let mut bytes = to_bytes(&asset);

        let mut wrong_magic = bytes.clone();
        wrong_magic[0] = b'X';
        let err =
            TextureAsset::read_from(&mut ContentReader::new(Cursor::new(wrong_magic))).unwrap_err();
        assert!(matches!(err, BuildError::Binary(_)));

        bytes[4] = 9;
        let err = TextureAsset::read_from(&mut ContentReader::new(Cursor::new(bytes))).unwrap_err();
        assert!(matches!(err, BuildError::Malformed(_)));
    }

    #[test]
    fn test_load_missing_file_has_context() {
        let dir = tempdir().unwrap();
        let err = TextureAsset::load(&dir.path().join("missing.mftx")).unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }
}
