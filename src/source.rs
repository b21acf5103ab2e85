//! Loading source images into build inputs

use anyhow::{bail, Context, Result};
use image_dds::ddsfile::Dds;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

use crate::format::{PixelFormatKind, TransferFormat};
use crate::gpu::convert;

/// Pixel data ready to hand to the texture builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub width: u32,
    pub height: u32,
    /// `Bgra8` for decoded images, a DXT kind for pass-through DDS blocks
    pub format: PixelFormatKind,
    pub data: Vec<u8>,
}

/// Load an image file, keeping BC1-3 DDS data compressed
pub fn load_source(path: &Path) -> Result<SourceImage> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;

    let is_dds = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("dds"));
    let source = if is_dds || bytes.starts_with(b"DDS ") {
        load_dds(&bytes)
    } else {
        load_bitmap(&bytes)
    }
    .with_context(|| format!("Failed to load source image {:?}", path))?;

    debug!(
        "Loaded {:?}: {}x{} {}",
        path, source.width, source.height, source.format
    );
    Ok(source)
}

/// Decode any `image`-supported format into BGRA pixels
pub fn load_bitmap(bytes: &[u8]) -> Result<SourceImage> {
    let rgba = image::load_from_memory(bytes)
        .context("Failed to decode image")?
        .into_rgba8();
    from_rgba(rgba.width(), rgba.height(), rgba.as_raw())
}

pub fn load_dds(bytes: &[u8]) -> Result<SourceImage> {
    let dds = Dds::read(Cursor::new(bytes)).context("Failed to parse DDS")?;
    let (width, height) = (dds.header.width, dds.header.height);

    let block = image_dds::dds_image_format(&dds)
        .ok()
        .and_then(TransferFormat::from_image_format);

    match block {
        Some(transfer) => {
            let format = match transfer {
                TransferFormat::Bc1 => PixelFormatKind::Dxt1,
                TransferFormat::Bc2 => PixelFormatKind::Dxt3,
                TransferFormat::Bc3 => PixelFormatKind::Dxt5,
                _ => bail!("DDS surface {:?} is not block-compressed", transfer),
            };
            let size = transfer.level_byte_size(width, height);
            if dds.data.len() < size {
                bail!(
                    "DDS data too short: {} bytes for a {}x{} {} level",
                    dds.data.len(),
                    width,
                    height,
                    format
                );
            }
            Ok(SourceImage {
                width,
                height,
                format,
                data: dds.data[..size].to_vec(),
            })
        }
        None => {
            // Other DDS formats are decoded and rebuilt from pixels
            let rgba = image_dds::image_from_dds(&dds, 0).context("Failed to decode DDS")?;
            from_rgba(rgba.width(), rgba.height(), rgba.as_raw())
        }
    }
}

fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<SourceImage> {
    let data = convert(rgba, width, height, TransferFormat::Rgba8, TransferFormat::Bgra8)?;
    Ok(SourceImage {
        width,
        height,
        format: PixelFormatKind::Bgra8,
        data,
    })
}
