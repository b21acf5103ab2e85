//! CPU-side format conversion for texture transfers
//!
//! Uploads and readbacks may name different source and destination formats.
//! Both contexts route those conversions through here: channel swizzles for
//! uncompressed data and `image_dds` for BC1/BC2/BC3 blocks.

use image_dds::{Mipmaps, Quality, Surface, SurfaceRgba8};

use crate::error::GpuError;
use crate::format::TransferFormat;

/// Convert one image from `from` to `to`
pub fn convert(
    data: &[u8],
    width: u32,
    height: u32,
    from: TransferFormat,
    to: TransferFormat,
) -> Result<Vec<u8>, GpuError> {
    let expected = from.level_byte_size(width, height);
    if data.len() != expected {
        return Err(GpuError::DataSize {
            expected,
            actual: data.len(),
        });
    }

    if from == to {
        return Ok(data.to_vec());
    }

    let rgba = match from {
        TransferFormat::Rgba8 => data.to_vec(),
        TransferFormat::Bgra8 => swap_red_blue(data),
        TransferFormat::Bc1 | TransferFormat::Bc2 | TransferFormat::Bc3 => {
            decode_blocks(data, width, height, from)?
        }
    };

    match to {
        TransferFormat::Rgba8 => Ok(rgba),
        TransferFormat::Bgra8 => Ok(swap_red_blue(&rgba)),
        TransferFormat::Bc1 | TransferFormat::Bc2 | TransferFormat::Bc3 => {
            encode_blocks(&rgba, width, height, to)
        }
    }
}

/// RGBA <-> BGRA
pub fn swap_red_blue(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    for px in out.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    out
}

/// Decode BCn blocks into tightly packed RGBA
fn decode_blocks(
    blocks: &[u8],
    width: u32,
    height: u32,
    format: TransferFormat,
) -> Result<Vec<u8>, GpuError> {
    let (padded_w, padded_h) = padded_extent(width, height);
    let surface = Surface {
        width: padded_w,
        height: padded_h,
        depth: 1,
        layers: 1,
        mipmaps: 1,
        image_format: format.to_image_format(),
        data: blocks,
    };

    let decoded = surface
        .decode_rgba8()
        .map_err(|e| GpuError::Codec(format!("decode {:?}: {}", format, e)))?;

    Ok(crop(&decoded.data, padded_w, width, height))
}

/// Encode tightly packed RGBA into BCn blocks
fn encode_blocks(
    rgba: &[u8],
    width: u32,
    height: u32,
    format: TransferFormat,
) -> Result<Vec<u8>, GpuError> {
    let (padded_w, padded_h) = padded_extent(width, height);
    let padded = pad_edges(rgba, width, height, padded_w, padded_h);

    let surface = SurfaceRgba8 {
        width: padded_w,
        height: padded_h,
        depth: 1,
        layers: 1,
        mipmaps: 1,
        data: padded.as_slice(),
    };

    let encoded = surface
        .encode(format.to_image_format(), Quality::Normal, Mipmaps::Disabled)
        .map_err(|e| GpuError::Codec(format!("encode {:?}: {}", format, e)))?;

    Ok(encoded.data)
}

/// Dimensions rounded up to whole 4x4 blocks
fn padded_extent(width: u32, height: u32) -> (u32, u32) {
    (width.div_ceil(4) * 4, height.div_ceil(4) * 4)
}

/// Extend an image to the padded size by repeating its last row and column
fn pad_edges(rgba: &[u8], width: u32, height: u32, padded_w: u32, padded_h: u32) -> Vec<u8> {
    if width == padded_w && height == padded_h {
        return rgba.to_vec();
    }

    let row_bytes = width as usize * 4;
    let mut out = Vec::with_capacity(TransferFormat::Rgba8.level_byte_size(padded_w, padded_h));
    for y in 0..padded_h {
        let row = y.min(height - 1) as usize * row_bytes;
        for x in 0..padded_w {
            let i = row + x.min(width - 1) as usize * 4;
            out.extend_from_slice(&rgba[i..i + 4]);
        }
    }
    out
}

fn crop(rgba: &[u8], stride_px: u32, width: u32, height: u32) -> Vec<u8> {
    if stride_px == width && rgba.len() == TransferFormat::Rgba8.level_byte_size(width, height) {
        return rgba.to_vec();
    }

    let row_bytes = width as usize * 4;
    let stride = stride_px as usize * 4;
    let mut out = Vec::with_capacity(row_bytes * height as usize);
    for y in 0..height as usize {
        out.extend_from_slice(&rgba[y * stride..y * stride + row_bytes]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, px: [u8; 4]) -> Vec<u8> {
        px.iter().copied().cycle().take((width * height * 4) as usize).collect()
    }

    #[test]
    fn test_swizzle() {
        let bgra = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let rgba = convert(&bgra, 2, 1, TransferFormat::Bgra8, TransferFormat::Rgba8).unwrap();
        assert_eq!(rgba, vec![3, 2, 1, 4, 7, 6, 5, 8]);
        let back = convert(&rgba, 2, 1, TransferFormat::Rgba8, TransferFormat::Bgra8).unwrap();
        assert_eq!(back, bgra);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let err = convert(&[0u8; 7], 1, 2, TransferFormat::Bgra8, TransferFormat::Rgba8);
        assert!(matches!(
            err,
            Err(GpuError::DataSize {
                expected: 8,
                actual: 7
            })
        ));
    }

    #[test]
    fn test_same_format_is_a_copy() {
        let blocks = vec![0xAB; 16];
        let out = convert(&blocks, 4, 4, TransferFormat::Bc3, TransferFormat::Bc3).unwrap();
        assert_eq!(out, blocks);
    }

    #[test]
    fn test_solid_colour_survives_bc1() {
        let bgra = solid(8, 8, [0, 0, 255, 255]);
        let blocks = convert(&bgra, 8, 8, TransferFormat::Bgra8, TransferFormat::Bc1).unwrap();
        assert_eq!(blocks.len(), 32);

        let decoded = convert(&blocks, 8, 8, TransferFormat::Bc1, TransferFormat::Bgra8).unwrap();
        assert_eq!(decoded.len(), bgra.len());
        for px in decoded.chunks_exact(4) {
            assert!(px[2] >= 250, "red channel lost: {:?}", px);
            assert!(px[0] <= 5 && px[1] <= 5);
        }
    }

    #[test]
    fn test_partial_blocks_are_padded() {
        let rgba = solid(2, 3, [10, 200, 30, 255]);
        let blocks = convert(&rgba, 2, 3, TransferFormat::Rgba8, TransferFormat::Bc3).unwrap();
        assert_eq!(blocks.len(), 16);

        let decoded = convert(&blocks, 2, 3, TransferFormat::Bc3, TransferFormat::Rgba8).unwrap();
        assert_eq!(decoded.len(), 2 * 3 * 4);
    }

    #[test]
    fn test_pad_edges_repeats_border() {
        let rgba = [1u8, 1, 1, 1, 2, 2, 2, 2];
        let padded = pad_edges(&rgba, 2, 1, 4, 2);
        assert_eq!(padded.len(), 32);
        assert_eq!(&padded[12..16], &[2, 2, 2, 2]);
        assert_eq!(&padded[16..20], &[1, 1, 1, 1]);
    }
}
