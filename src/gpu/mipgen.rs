//! CPU mip chain generation

use image::imageops::{self, FilterType};
use image::RgbaImage;

use super::MipmapHint;
use crate::error::GpuError;
use crate::format::{level_extent, TransferFormat};

/// Resampling filter used for a generation hint
pub fn filter_for_hint(hint: MipmapHint) -> FilterType {
    match hint {
        MipmapHint::Fastest => FilterType::Nearest,
        MipmapHint::DontCare => FilterType::Triangle,
        MipmapHint::Nicest => FilterType::Lanczos3,
    }
}

/// Build `levels` mip images from an RGBA base image
///
/// The first entry is the base itself. Each level is resampled from the one
/// above it, with dimensions `max(1, prev / 2)`.
pub fn downsample_chain(
    base: Vec<u8>,
    width: u32,
    height: u32,
    levels: u32,
    filter: FilterType,
) -> Result<Vec<Vec<u8>>, GpuError> {
    let expected = TransferFormat::Rgba8.level_byte_size(width, height);
    let actual = base.len();
    let mut current = RgbaImage::from_raw(width, height, base)
        .ok_or(GpuError::DataSize { expected, actual })?;

    let mut chain = Vec::with_capacity(levels as usize);
    for level in 1..levels {
        let (w, h) = level_extent(width, height, level);
        let next = imageops::resize(&current, w, h, filter);
        chain.push(std::mem::replace(&mut current, next).into_raw());
    }
    chain.push(current.into_raw());

    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_size_mismatch_on_huge_extent() {
        let err = downsample_chain(vec![0u8; 3], 65536, 16384, 1, FilterType::Nearest).unwrap_err();
        assert!(matches!(
            err,
            GpuError::DataSize { expected, actual: 3 } if expected == 1usize << 32
        ));
    }

    #[test]
    fn test_chain_dimensions() {
        let base = vec![128u8; 16 * 4 * 4];
        let chain = downsample_chain(base, 16, 4, 5, FilterType::Triangle).unwrap();
        let sizes: Vec<usize> = chain.iter().map(Vec::len).collect();
        // 16x4, 8x2, 4x1, 2x1, 1x1
        assert_eq!(sizes, vec![256, 64, 16, 8, 4]);
    }

    #[test]
    fn test_single_level_is_base() {
        let base = vec![7u8; 2 * 2 * 4];
        let chain = downsample_chain(base.clone(), 2, 2, 1, FilterType::Nearest).unwrap();
        assert_eq!(chain, vec![base]);
    }

    #[test]
    fn test_uniform_image_stays_uniform() {
        let base: Vec<u8> = [40u8, 80, 120, 255].repeat(8 * 8);
        let chain = downsample_chain(base, 8, 8, 4, filter_for_hint(MipmapHint::Nicest)).unwrap();
        assert_eq!(chain[3].len(), 4);
        for (got, want) in chain[3].iter().zip([40u8, 80, 120, 255]) {
            assert!(got.abs_diff(want) <= 1, "{got} vs {want}");
        }
    }

    #[test]
    fn test_bad_base_size() {
        let result = downsample_chain(vec![0u8; 3], 1, 1, 1, FilterType::Nearest);
        assert!(matches!(result, Err(GpuError::DataSize { expected: 4, actual: 3 })));
    }
}
