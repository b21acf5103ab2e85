//! Texture content builder
//!
//! Uploads pixel data to a GPU context, optionally generates mipmaps, and reads
//! every level back as [`MipLevelRecord`]s. The GPU texture only lives for the
//! duration of [`build`].

use image::RgbaImage;
use tracing::{debug, info};

use crate::capability::{DriverVersion, MipmapCapability};
use crate::error::BuildError;
use crate::format::{PixelFormatKind, TransferFormat};
use crate::gpu::{
    convert, FilterMode, GpuContext, MipmapHint, TextureGuard, TextureHandle, TextureParameter,
    WrapMode,
};
use crate::record::MipLevelRecord;

/// Inputs to a texture build
#[derive(Debug, Clone, Copy)]
pub struct TextureBuildRequest<'a> {
    pub generate_mipmaps: bool,
    pub requested_mip_count: u32,
    /// BGRA pixels for uncompressed input, raw blocks for compressed input
    pub pixel_data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub input_format: PixelFormatKind,
    pub output_format: PixelFormatKind,
}

impl<'a> TextureBuildRequest<'a> {
    /// Single-level request that converts `input_format` data into `output_format`
    pub fn new(
        pixel_data: &'a [u8],
        width: u32,
        height: u32,
        input_format: PixelFormatKind,
        output_format: PixelFormatKind,
    ) -> Self {
        Self {
            generate_mipmaps: false,
            requested_mip_count: 1,
            pixel_data,
            width,
            height,
            input_format,
            output_format,
        }
    }

    /// Read back `count` levels without generating them
    pub fn with_mip_count(mut self, count: u32) -> Self {
        self.requested_mip_count = count;
        self
    }

    /// Generate the chain on the GPU, up to `max_level`
    pub fn with_generated_mipmaps(mut self, max_level: u32) -> Self {
        self.generate_mipmaps = true;
        self.requested_mip_count = max_level;
        self
    }

    fn validate(&self) -> Result<(), BuildError> {
        if self.width == 0 || self.height == 0 {
            return Err(BuildError::InvalidRequest(format!(
                "texture dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.requested_mip_count == 0 {
            return Err(BuildError::InvalidRequest(
                "requested mip count must be at least 1".into(),
            ));
        }
        if self.input_format.is_container() {
            return Err(BuildError::InvalidRequest(format!(
                "{} is an image container, not a pixel transfer format",
                self.input_format
            )));
        }
        Ok(())
    }
}

/// Top-level description of a built texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureMetadata {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormatKind,
    pub generate_mipmaps: bool,
    pub mip_count: u32,
}

/// Result of a build: metadata plus levels, base first
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltTexture {
    pub metadata: TextureMetadata,
    pub levels: Vec<MipLevelRecord>,
}

/// What happens to the mip chain during a build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MipPlan {
    /// Read back the requested levels as uploaded
    None,
    /// Auto-generate flag set before upload
    Legacy,
    /// Explicit generate call after upload
    Explicit,
}

impl MipPlan {
    fn choose(request: &TextureBuildRequest<'_>, driver: DriverVersion) -> Result<Self, BuildError> {
        if !(request.generate_mipmaps && request.requested_mip_count > 1) {
            return Ok(MipPlan::None);
        }
        match MipmapCapability::classify(driver) {
            MipmapCapability::LegacyAutoMipmap => Ok(MipPlan::Legacy),
            MipmapCapability::ExplicitGeneration => Ok(MipPlan::Explicit),
            MipmapCapability::Unsupported => Err(BuildError::UnsupportedOperation(
                "cannot generate mipmaps on this hardware",
            )),
        }
    }

    fn generates(self) -> bool {
        self != MipPlan::None
    }
}

/// Build a texture on `ctx` and capture its mip chain
///
/// The context is borrowed exclusively for the whole call. The transient GPU
/// texture is deleted before this returns, whether it succeeds or not.
pub fn build<C: GpuContext + ?Sized>(
    ctx: &mut C,
    request: &TextureBuildRequest<'_>,
) -> Result<BuiltTexture, BuildError> {
    request.validate()?;

    let compressed_output = request.output_format.is_block_compressed();
    let driver = ctx.driver_version();

    debug!(
        "Building {}x{} texture: {} -> {}, mips={} (generate={}), driver {}",
        request.width,
        request.height,
        request.input_format,
        request.output_format,
        request.requested_mip_count,
        request.generate_mipmaps,
        driver
    );

    let plan = MipPlan::choose(request, driver);

    let mut texture = TextureGuard::create(ctx)?;
    let handle = texture.handle();

    let plan = {
        let mut gpu = texture.scope()?;
        gpu.bind_texture(handle)?;
        apply_default_parameters(&mut *gpu, handle)?;

        let plan = plan?;
        if plan == MipPlan::Legacy {
            gpu.set_parameter(handle, TextureParameter::GenerateMipmap(true))?;
        }

        gpu.tex_image_2d(
            handle,
            0,
            request.output_format.upload_internal_format(),
            request.width,
            request.height,
            request.input_format.upload_source_format(),
            request.pixel_data,
        )?;

        if plan == MipPlan::Explicit {
            gpu.set_parameter(handle, TextureParameter::MaxLevel(request.requested_mip_count))?;
            gpu.set_mipmap_hint(MipmapHint::Nicest);
            gpu.generate_mipmap(handle)?;
        }
        plan
    };

    // Generated chains are walked until a dimension reaches zero
    let max_levels = if plan.generates() {
        u32::MAX
    } else {
        request.requested_mip_count
    };

    let mut levels = Vec::new();
    let (mut width, mut height) = (request.width, request.height);
    for level in 0..max_levels {
        let record = {
            let mut gpu = texture.scope()?;
            gpu.bind_texture(handle)?;
            if compressed_output {
                read_compressed_level(&mut *gpu, handle, level, width, height, request.output_format)?
            } else {
                read_bitmap_level(&mut *gpu, handle, level, width, height, request.output_format)?
            }
        };
        levels.push(record);

        width /= 2;
        height /= 2;
        if width == 0 || height == 0 {
            break;
        }
    }

    let mip_count = if request.generate_mipmaps {
        request.requested_mip_count
    } else {
        levels.len() as u32
    };

    drop(texture);

    info!(
        "Built {}x{} {} texture with {} level(s)",
        request.width,
        request.height,
        request.output_format,
        levels.len()
    );

    Ok(BuiltTexture {
        metadata: TextureMetadata {
            width: request.width,
            height: request.height,
            format: request.output_format,
            generate_mipmaps: request.generate_mipmaps,
            mip_count,
        },
        levels,
    })
}

fn apply_default_parameters<C: GpuContext + ?Sized>(
    gpu: &mut C,
    handle: TextureHandle,
) -> Result<(), BuildError> {
    gpu.set_parameter(handle, TextureParameter::MinFilter(FilterMode::Linear))?;
    gpu.set_parameter(handle, TextureParameter::MagFilter(FilterMode::Linear))?;
    gpu.set_parameter(handle, TextureParameter::WrapS(WrapMode::Repeat))?;
    gpu.set_parameter(handle, TextureParameter::WrapT(WrapMode::Repeat))?;
    Ok(())
}

fn read_compressed_level<C: GpuContext + ?Sized>(
    gpu: &mut C,
    handle: TextureHandle,
    level: u32,
    width: u32,
    height: u32,
    format: PixelFormatKind,
) -> Result<MipLevelRecord, BuildError> {
    let size = gpu.compressed_level_size(handle, level)?;
    let mut data = vec![0u8; size];
    gpu.get_compressed_tex_image(handle, level, &mut data)?;
    Ok(MipLevelRecord::compressed(width, height, format, data))
}

fn read_bitmap_level<C: GpuContext + ?Sized>(
    gpu: &mut C,
    handle: TextureHandle,
    level: u32,
    width: u32,
    height: u32,
    format: PixelFormatKind,
) -> Result<MipLevelRecord, BuildError> {
    let mut bgra = vec![0u8; TransferFormat::Bgra8.level_byte_size(width, height)];
    gpu.get_tex_image(handle, level, TransferFormat::Bgra8, &mut bgra)?;

    let rgba = convert(&bgra, width, height, TransferFormat::Bgra8, TransferFormat::Rgba8)?;
    let image = RgbaImage::from_raw(width, height, rgba).ok_or(
        BuildError::InternalInvariantViolation("readback size does not match level size"),
    )?;
    Ok(MipLevelRecord::bitmap(format, image))
}
