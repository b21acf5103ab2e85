//! Hardware GPU context on wgpu
//!
//! Textures live on the selected adapter. RGBA mip chains are generated with a
//! compute-shader box filter when the adapter has compute shaders. Other chains
//! are rebuilt on the CPU and uploaded level by level, since BC formats cannot
//! be storage targets.

use std::collections::HashMap;
use tracing::{debug, info};
use wgpu::{
    Backend, Backends, BufferDescriptor, BufferUsages, CommandEncoderDescriptor, ComputePipeline,
    Device, DownlevelFlags, Extent3d, Instance, Queue, Texture, TextureDescriptor,
    TextureDimension, TextureUsages, TextureViewDescriptor,
};

use super::mipgen::{downsample_chain, filter_for_hint};
use super::transfer::convert;
use super::{GpuContext, MipmapHint, SamplerState, TextureHandle, TextureParameter};
use crate::capability::DriverVersion;
use crate::error::GpuError;
use crate::format::{full_chain_len, level_extent, TransferFormat};

const DOWNSAMPLE_WGSL: &str = include_str!("shaders/downsample.wgsl");

/// GPU information for display/selection
#[derive(Debug, Clone)]
pub struct GpuInfo {
    pub name: String,
    pub backend: String,
    pub device_type: String,
    pub driver: String,
    pub adapter_index: usize,
}

impl std::fmt::Display for GpuInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.backend, self.device_type)
    }
}

/// Allocated image of a texture
struct HwImage {
    texture: Texture,
    format: TransferFormat,
    width: u32,
    height: u32,
    levels: u32,
}

#[derive(Default)]
struct HwTexture {
    state: SamplerState,
    image: Option<HwImage>,
}

/// GPU context backed by a wgpu device
pub struct WgpuContext {
    device: Device,
    queue: Queue,
    driver: DriverVersion,
    bc_supported: bool,
    /// Box-filter pipeline; `None` on adapters without compute shaders
    downsample: Option<ComputePipeline>,
    next_handle: u32,
    textures: HashMap<TextureHandle, HwTexture>,
    hint: MipmapHint,
    pub gpu_info: GpuInfo,
}

impl WgpuContext {
    /// Initialize with automatic GPU selection
    pub fn new() -> Result<Self, GpuError> {
        Self::with_gpu_index(None, None)
    }

    /// Initialize with a specific GPU index and optional driver version override
    pub fn with_gpu_index(
        gpu_index: Option<usize>,
        driver_override: Option<DriverVersion>,
    ) -> Result<Self, GpuError> {
        pollster::block_on(Self::new_async(gpu_index, driver_override))
    }

    async fn new_async(
        gpu_index: Option<usize>,
        driver_override: Option<DriverVersion>,
    ) -> Result<Self, GpuError> {
        info!("Initializing GPU context...");

        let instance = Instance::new(&wgpu::InstanceDescriptor {
            backends: Backends::all(),
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(Backends::all()).await;

        if adapters.is_empty() {
            return Err(GpuError::Device("No GPU found on this system".into()));
        }

        for (i, adapter) in adapters.iter().enumerate() {
            let info = adapter.get_info();
            info!(
                "GPU {}: {} ({:?}, {:?})",
                i, info.name, info.backend, info.device_type
            );
        }

        let adapter_index = match gpu_index {
            Some(idx) if idx >= adapters.len() => {
                return Err(GpuError::Device(format!(
                    "GPU index {} out of range (found {} GPUs)",
                    idx,
                    adapters.len()
                )));
            }
            Some(idx) => idx,
            // Auto-select: prefer discrete GPU, then Vulkan backend
            None => adapters
                .iter()
                .enumerate()
                .max_by_key(|(_, a)| {
                    let info = a.get_info();
                    let mut score = 0i32;
                    if info.device_type == wgpu::DeviceType::DiscreteGpu {
                        score += 100;
                    }
                    if info.backend == Backend::Vulkan {
                        score += 10;
                    }
                    score
                })
                .map(|(i, _)| i)
                .unwrap_or(0),
        };
        let adapter = &adapters[adapter_index];

        let adapter_info = adapter.get_info();
        let gpu_info = GpuInfo {
            name: adapter_info.name.clone(),
            backend: format!("{:?}", adapter_info.backend),
            device_type: format!("{:?}", adapter_info.device_type),
            driver: adapter_info.driver_info.clone(),
            adapter_index,
        };

        let driver = driver_override.unwrap_or_else(|| {
            driver_version_from(adapter_info.backend, &adapter_info.driver_info)
        });

        info!(
            "Selected GPU: {} ({}, {}), driver version {}",
            gpu_info.name, gpu_info.backend, gpu_info.device_type, driver
        );

        let bc_supported = adapter
            .features()
            .contains(wgpu::Features::TEXTURE_COMPRESSION_BC);
        let required_features = if bc_supported {
            wgpu::Features::TEXTURE_COMPRESSION_BC
        } else {
            debug!("Adapter has no BC texture compression; DXT outputs will fail");
            wgpu::Features::empty()
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("mipforge GPU context"),
                required_features,
                required_limits: adapter.limits(),
                ..Default::default()
            })
            .await
            .map_err(|e| GpuError::Device(format!("Failed to create GPU device: {}", e)))?;

        let downsample = if supports_compute(adapter.get_downlevel_capabilities().flags) {
            Some(create_downsample_pipeline(&device))
        } else {
            info!("Adapter has no compute shaders; RGBA mip chains will be generated on the CPU");
            None
        };

        info!("GPU context initialized successfully");

        Ok(Self {
            device,
            queue,
            driver,
            bc_supported,
            downsample,
            next_handle: 1,
            textures: HashMap::new(),
            hint: MipmapHint::default(),
            gpu_info,
        })
    }

    fn texture(&self, texture: TextureHandle) -> Result<&HwTexture, GpuError> {
        self.textures
            .get(&texture)
            .ok_or(GpuError::UnknownTexture(texture))
    }

    fn image(&self, texture: TextureHandle) -> Result<&HwImage, GpuError> {
        self.texture(texture)?
            .image
            .as_ref()
            .ok_or(GpuError::NoImage(texture))
    }

    fn allocate(&self, format: TransferFormat, width: u32, height: u32) -> Result<HwImage, GpuError> {
        check_extent(width, height, self.device.limits().max_texture_dimension_2d)?;

        if format.is_block_compressed() {
            if !self.bc_supported {
                return Err(GpuError::Device(
                    "adapter does not support BC texture compression".into(),
                ));
            }
            if width % 4 != 0 || height % 4 != 0 {
                return Err(GpuError::Device(format!(
                    "block-compressed textures need dimensions divisible by 4, got {}x{}",
                    width, height
                )));
            }
        }

        let levels = full_chain_len(width, height);
        let mut usage =
            TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST | TextureUsages::COPY_SRC;
        if format == TransferFormat::Rgba8 && self.downsample.is_some() {
            usage |= TextureUsages::STORAGE_BINDING;
        }

        let texture = self.device.create_texture(&TextureDescriptor {
            label: Some("content texture"),
            size: Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: levels,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: format.to_wgpu(),
            usage,
            view_formats: &[],
        });

        Ok(HwImage {
            texture,
            format,
            width,
            height,
            levels,
        })
    }

    fn write_level(&self, image: &HwImage, level: u32, data: &[u8]) {
        let (w, h) = level_extent(image.width, image.height, level);
        let layout = CopyLayout::new(image.format, w, h);

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &image.texture,
                mip_level: level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(layout.row_bytes),
                rows_per_image: Some(layout.rows),
            },
            layout.extent(),
        );
    }

    /// Copy one level into host memory in the texture's own format
    fn read_level(&self, image: &HwImage, level: u32) -> Result<Vec<u8>, GpuError> {
        if level >= image.levels {
            return Err(GpuError::InvalidLevel {
                level,
                levels: image.levels,
            });
        }

        let (w, h) = level_extent(image.width, image.height, level);
        let layout = CopyLayout::new(image.format, w, h);
        let padded_row = layout.padded_row_bytes();

        let staging_buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some("readback staging buffer"),
            size: padded_row as u64 * layout.rows as u64,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("readback encoder"),
            });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &image.texture,
                mip_level: level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(layout.rows),
                },
            },
            layout.extent(),
        );

        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        // Poll until the buffer is mapped
        let _ = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });
        rx.recv()
            .map_err(|_| GpuError::Device("readback channel closed".into()))?
            .map_err(|e| GpuError::Device(format!("Failed to map buffer: {}", e)))?;

        let data = buffer_slice.get_mapped_range();
        let mut result = Vec::with_capacity(layout.row_bytes as usize * layout.rows as usize);
        for row in data.chunks(padded_row as usize).take(layout.rows as usize) {
            result.extend_from_slice(&row[..layout.row_bytes as usize]);
        }

        drop(data);
        staging_buffer.unmap();

        Ok(result)
    }

    fn generate_on_gpu(&self, pipeline: &ComputePipeline, image: &HwImage) {
        let bind_group_layout = pipeline.get_bind_group_layout(0);
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("mip generation encoder"),
            });

        for level in 1..image.levels {
            let src_view = image.texture.create_view(&TextureViewDescriptor {
                label: Some("mip source view"),
                base_mip_level: level - 1,
                mip_level_count: Some(1),
                ..Default::default()
            });
            let dst_view = image.texture.create_view(&TextureViewDescriptor {
                label: Some("mip target view"),
                base_mip_level: level,
                mip_level_count: Some(1),
                ..Default::default()
            });

            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("mip downsample bind group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&src_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&dst_view),
                    },
                ],
            });

            let (w, h) = level_extent(image.width, image.height, level);
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("mip downsample pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(w.div_ceil(8), h.div_ceil(8), 1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        let _ = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });
    }

    fn generate_on_cpu(&self, image: &HwImage) -> Result<(), GpuError> {
        let base = self.read_level(image, 0)?;
        let rgba = convert(&base, image.width, image.height, image.format, TransferFormat::Rgba8)?;
        let chain = downsample_chain(
            rgba,
            image.width,
            image.height,
            image.levels,
            filter_for_hint(self.hint),
        )?;

        for (level, pixels) in chain.into_iter().enumerate().skip(1) {
            let level = level as u32;
            let (w, h) = level_extent(image.width, image.height, level);
            let data = convert(&pixels, w, h, TransferFormat::Rgba8, image.format)?;
            self.write_level(image, level, &data);
        }
        Ok(())
    }

    fn regenerate(&self, texture: TextureHandle) -> Result<(), GpuError> {
        let image = self.image(texture)?;
        debug!(
            "Generating {} mip levels for {}x{} ({:?}, hint {:?})",
            image.levels - 1,
            image.width,
            image.height,
            image.format,
            self.hint
        );

        match &self.downsample {
            Some(pipeline) if image.format == TransferFormat::Rgba8 => {
                self.generate_on_gpu(pipeline, image);
                Ok(())
            }
            _ => self.generate_on_cpu(image),
        }
    }
}

impl GpuContext for WgpuContext {
    fn driver_version(&self) -> DriverVersion {
        self.driver
    }

    fn create_texture(&mut self) -> Result<TextureHandle, GpuError> {
        let handle = TextureHandle(self.next_handle);
        self.next_handle += 1;
        self.textures.insert(handle, HwTexture::default());
        Ok(handle)
    }

    fn bind_texture(&mut self, texture: TextureHandle) -> Result<(), GpuError> {
        self.texture(texture)?;
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureHandle) -> Result<(), GpuError> {
        let removed = self
            .textures
            .remove(&texture)
            .ok_or(GpuError::UnknownTexture(texture))?;
        if let Some(image) = removed.image {
            image.texture.destroy();
        }
        Ok(())
    }

    fn set_parameter(
        &mut self,
        texture: TextureHandle,
        param: TextureParameter,
    ) -> Result<(), GpuError> {
        self.textures
            .get_mut(&texture)
            .ok_or(GpuError::UnknownTexture(texture))?
            .state
            .apply(param);
        Ok(())
    }

    fn set_mipmap_hint(&mut self, hint: MipmapHint) {
        self.hint = hint;
    }

    fn tex_image_2d(
        &mut self,
        texture: TextureHandle,
        level: u32,
        internal: TransferFormat,
        width: u32,
        height: u32,
        source: TransferFormat,
        data: &[u8],
    ) -> Result<(), GpuError> {
        let stored = convert(data, width, height, source, internal)?;

        if level == 0 {
            let state = self.texture(texture)?.state;
            let image = self.allocate(internal, width, height)?;
            self.write_level(&image, 0, &stored);

            let slot = self
                .textures
                .get_mut(&texture)
                .ok_or(GpuError::UnknownTexture(texture))?;
            if let Some(old) = slot.image.replace(image) {
                old.texture.destroy();
            }

            if state.auto_generate {
                self.regenerate(texture)?;
            }
        } else {
            let image = self.image(texture)?;
            if level >= image.levels {
                return Err(GpuError::InvalidLevel {
                    level,
                    levels: image.levels,
                });
            }
            if level_extent(image.width, image.height, level) != (width, height)
                || image.format != internal
            {
                return Err(GpuError::UnsupportedTransfer {
                    from: internal,
                    to: image.format,
                });
            }
            self.write_level(image, level, &stored);
        }

        Ok(())
    }

    fn compressed_level_size(
        &mut self,
        texture: TextureHandle,
        level: u32,
    ) -> Result<usize, GpuError> {
        let image = self.image(texture)?;
        if !image.format.is_block_compressed() {
            return Err(GpuError::NotCompressed(texture));
        }
        if level >= image.levels {
            return Err(GpuError::InvalidLevel {
                level,
                levels: image.levels,
            });
        }
        let (w, h) = level_extent(image.width, image.height, level);
        Ok(image.format.level_byte_size(w, h))
    }

    fn get_compressed_tex_image(
        &mut self,
        texture: TextureHandle,
        level: u32,
        out: &mut [u8],
    ) -> Result<(), GpuError> {
        let image = self.image(texture)?;
        if !image.format.is_block_compressed() {
            return Err(GpuError::NotCompressed(texture));
        }
        let blocks = self.read_level(image, level)?;
        if out.len() != blocks.len() {
            return Err(GpuError::DataSize {
                expected: blocks.len(),
                actual: out.len(),
            });
        }
        out.copy_from_slice(&blocks);
        Ok(())
    }

    fn get_tex_image(
        &mut self,
        texture: TextureHandle,
        level: u32,
        format: TransferFormat,
        out: &mut [u8],
    ) -> Result<(), GpuError> {
        if format.is_block_compressed() {
            return Err(GpuError::UnsupportedTransfer {
                from: format,
                to: TransferFormat::Rgba8,
            });
        }

        let image = self.image(texture)?;
        let raw = self.read_level(image, level)?;
        let (w, h) = level_extent(image.width, image.height, level);
        let pixels = convert(&raw, w, h, image.format, format)?;
        if out.len() != pixels.len() {
            return Err(GpuError::DataSize {
                expected: pixels.len(),
                actual: out.len(),
            });
        }
        out.copy_from_slice(&pixels);
        Ok(())
    }

    fn generate_mipmap(&mut self, texture: TextureHandle) -> Result<(), GpuError> {
        self.regenerate(texture)
    }
}

/// Buffer layout of one level copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CopyLayout {
    /// Copy extent, rounded up to whole blocks for compressed formats
    width: u32,
    height: u32,
    /// Tightly packed bytes per row of pixels or blocks
    row_bytes: u32,
    /// Rows of pixels or blocks
    rows: u32,
}

impl CopyLayout {
    fn new(format: TransferFormat, width: u32, height: u32) -> Self {
        if format.is_block_compressed() {
            let (bw, bh) = (width.div_ceil(4), height.div_ceil(4));
            Self {
                width: bw * 4,
                height: bh * 4,
                row_bytes: bw * format.unit_bytes(),
                rows: bh,
            }
        } else {
            Self {
                width,
                height,
                row_bytes: width * format.unit_bytes(),
                rows: height,
            }
        }
    }

    fn padded_row_bytes(&self) -> u32 {
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        self.row_bytes.div_ceil(align) * align
    }

    fn extent(&self) -> Extent3d {
        Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

fn create_downsample_pipeline(device: &Device) -> ComputePipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("mip downsample shader"),
        source: wgpu::ShaderSource::Wgsl(DOWNSAMPLE_WGSL.into()),
    });

    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("mip downsample pipeline"),
        layout: None,
        module: &module,
        entry_point: Some("downsample"),
        compilation_options: Default::default(),
        cache: None,
    })
}

/// GL below ES 3.1 and WebGL2 have no compute stage
fn supports_compute(flags: DownlevelFlags) -> bool {
    flags.contains(DownlevelFlags::COMPUTE_SHADERS)
}

/// Reject sizes the device cannot create
fn check_extent(width: u32, height: u32, max_dimension: u32) -> Result<(), GpuError> {
    if width > max_dimension || height > max_dimension {
        return Err(GpuError::Device(format!(
            "{}x{} exceeds the device's maximum texture size of {}",
            width, height, max_dimension
        )));
    }
    Ok(())
}

/// Driver version for an adapter
///
/// GL backends report their context version in the driver info string; other
/// backends have no such version and are treated as fully capable.
pub fn driver_version_from(backend: Backend, driver_info: &str) -> DriverVersion {
    match backend {
        Backend::Gl => DriverVersion::parse(driver_info).unwrap_or(DriverVersion::new(3, 0)),
        _ => DriverVersion::MODERN,
    }
}

/// List available GPUs
pub fn list_gpus() -> Vec<GpuInfo> {
    pollster::block_on(list_gpus_async())
}

async fn list_gpus_async() -> Vec<GpuInfo> {
    let instance = Instance::new(&wgpu::InstanceDescriptor {
        backends: Backends::all(),
        ..Default::default()
    });

    let adapters = instance.enumerate_adapters(Backends::all()).await;

    adapters
        .iter()
        .enumerate()
        .map(|(idx, adapter)| {
            let info = adapter.get_info();
            GpuInfo {
                name: info.name.clone(),
                backend: format!("{:?}", info.backend),
                device_type: format!("{:?}", info.device_type),
                driver: info.driver_info.clone(),
                adapter_index: idx,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_layout_uncompressed() {
        let layout = CopyLayout::new(TransferFormat::Rgba8, 3, 5);
        assert_eq!(layout.row_bytes, 12);
        assert_eq!(layout.rows, 5);
        assert_eq!(layout.padded_row_bytes(), 256);
        assert_eq!((layout.width, layout.height), (3, 5));
    }

    #[test]
    fn test_copy_layout_compressed_rounds_to_blocks() {
        let layout = CopyLayout::new(TransferFormat::Bc1, 2, 1);
        assert_eq!((layout.width, layout.height), (4, 4));
        assert_eq!(layout.row_bytes, 8);
        assert_eq!(layout.rows, 1);

        let layout = CopyLayout::new(TransferFormat::Bc3, 256, 64);
        assert_eq!(layout.row_bytes, 64 * 16);
        assert_eq!(layout.rows, 16);
        assert_eq!(layout.padded_row_bytes(), 1024);
    }

    #[test]
    fn test_driver_version_from_backend() {
        assert_eq!(
            driver_version_from(Backend::Gl, "2.1 Mesa 23.1"),
            DriverVersion::new(2, 1)
        );
        assert_eq!(
            driver_version_from(Backend::Gl, "unknown"),
            DriverVersion::new(3, 0)
        );
        assert_eq!(
            driver_version_from(Backend::Vulkan, "Mesa 24.0.1"),
            DriverVersion::MODERN
        );
    }

    #[test]
    fn test_extent_within_device_limits() {
        assert!(check_extent(8192, 8192, 8192).is_ok());
        assert!(check_extent(1, 16384, 16384).is_ok());

        let err = check_extent(16384, 512, 8192).unwrap_err();
        assert!(matches!(err, GpuError::Device(ref msg) if msg.contains("16384x512")));
        assert!(check_extent(512, 8193, 8192).is_err());
    }

    #[test]
    fn test_compute_support_from_downlevel_flags() {
        assert!(supports_compute(DownlevelFlags::all()));
        assert!(!supports_compute(DownlevelFlags::empty()));
        assert!(!supports_compute(DownlevelFlags::CUBE_ARRAY_TEXTURES));
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_oversized_texture_is_an_error() {
        let mut ctx = WgpuContext::new().expect("Failed to create GPU context");
        let max = ctx.device.limits().max_texture_dimension_2d;
        let tex = ctx.create_texture().unwrap();
        // One row past the limit; data size check passes, allocation must not
        let width = max + 1;
        let data = vec![0u8; width as usize * 4];
        let err = ctx
            .tex_image_2d(tex, 0, TransferFormat::Rgba8, width, 1, TransferFormat::Bgra8, &data)
            .unwrap_err();
        assert!(matches!(err, GpuError::Device(_)));
        ctx.delete_texture(tex).unwrap();
    }

    #[test]
    fn test_list_gpus() {
        let gpus = list_gpus();
        println!("Found {} GPUs:", gpus.len());
        for gpu in &gpus {
            println!("  - {}", gpu);
        }
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_round_trip_rgba_with_generated_mips() {
        let mut ctx = WgpuContext::new().expect("Failed to create GPU context");
        let tex = ctx.create_texture().unwrap();
        let base = [0u8, 0, 255, 255].repeat(16 * 16);
        ctx.tex_image_2d(tex, 0, TransferFormat::Rgba8, 16, 16, TransferFormat::Bgra8, &base)
            .unwrap();
        ctx.generate_mipmap(tex).unwrap();

        let mut out = vec![0u8; 4];
        ctx.get_tex_image(tex, 4, TransferFormat::Bgra8, &mut out).unwrap();
        assert_eq!(out, vec![0, 0, 255, 255]);
        ctx.delete_texture(tex).unwrap();
    }

    #[test]
    #[ignore] // Requires GPU with BC support
    fn test_compressed_upload_readback() {
        let mut ctx = WgpuContext::new().expect("Failed to create GPU context");
        let tex = ctx.create_texture().unwrap();
        let blocks: Vec<u8> = (0..64).map(|i| i as u8).collect();
        ctx.tex_image_2d(tex, 0, TransferFormat::Bc3, 8, 8, TransferFormat::Bc3, &blocks)
            .unwrap();

        let size = ctx.compressed_level_size(tex, 0).unwrap();
        assert_eq!(size, 64);
        let mut out = vec![0u8; size];
        ctx.get_compressed_tex_image(tex, 0, &mut out).unwrap();
        assert_eq!(out, blocks);
    }
}
