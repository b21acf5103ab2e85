//! CPU reference GPU context
//!
//! Keeps texture levels in host memory and performs every transfer and mip
//! generation on the CPU. It reports whatever driver version it is created
//! with, which makes the capability branches reachable without hardware, and
//! records a journal of the operations it executed.

use std::collections::HashMap;
use tracing::{debug, trace};

use super::mipgen::{downsample_chain, filter_for_hint};
use super::transfer::convert;
use super::{GpuContext, MipmapHint, SamplerState, TextureHandle, TextureParameter};
use crate::capability::DriverVersion;
use crate::error::GpuError;
use crate::format::{full_chain_len, level_extent, TransferFormat};

/// One executed context operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuOp {
    Create(TextureHandle),
    Bind(TextureHandle),
    Delete(TextureHandle),
    Parameter(TextureHandle, TextureParameter),
    Hint(MipmapHint),
    Upload {
        texture: TextureHandle,
        level: u32,
        internal: TransferFormat,
        source: TransferFormat,
    },
    GenerateMipmap(TextureHandle),
    ReadCompressed(TextureHandle, u32),
    Read(TextureHandle, u32),
}

#[derive(Debug, Default)]
struct SoftTexture {
    sampler: SamplerState,
    storage: Option<Storage>,
}

/// Image storage, defined by the first level-0 upload
#[derive(Debug)]
struct Storage {
    format: TransferFormat,
    width: u32,
    height: u32,
    /// One slot per level of the full chain; `None` until defined
    levels: Vec<Option<Vec<u8>>>,
}

impl Storage {
    fn extent(&self, level: u32) -> Result<(u32, u32), GpuError> {
        let count = self.levels.len() as u32;
        if level >= count {
            return Err(GpuError::InvalidLevel {
                level,
                levels: count,
            });
        }
        Ok(level_extent(self.width, self.height, level))
    }

    /// Level bytes in the internal format; undefined levels read as zeros
    fn level_bytes(&self, level: u32) -> Result<Vec<u8>, GpuError> {
        let (w, h) = self.extent(level)?;
        Ok(match &self.levels[level as usize] {
            Some(bytes) => bytes.clone(),
            None => vec![0u8; self.format.level_byte_size(w, h)],
        })
    }
}

/// Host-memory GPU context
pub struct SoftwareContext {
    driver: DriverVersion,
    next_handle: u32,
    textures: HashMap<TextureHandle, SoftTexture>,
    hint: MipmapHint,
    depth: u32,
    journal: Vec<GpuOp>,
}

impl SoftwareContext {
    pub fn new(driver: DriverVersion) -> Self {
        Self {
            driver,
            next_handle: 1,
            textures: HashMap::new(),
            hint: MipmapHint::default(),
            depth: 0,
            journal: Vec::new(),
        }
    }

    /// Operations executed so far, oldest first
    pub fn journal(&self) -> &[GpuOp] {
        &self.journal
    }

    /// Number of textures created and not yet deleted
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Current nesting of entered scopes
    pub fn scope_depth(&self) -> u32 {
        self.depth
    }

    fn texture(&self, texture: TextureHandle) -> Result<&SoftTexture, GpuError> {
        self.textures
            .get(&texture)
            .ok_or(GpuError::UnknownTexture(texture))
    }

    fn texture_mut(&mut self, texture: TextureHandle) -> Result<&mut SoftTexture, GpuError> {
        self.textures
            .get_mut(&texture)
            .ok_or(GpuError::UnknownTexture(texture))
    }

    fn storage(&self, texture: TextureHandle) -> Result<&Storage, GpuError> {
        self.texture(texture)?
            .storage
            .as_ref()
            .ok_or(GpuError::NoImage(texture))
    }

    fn regenerate(&mut self, texture: TextureHandle) -> Result<(), GpuError> {
        let filter = filter_for_hint(self.hint);
        let storage = self
            .texture_mut(texture)?
            .storage
            .as_mut()
            .ok_or(GpuError::NoImage(texture))?;

        let (width, height, format) = (storage.width, storage.height, storage.format);
        let levels = storage.levels.len() as u32;
        let base = storage.level_bytes(0)?;
        let base_rgba = convert(&base, width, height, format, TransferFormat::Rgba8)?;

        debug!(
            "Generating {} mip levels for {}x{} ({:?})",
            levels - 1,
            width,
            height,
            format
        );

        let chain = downsample_chain(base_rgba, width, height, levels, filter)?;
        for (level, rgba) in chain.into_iter().enumerate().skip(1) {
            let (w, h) = level_extent(width, height, level as u32);
            let stored = convert(&rgba, w, h, TransferFormat::Rgba8, format)?;
            storage.levels[level] = Some(stored);
        }

        Ok(())
    }
}

impl GpuContext for SoftwareContext {
    fn driver_version(&self) -> DriverVersion {
        self.driver
    }

    fn enter(&mut self) -> Result<(), GpuError> {
        self.depth += 1;
        Ok(())
    }

    fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn create_texture(&mut self) -> Result<TextureHandle, GpuError> {
        let handle = TextureHandle(self.next_handle);
        self.next_handle += 1;
        self.textures.insert(handle, SoftTexture::default());
        self.journal.push(GpuOp::Create(handle));
        trace!("Created texture {:?}", handle);
        Ok(handle)
    }

    fn bind_texture(&mut self, texture: TextureHandle) -> Result<(), GpuError> {
        self.texture(texture)?;
        self.journal.push(GpuOp::Bind(texture));
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureHandle) -> Result<(), GpuError> {
        self.textures
            .remove(&texture)
            .ok_or(GpuError::UnknownTexture(texture))?;
        self.journal.push(GpuOp::Delete(texture));
        trace!("Deleted texture {:?}", texture);
        Ok(())
    }

    fn set_parameter(
        &mut self,
        texture: TextureHandle,
        param: TextureParameter,
    ) -> Result<(), GpuError> {
        self.texture_mut(texture)?.sampler.apply(param);
        self.journal.push(GpuOp::Parameter(texture, param));
        Ok(())
    }

    fn set_mipmap_hint(&mut self, hint: MipmapHint) {
        self.hint = hint;
        self.journal.push(GpuOp::Hint(hint));
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

        let tex = self.texture_mut(texture)?;
        if level == 0 {
            let mut levels = vec![None; full_chain_len(width, height) as usize];
            levels[0] = Some(stored);
            tex.storage = Some(Storage {
                format: internal,
                width,
                height,
                levels,
            });
        } else {
            let storage = tex.storage.as_mut().ok_or(GpuError::NoImage(texture))?;
            let (w, h) = storage.extent(level)?;
            if (w, h) != (width, height) || storage.format != internal {
                return Err(GpuError::UnsupportedTransfer {
                    from: internal,
                    to: storage.format,
                });
            }
            storage.levels[level as usize] = Some(stored);
        }

        let auto_generate = level == 0 && tex.sampler.auto_generate;
        self.journal.push(GpuOp::Upload {
            texture,
            level,
            internal,
            source,
        });

        if auto_generate {
            self.regenerate(texture)?;
        }
        Ok(())
    }

    fn compressed_level_size(
        &mut self,
        texture: TextureHandle,
        level: u32,
    ) -> Result<usize, GpuError> {
        let storage = self.storage(texture)?;
        if !storage.format.is_block_compressed() {
            return Err(GpuError::NotCompressed(texture));
        }
        let (w, h) = storage.extent(level)?;
        Ok(storage.format.level_byte_size(w, h))
    }

    fn get_compressed_tex_image(
        &mut self,
        texture: TextureHandle,
        level: u32,
        out: &mut [u8],
    ) -> Result<(), GpuError> {
        let storage = self.storage(texture)?;
        if !storage.format.is_block_compressed() {
            return Err(GpuError::NotCompressed(texture));
        }
        let bytes = storage.level_bytes(level)?;
        if out.len() != bytes.len() {
            return Err(GpuError::DataSize {
                expected: bytes.len(),
                actual: out.len(),
            });
        }
        out.copy_from_slice(&bytes);
        self.journal.push(GpuOp::ReadCompressed(texture, level));
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

        let storage = self.storage(texture)?;
        let (w, h) = storage.extent(level)?;
        let pixels = convert(&storage.level_bytes(level)?, w, h, storage.format, format)?;
        if out.len() != pixels.len() {
            return Err(GpuError::DataSize {
                expected: pixels.len(),
                actual: out.len(),
            });
        }
        out.copy_from_slice(&pixels);
        self.journal.push(GpuOp::Read(texture, level));
        Ok(())
    }

    fn generate_mipmap(&mut self, texture: TextureHandle) -> Result<(), GpuError> {
        self.regenerate(texture)?;
        self.journal.push(GpuOp::GenerateMipmap(texture));
        Ok(())
    }
}
