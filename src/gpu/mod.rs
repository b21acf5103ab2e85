//! GPU context abstraction
//!
//! The texture builder talks to the GPU through [`GpuContext`]. Two contexts
//! are provided: [`SoftwareContext`], a deterministic CPU implementation used
//! for headless builds and tests, and [`WgpuContext`], backed by real hardware.
//!
//! Every GPU-touching span is wrapped in a [`ContextScope`], and transient
//! textures live in a [`TextureGuard`] so they are deleted on every exit path.

mod mipgen;
mod software;
mod transfer;
mod wgpu_context;

use std::ops::{Deref, DerefMut};
use tracing::warn;

use crate::capability::DriverVersion;
use crate::error::GpuError;
use crate::format::TransferFormat;

pub use mipgen::{downsample_chain, filter_for_hint};
pub use software::{GpuOp, SoftwareContext};
pub use transfer::convert;
pub use wgpu_context::{list_gpus, GpuInfo, WgpuContext};

/// Opaque texture name handed out by a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
}

/// Per-texture parameters a builder may set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureParameter {
    MinFilter(FilterMode),
    MagFilter(FilterMode),
    WrapS(WrapMode),
    WrapT(WrapMode),
    /// Highest mip level index sampled
    MaxLevel(u32),
    /// Regenerate the mip chain automatically whenever level 0 is uploaded
    GenerateMipmap(bool),
}

/// Quality hint for mipmap generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MipmapHint {
    Fastest,
    Nicest,
    #[default]
    DontCare,
}

/// Sampler and generation state tracked per texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerState {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub max_level: u32,
    pub auto_generate: bool,
}

impl Default for SamplerState {
    // GL initial state
    fn default() -> Self {
        Self {
            min_filter: FilterMode::Nearest,
            mag_filter: FilterMode::Linear,
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            max_level: 1000,
            auto_generate: false,
        }
    }
}

impl SamplerState {
    pub fn apply(&mut self, param: TextureParameter) {
        match param {
            TextureParameter::MinFilter(f) => self.min_filter = f,
            TextureParameter::MagFilter(f) => self.mag_filter = f,
            TextureParameter::WrapS(w) => self.wrap_s = w,
            TextureParameter::WrapT(w) => self.wrap_t = w,
            TextureParameter::MaxLevel(level) => self.max_level = level,
            TextureParameter::GenerateMipmap(on) => self.auto_generate = on,
        }
    }
}

/// Operations a GPU context exposes to the texture builder
///
/// A context is owned by one execution context and is not reentrant; callers
/// hold it by `&mut` for the duration of a build.
pub trait GpuContext {
    /// Graphics API version reported by the driver
    fn driver_version(&self) -> DriverVersion;

    /// Make this context current on the calling thread
    fn enter(&mut self) -> Result<(), GpuError> {
        Ok(())
    }

    /// Release the context entered by [`GpuContext::enter`]
    fn exit(&mut self) {}

    fn create_texture(&mut self) -> Result<TextureHandle, GpuError>;

    fn bind_texture(&mut self, texture: TextureHandle) -> Result<(), GpuError>;

    fn delete_texture(&mut self, texture: TextureHandle) -> Result<(), GpuError>;

    fn set_parameter(
        &mut self,
        texture: TextureHandle,
        param: TextureParameter,
    ) -> Result<(), GpuError>;

    fn set_mipmap_hint(&mut self, hint: MipmapHint);

    /// Define one image level
    ///
    /// `data` is interpreted as `source`; the context stores it as `internal`,
    /// converting if the two differ.
    #[allow(clippy::too_many_arguments)]
    fn tex_image_2d(
        &mut self,
        texture: TextureHandle,
        level: u32,
        internal: TransferFormat,
        width: u32,
        height: u32,
        source: TransferFormat,
        data: &[u8],
    ) -> Result<(), GpuError>;

    /// Byte size of a block-compressed level
    fn compressed_level_size(&mut self, texture: TextureHandle, level: u32)
        -> Result<usize, GpuError>;

    /// Read a block-compressed level's raw blocks
    fn get_compressed_tex_image(
        &mut self,
        texture: TextureHandle,
        level: u32,
        out: &mut [u8],
    ) -> Result<(), GpuError>;

    /// Read a level as uncompressed pixels in `format`
    fn get_tex_image(
        &mut self,
        texture: TextureHandle,
        level: u32,
        format: TransferFormat,
        out: &mut [u8],
    ) -> Result<(), GpuError>;

    /// Rebuild levels 1.. from level 0
    fn generate_mipmap(&mut self, texture: TextureHandle) -> Result<(), GpuError>;
}

/// Entered GPU context; exits on drop, including during unwinding
pub struct ContextScope<'a, C: GpuContext + ?Sized> {
    ctx: &'a mut C,
}

impl<'a, C: GpuContext + ?Sized> ContextScope<'a, C> {
    pub fn enter(ctx: &'a mut C) -> Result<Self, GpuError> {
        ctx.enter()?;
        Ok(Self { ctx })
    }
}

impl<C: GpuContext + ?Sized> Deref for ContextScope<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.ctx
    }
}

impl<C: GpuContext + ?Sized> DerefMut for ContextScope<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.ctx
    }
}

impl<C: GpuContext + ?Sized> Drop for ContextScope<'_, C> {
    fn drop(&mut self) {
        self.ctx.exit();
    }
}

/// Texture that is deleted when the guard goes out of scope
pub struct TextureGuard<'a, C: GpuContext + ?Sized> {
    ctx: &'a mut C,
    handle: TextureHandle,
}

impl<'a, C: GpuContext + ?Sized> TextureGuard<'a, C> {
    /// Create a texture inside its own context scope
    pub fn create(ctx: &'a mut C) -> Result<Self, GpuError> {
        let handle = {
            let mut scope = ContextScope::enter(&mut *ctx)?;
            scope.create_texture()?
        };
        Ok(Self { ctx, handle })
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    /// Enter the owning context for a span of work on this texture
    pub fn scope(&mut self) -> Result<ContextScope<'_, C>, GpuError> {
        ContextScope::enter(&mut *self.ctx)
    }
}

impl<C: GpuContext + ?Sized> Drop for TextureGuard<'_, C> {
    fn drop(&mut self) {
        let handle = self.handle;
        match ContextScope::enter(&mut *self.ctx) {
            Ok(mut scope) => {
                if let Err(e) = scope.delete_texture(handle) {
                    warn!("Failed to delete texture {:?}: {}", handle, e);
                }
            }
            Err(e) => warn!("Could not enter GPU context to delete {:?}: {}", handle, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_state_apply() {
        let mut state = SamplerState::default();
        state.apply(TextureParameter::MinFilter(FilterMode::Linear));
        state.apply(TextureParameter::MagFilter(FilterMode::Nearest));
        state.apply(TextureParameter::MaxLevel(4));
        state.apply(TextureParameter::GenerateMipmap(true));
        assert_eq!(state.min_filter, FilterMode::Linear);
        assert_eq!(state.wrap_s, WrapMode::Repeat);
        assert_eq!(state.wrap_t, WrapMode::Repeat);
        assert_eq!(state.mag_filter, FilterMode::Nearest);
        assert_eq!(state.max_level, 4);
        assert!(state.auto_generate);
    }

    #[test]
    fn test_guard_deletes_texture_on_drop() {
        let mut ctx = SoftwareContext::new(DriverVersion::new(4, 5));
        let handle = {
            let guard = TextureGuard::create(&mut ctx).unwrap();
            guard.handle()
        };
        assert_eq!(ctx.live_textures(), 0);
        assert!(ctx.journal().contains(&GpuOp::Delete(handle)));
        assert_eq!(ctx.scope_depth(), 0);
    }

    #[test]
    fn test_scope_exits_on_error() {
        let mut ctx = SoftwareContext::new(DriverVersion::new(4, 5));
        {
            let mut scope = ContextScope::enter(&mut ctx).unwrap();
            assert_eq!(scope.scope_depth(), 1);
            assert!(scope.bind_texture(TextureHandle(99)).is_err());
        }
        assert_eq!(ctx.scope_depth(), 0);
    }
}
