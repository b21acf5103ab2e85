//! mipforge - texture content builder
//!
//! Uploads pixel data to a GPU context, optionally generates a mip chain, and
//! captures every level as a serializable record.

pub mod batch;
pub mod builder;
pub mod capability;
pub mod config;
pub mod container;
pub mod error;
pub mod format;
pub mod gpu;
pub mod record;
pub mod source;
pub mod writer;

pub use builder::{build, BuiltTexture, TextureBuildRequest, TextureMetadata};
pub use error::{BuildError, GpuError};
pub use format::PixelFormatKind;
pub use record::{MipLevelRecord, MipPayload};
