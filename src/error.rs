//! Error types for texture builds and GPU contexts

use crate::format::{PixelFormatKind, TransferFormat};
use crate::gpu::TextureHandle;

/// Errors raised by a GPU context
///
/// Builds never catch or wrap these; they surface through
/// [`BuildError::Gpu`] unchanged.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("unknown texture handle {0:?}")]
    UnknownTexture(TextureHandle),

    #[error("texture {0:?} has no image defined")]
    NoImage(TextureHandle),

    #[error("mip level {level} out of range (texture has {levels} levels)")]
    InvalidLevel { level: u32, levels: u32 },

    #[error("invalid data size: expected {expected} bytes, got {actual}")]
    DataSize { expected: usize, actual: usize },

    #[error("cannot transfer {from:?} into {to:?}")]
    UnsupportedTransfer { from: TransferFormat, to: TransferFormat },

    #[error("texture {0:?} is not block-compressed")]
    NotCompressed(TextureHandle),

    #[error("block codec failed: {0}")]
    Codec(String),

    #[error("GPU device error: {0}")]
    Device(String),
}

/// Errors raised while building or serializing a texture
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(&'static str),

    #[error("bitmap levels cannot be encoded as {0}")]
    UnsupportedEncoding(PixelFormatKind),

    #[error("invalid build request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("binary I/O failed: {0}")]
    Binary(#[from] binrw::Error),

    #[error("unknown format code {0}")]
    UnknownFormat(i32),

    #[error("malformed content: {0}")]
    Malformed(String),
}
