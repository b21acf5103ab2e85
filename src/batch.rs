//! Parallel texture builds
//!
//! Each job gets its own [`SoftwareContext`], so builds never share GPU state.

use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use crate::builder::{build, BuiltTexture, TextureBuildRequest};
use crate::capability::DriverVersion;
use crate::error::BuildError;
use crate::format::PixelFormatKind;
use crate::gpu::SoftwareContext;

/// Job for batch texture building
#[derive(Debug, Clone)]
pub struct TextureJob {
    /// BGRA pixels or raw blocks, matching `input_format`
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub input_format: PixelFormatKind,
    pub output_format: PixelFormatKind,
    pub generate_mipmaps: bool,
    pub mip_count: u32,
    /// Optional identifier for tracking
    pub id: Option<String>,
}

impl TextureJob {
    fn request(&self) -> TextureBuildRequest<'_> {
        TextureBuildRequest {
            generate_mipmaps: self.generate_mipmaps,
            requested_mip_count: self.mip_count,
            pixel_data: &self.data,
            width: self.width,
            height: self.height,
            input_format: self.input_format,
            output_format: self.output_format,
        }
    }
}

/// Build every job in parallel on the CPU reference context
///
/// Results keep the job order.
pub fn build_batch(
    jobs: Vec<TextureJob>,
    driver: DriverVersion,
) -> Vec<(Option<String>, Result<BuiltTexture, BuildError>)> {
    let total = jobs.len();
    let completed = AtomicUsize::new(0);

    info!("Building {} textures (driver {})", total, driver);

    let results: Vec<_> = jobs
        .into_par_iter()
        .map(|job| {
            let mut ctx = SoftwareContext::new(driver);
            let result = build(&mut ctx, &job.request());
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            match &result {
                Ok(built) => debug!(
                    "[{}/{}] {:?}: {} level(s)",
                    done,
                    total,
                    job.id,
                    built.levels.len()
                ),
                Err(e) => warn!("[{}/{}] {:?} failed: {}", done, total, job.id, e),
            }
            (job.id, result)
        })
        .collect();

    let success = results.iter().filter(|(_, r)| r.is_ok()).count();
    info!("Texture building complete: {}/{} succeeded", success, total);

    results
}
