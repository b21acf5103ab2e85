//! mipforge - texture content builder
//!
//! Builds mip-mapped texture assets through a GPU context and writes them as
//! `.mftx` containers.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use mipforge::batch::{build_batch, TextureJob};
use mipforge::builder::{build, TextureBuildRequest};
use mipforge::capability::{DriverVersion, MipmapCapability};
use mipforge::config::{Backend, Settings};
use mipforge::container::TextureAsset;
use mipforge::format::{PixelFormatKind, TransferFormat};
use mipforge::gpu::{convert, list_gpus, GpuContext, SoftwareContext, WgpuContext};
use mipforge::record::MipPayload;
use mipforge::source::load_source;

#[derive(Parser)]
#[command(name = "mipforge")]
#[command(version)]
#[command(about = "Build mip-mapped texture assets through a GPU context")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use RUST_LOG=debug for more detail)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Args)]
struct BuildOptions {
    /// Output format: png, jpeg, dxt1, dxt3, dxt5
    #[arg(short, long, default_value = "png", value_parser = parse_format)]
    format: PixelFormatKind,

    /// Mip levels to read back (upper bound of the chain when generating)
    #[arg(short, long, default_value = "1")]
    mips: u32,

    /// Generate the mip chain on the GPU
    #[arg(short, long)]
    generate: bool,

    /// GPU context: software or wgpu (defaults to the saved setting)
    #[arg(long)]
    backend: Option<Backend>,

    /// GPU index for the wgpu backend (see `mipforge gpus`)
    #[arg(long)]
    gpu: Option<usize>,

    /// Report this driver version instead of the detected one, e.g. 2.1
    #[arg(long, value_parser = parse_driver_version)]
    driver_version: Option<DriverVersion>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a texture asset from an image file
    Build {
        /// Source image (PNG, JPEG, DDS, ...)
        input: PathBuf,

        /// Output asset path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        options: BuildOptions,
    },

    /// Build many images in parallel on the software context
    Batch {
        /// Source images
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory for the built assets
        #[arg(short, long)]
        output_dir: PathBuf,

        #[command(flatten)]
        options: BuildOptions,
    },

    /// Show the header and levels of a texture asset
    Inspect {
        /// Path to the asset
        asset: PathBuf,
    },

    /// Decode one level of an asset to an image file
    Extract {
        /// Path to the asset
        asset: PathBuf,
        /// Mip level index
        level: usize,
        /// Output image path (format from extension)
        output: PathBuf,
    },

    /// List available GPUs
    Gpus,

    /// Show or change the saved settings
    Config {
        /// Default GPU context: software or wgpu
        #[arg(long)]
        backend: Option<Backend>,

        /// Default GPU index for the wgpu backend
        #[arg(long)]
        gpu: Option<usize>,

        /// Driver version to report instead of the detected one, e.g. 2.1
        #[arg(long, value_parser = parse_driver_version)]
        driver_version: Option<DriverVersion>,

        /// Quality for JPEG levels (1-100)
        #[arg(long)]
        jpeg_quality: Option<u8>,

        /// Forget the saved GPU index and driver version
        #[arg(long)]
        reset_gpu: bool,
    },
}

fn parse_format(s: &str) -> Result<PixelFormatKind, String> {
    PixelFormatKind::from_str(s).ok_or_else(|| format!("unknown format '{s}'"))
}

fn parse_driver_version(s: &str) -> Result<DriverVersion, String> {
    DriverVersion::parse(s).ok_or_else(|| format!("expected MAJOR.MINOR, got '{s}'"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Only initialize logging if verbose or RUST_LOG is set
    if cli.verbose || std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(if cli.verbose {
                    "mipforge=debug".parse()?
                } else {
                    "mipforge=warn".parse()?
                }),
            )
            .init();
    }

    let settings = Settings::load();

    match cli.command {
        Commands::Build {
            input,
            output,
            options,
        } => {
            check_output_format(options.format)?;
            let settings = effective_settings(&settings, &options)?;
            let source = load_source(&input)?;

            let mut ctx = open_context(&settings)?;
            let driver = ctx.driver_version();
            println!(
                "Driver {} ({:?})",
                driver,
                MipmapCapability::classify(driver)
            );

            let request = TextureBuildRequest {
                generate_mipmaps: options.generate,
                requested_mip_count: options.mips,
                pixel_data: &source.data,
                width: source.width,
                height: source.height,
                input_format: source.format,
                output_format: options.format,
            };
            let built = build(ctx.as_mut(), &request)
                .with_context(|| format!("Failed to build {}", input.display()))?;

            let asset = TextureAsset::from(built);
            asset.save(&output, settings.jpeg_quality)?;
            println!(
                "Wrote {} ({}x{} {}, {} levels)",
                output.display(),
                asset.metadata.width,
                asset.metadata.height,
                asset.metadata.format,
                asset.levels.len()
            );
        }

        Commands::Batch {
            inputs,
            output_dir,
            options,
        } => {
            check_output_format(options.format)?;
            let settings = effective_settings(&settings, &options)?;
            if settings.backend != Backend::Software {
                bail!("Batch builds run on the software context only");
            }
            let driver = settings
                .driver_override()?
                .unwrap_or(DriverVersion::MODERN);

            std::fs::create_dir_all(&output_dir)
                .with_context(|| format!("Failed to create {:?}", output_dir))?;

            let mut jobs = Vec::with_capacity(inputs.len());
            for input in &inputs {
                let source = load_source(input)?;
                jobs.push(TextureJob {
                    data: source.data,
                    width: source.width,
                    height: source.height,
                    input_format: source.format,
                    output_format: options.format,
                    generate_mipmaps: options.generate,
                    mip_count: options.mips,
                    id: Some(input.to_string_lossy().into_owned()),
                });
            }

            let mut failed = 0;
            for ((_, result), input) in build_batch(jobs, driver).into_iter().zip(&inputs) {
                let outcome = result
                    .map_err(anyhow::Error::from)
                    .and_then(|built| {
                        let path = asset_path(&output_dir, input);
                        TextureAsset::from(built).save(&path, settings.jpeg_quality)?;
                        Ok(path)
                    });
                match outcome {
                    Ok(path) => println!("{} -> {}", input.display(), path.display()),
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}: {:#}", input.display(), e);
                    }
                }
            }

            println!("\n{}/{} built", inputs.len() - failed, inputs.len());
            if failed > 0 {
                bail!("{} texture(s) failed", failed);
            }
        }

        Commands::Inspect { asset } => {
            let texture = TextureAsset::load(&asset)?;
            let meta = &texture.metadata;

            println!("=== Texture Asset ===");
            println!("Size:       {}x{}", meta.width, meta.height);
            println!("Format:     {}", meta.format);
            println!("Generated:  {}", if meta.generate_mipmaps { "Yes" } else { "No" });
            println!("Mip count:  {}", meta.mip_count);
            println!("Levels:     {}", texture.levels.len());
            println!();
            for (i, level) in texture.levels.iter().enumerate() {
                let payload = match level.payload() {
                    MipPayload::Bitmap(_) => "bitmap".to_string(),
                    MipPayload::Compressed(data) => format!("{} bytes", data.len()),
                };
                println!(
                    "  [{:2}] {:>5}x{:<5} {:<5} {}",
                    i,
                    level.width(),
                    level.height(),
                    level.format(),
                    payload
                );
            }
        }

        Commands::Extract {
            asset,
            level,
            output,
        } => {
            let texture = TextureAsset::load(&asset)?;
            let Some(record) = texture.levels.get(level) else {
                bail!(
                    "Level {} out of range ({} has {} levels)",
                    level,
                    asset.display(),
                    texture.levels.len()
                );
            };

            let image = match record.payload() {
                MipPayload::Bitmap(image) => image.clone(),
                MipPayload::Compressed(data) => {
                    let Some(block) = record.format().block_format() else {
                        bail!("Level {} has raw {} data", level, record.format());
                    };
                    let (w, h) = (record.width(), record.height());
                    let rgba = convert(data, w, h, block, TransferFormat::Rgba8)?;
                    RgbaImage::from_raw(w, h, rgba).context("Decoded level has the wrong size")?
                }
            };
            image
                .save(&output)
                .with_context(|| format!("Failed to write {:?}", output))?;
            println!(
                "Extracted level {} ({}x{}) to {}",
                level,
                image.width(),
                image.height(),
                output.display()
            );
        }

        Commands::Gpus => {
            let gpus = list_gpus();
            if gpus.is_empty() {
                println!("No GPUs found");
            }
            for gpu in &gpus {
                println!("[{}] {} - driver: {}", gpu.adapter_index, gpu, gpu.driver);
            }
        }

        Commands::Config {
            backend,
            gpu,
            driver_version,
            jpeg_quality,
            reset_gpu,
        } => {
            let mut updated = settings.with_overrides(backend, gpu, driver_version);
            if let Some(quality) = jpeg_quality {
                updated.jpeg_quality = quality;
            }
            if reset_gpu {
                updated.gpu_index = None;
                updated.driver_version = None;
            }

            if updated != settings {
                updated.validate().context("Invalid settings")?;
                updated.save()?;
                println!("Saved {}", Settings::settings_path()?.display());
            }

            println!("Backend:         {}", updated.backend);
            println!(
                "GPU index:       {}",
                updated
                    .gpu_index
                    .map_or_else(|| "auto".to_string(), |i| i.to_string())
            );
            println!(
                "Driver version:  {}",
                updated.driver_version.as_deref().unwrap_or("detected")
            );
            println!("JPEG quality:    {}", updated.jpeg_quality);
        }
    }

    Ok(())
}

/// Bitmap levels are only written as PNG or JPEG
fn check_output_format(format: PixelFormatKind) -> Result<()> {
    if format == PixelFormatKind::Bgra8 {
        bail!("Output format must be png, jpeg, dxt1, dxt3 or dxt5");
    }
    Ok(())
}

/// Saved settings with this command's overrides, validated
fn effective_settings(settings: &Settings, options: &BuildOptions) -> Result<Settings> {
    let effective = settings.with_overrides(options.backend, options.gpu, options.driver_version);
    effective.validate().context("Invalid settings")?;
    Ok(effective)
}

fn open_context(settings: &Settings) -> Result<Box<dyn GpuContext>> {
    let driver = settings.driver_override()?;

    match settings.backend {
        Backend::Software => Ok(Box::new(SoftwareContext::new(
            driver.unwrap_or(DriverVersion::MODERN),
        ))),
        Backend::Wgpu => {
            let ctx = WgpuContext::with_gpu_index(settings.gpu_index, driver)
                .context("Failed to initialize GPU context")?;
            println!("Using GPU: {}", ctx.gpu_info);
            Ok(Box::new(ctx))
        }
    }
}

fn asset_path(output_dir: &Path, input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or(input.as_os_str());
    output_dir.join(stem).with_extension("mftx")
}
