//! Settings management
//!
//! Stores user preferences in ~/.config/mipforge/settings.json

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::capability::DriverVersion;
use crate::writer::DEFAULT_JPEG_QUALITY;

/// Which GPU context builds run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// CPU reference context, always available
    #[default]
    Software,
    /// Hardware context through wgpu
    Wgpu,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Software => "software",
            Backend::Wgpu => "wgpu",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.name())
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "software" | "cpu" => Ok(Backend::Software),
            "wgpu" | "gpu" => Ok(Backend::Wgpu),
            other => Err(format!("unknown backend '{other}' (expected software or wgpu)")),
        }
    }
}

/// User settings for mipforge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub backend: Backend,

    /// Selected GPU index (None = auto-select)
    #[serde(default)]
    pub gpu_index: Option<usize>,

    /// Driver version to report instead of the detected one, e.g. "2.1"
    #[serde(default)]
    pub driver_version: Option<String>,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            gpu_index: None,
            driver_version: None,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl Settings {
    /// Get the config directory path (~/.config/mipforge)
    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("mipforge");

        Ok(config_dir)
    }

    /// Get the settings file path
    pub fn settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("settings.json"))
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        match Self::settings_path().and_then(|path| Self::load_from(&path)) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Could not load settings: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Load settings from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;

        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    /// Settings with command-line values layered on top
    pub fn with_overrides(
        &self,
        backend: Option<Backend>,
        gpu_index: Option<usize>,
        driver_version: Option<DriverVersion>,
    ) -> Self {
        Self {
            backend: backend.unwrap_or(self.backend),
            gpu_index: gpu_index.or(self.gpu_index),
            driver_version: driver_version
                .map(|v| v.to_string())
                .or_else(|| self.driver_version.clone()),
            jpeg_quality: self.jpeg_quality,
        }
    }

    /// Parsed driver version override, if one is set
    pub fn driver_override(&self) -> Result<Option<DriverVersion>, ConfigError> {
        self.driver_version
            .as_deref()
            .map(|s| DriverVersion::parse(s).ok_or_else(|| ConfigError::InvalidDriverVersion(s.to_string())))
            .transpose()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::InvalidJpegQuality(self.jpeg_quality));
        }

        self.driver_override()?;

        if self.gpu_index.is_some() && self.backend == Backend::Software {
            return Err(ConfigError::GpuIndexWithoutGpu);
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JPEG quality must be between 1 and 100, got {0}")]
    InvalidJpegQuality(u8),

    #[error("Invalid driver version '{0}' (expected MAJOR.MINOR)")]
    InvalidDriverVersion(String),

    #[error("A GPU index only applies to the wgpu backend")]
    GpuIndexWithoutGpu,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.backend, Backend::Software);
        assert!(settings.gpu_index.is_none());
        assert_eq!(settings.jpeg_quality, 90);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"backend":"wgpu"}"#).unwrap();
        assert_eq!(settings.backend, Backend::Wgpu);
        assert_eq!(settings.jpeg_quality, DEFAULT_JPEG_QUALITY);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            backend: Backend::Wgpu,
            gpu_index: Some(1),
            driver_version: Some("2.1".into()),
            jpeg_quality: 75,
        };
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.driver_override().unwrap(), Some(DriverVersion::new(2, 1)));
    }

    #[test]
    fn test_load_missing_returns_defaults() {
        let dir = tempdir().unwrap();
        let loaded = Settings::load_from(&dir.path().join("settings.json")).unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn test_load_invalid_json_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_validate() {
        let mut settings = Settings::default();
        settings.jpeg_quality = 0;
        assert!(matches!(settings.validate(), Err(ConfigError::InvalidJpegQuality(0))));

        let mut settings = Settings::default();
        settings.driver_version = Some("banana".into());
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidDriverVersion(_))
        ));

        let mut settings = Settings::default();
        settings.gpu_index = Some(0);
        assert!(matches!(settings.validate(), Err(ConfigError::GpuIndexWithoutGpu)));
        settings.backend = Backend::Wgpu;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_overrides_apply_before_validation() {
        let saved = Settings {
            gpu_index: Some(1),
            ..Settings::default()
        };
        assert!(matches!(saved.validate(), Err(ConfigError::GpuIndexWithoutGpu)));

        let effective = saved.with_overrides(Some(Backend::Wgpu), None, None);
        assert_eq!(effective.backend, Backend::Wgpu);
        assert_eq!(effective.gpu_index, Some(1));
        assert!(effective.validate().is_ok());
    }

    #[test]
    fn test_overrides_keep_saved_values_when_absent() {
        let saved = Settings {
            backend: Backend::Wgpu,
            driver_version: Some("2.1".into()),
            jpeg_quality: 70,
            ..Settings::default()
        };
        assert_eq!(saved.with_overrides(None, None, None), saved);

        let effective = saved.with_overrides(None, Some(0), Some(DriverVersion::new(3, 3)));
        assert_eq!(effective.gpu_index, Some(0));
        assert_eq!(effective.driver_override().unwrap(), Some(DriverVersion::new(3, 3)));
        assert_eq!(effective.jpeg_quality, 70);
    }

    #[test]
    fn test_backend_display_pads() {
        assert_eq!(format!("[{:<8}]", Backend::Wgpu), "[wgpu    ]");
        assert_eq!(Backend::Software.to_string(), "software");
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("WGPU".parse::<Backend>().unwrap(), Backend::Wgpu);
        assert_eq!("cpu".parse::<Backend>().unwrap(), Backend::Software);
        assert!("vulkan".parse::<Backend>().is_err());
    }
}
