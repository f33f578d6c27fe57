//! Run configuration and converter settings.
//!
//! `RunConfig` is the validated boundary value handed to the pipeline by the
//! CLI layer. `Settings` carries rendering and input options and can be loaded
//! from a TOML file, with every field defaulted.

use crate::discovery::DEFAULT_EXTENSIONS;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// Number of parallel execution units on this host
pub fn available_units() -> usize {
    num_cpus::get().max(1)
}

/// Validated inputs for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    source_root: PathBuf,
    dest_root: PathBuf,
    concurrency: usize,
}

impl RunConfig {
    /// Validate against the host's execution units
    pub fn new(
        source_root: impl Into<PathBuf>,
        dest_root: impl Into<PathBuf>,
        concurrency: usize,
    ) -> std::result::Result<Self, ConfigError> {
        Self::validated(source_root, dest_root, concurrency, available_units())
    }

    /// Validate against an explicit upper bound for concurrency
    pub fn validated(
        source_root: impl Into<PathBuf>,
        dest_root: impl Into<PathBuf>,
        concurrency: usize,
        max_units: usize,
    ) -> std::result::Result<Self, ConfigError> {
        let source_root = source_root.into();
        if !source_root.is_dir() {
            return Err(ConfigError::SourceMissing { path: source_root });
        }

        validate_concurrency(concurrency, max_units)?;

        Ok(Self {
            source_root,
            dest_root: dest_root.into(),
            concurrency,
        })
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

/// Check that `value` lies in `1..=max_units`
pub fn validate_concurrency(
    value: usize,
    max_units: usize,
) -> std::result::Result<(), ConfigError> {
    if value == 0 || value > max_units {
        return Err(ConfigError::ConcurrencyOutOfRange {
            value,
            max: max_units,
        });
    }
    Ok(())
}

/// Converter settings, loadable from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// PDF rendering options
    #[serde(default)]
    pub render: RenderSettings,
    /// Source selection and decoding options
    #[serde(default)]
    pub input: InputSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Directory searched first for the font family
    #[serde(default = "default_font_dir")]
    pub font_dir: PathBuf,
    /// Font family name; files must be named `<family>-Regular.ttf` etc.
    #[serde(default = "default_font_family")]
    pub font_family: String,
    /// Font size in points
    #[serde(default = "default_font_size")]
    pub font_size: u8,
    /// Page margins in millimeters
    #[serde(default = "default_margins")]
    pub margins: u8,
    /// Line spacing multiplier
    #[serde(default = "default_line_spacing")]
    pub line_spacing: f64,
    /// Vertical gap after each block, in lines
    #[serde(default = "default_block_gap")]
    pub block_gap: f64,
    /// Characters per line before a block is wrapped
    #[serde(default = "default_wrap_width")]
    pub wrap_width: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSettings {
    /// Extensions eligible for conversion, without the leading dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Encoding label tried when UTF-8 decoding fails; empty disables it
    #[serde(default = "default_fallback_encoding")]
    pub fallback_encoding: String,
    /// Pending tasks buffered per worker in the intake queue
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_font_dir() -> PathBuf {
    PathBuf::from("./fonts")
}

fn default_font_family() -> String {
    "LiberationMono".to_string()
}

fn default_font_size() -> u8 {
    14
}

fn default_margins() -> u8 {
    10
}

fn default_line_spacing() -> f64 {
    1.0
}

fn default_block_gap() -> f64 {
    0.1
}

fn default_wrap_width() -> usize {
    64
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

fn default_fallback_encoding() -> String {
    "windows-1252".to_string()
}

fn default_queue_depth() -> usize {
    2
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            font_dir: default_font_dir(),
            font_family: default_font_family(),
            font_size: default_font_size(),
            margins: default_margins(),
            line_spacing: default_line_spacing(),
            block_gap: default_block_gap(),
            wrap_width: default_wrap_width(),
        }
    }
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            fallback_encoding: default_fallback_encoding(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file and validate them
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::FileNotFound {
                path: path.to_path_buf(),
            })?;

        let settings = Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::InvalidFormat { reason, .. } => ConfigError::InvalidFormat {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;

        info!("Configuration loaded from: {}", path.display());
        Ok(settings)
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, ConfigError> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| ConfigError::InvalidFormat {
                path: PathBuf::new(),
                reason: e.to_string(),
            })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let render = &self.render;

        if render.font_size == 0 {
            return Err(invalid("render.font_size", "cannot be zero"));
        }
        if render.wrap_width == 0 {
            return Err(invalid("render.wrap_width", "cannot be zero"));
        }
        if render.line_spacing.is_nan() || render.line_spacing <= 0.0 {
            return Err(invalid("render.line_spacing", "must be positive"));
        }
        if render.block_gap < 0.0 {
            return Err(invalid("render.block_gap", "cannot be negative"));
        }

        if self.input.queue_depth == 0 {
            return Err(invalid("input.queue_depth", "cannot be zero"));
        }
        if self.input.extensions.is_empty() {
            warn!("No file extensions configured, nothing will be converted");
        }
        let label = &self.input.fallback_encoding;
        if !label.is_empty() && encoding_rs::Encoding::for_label(label.as_bytes()).is_none() {
            return Err(ConfigError::UnknownEncoding {
                label: label.clone(),
            });
        }

        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
