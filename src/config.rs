//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILEXTRACT_CONFIG` (environment variable)
//! 2. `~/.config/mailextract/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailextract\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags override every value loaded here.

use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::DEFAULT_MAX_SUBJECT_BYTES;
use crate::write::{OutputFormat, PdfStyle};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Export defaults.
    pub export: ExportConfig,
    /// File naming.
    pub naming: NamingConfig,
    /// PDF layout.
    pub pdf: PdfConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Export defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Default output format.
    pub default_format: OutputFormat,
    /// Default output root. When unset, `output/<archive stem>_extracted`.
    pub default_output_dir: Option<PathBuf>,
}

/// File naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Offset from UTC, in minutes, for the date prefix of file names.
    pub utc_offset_minutes: i32,
    /// Byte budget for the subject part of a file name.
    pub max_subject_bytes: usize,
}

/// PDF layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Header block font size in points.
    pub font_size: u16,
    /// Body font size in points.
    pub body_font_size: u16,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_format: OutputFormat::Eml,
            default_output_dir: None,
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            max_subject_bytes: DEFAULT_MAX_SUBJECT_BYTES,
        }
    }
}

impl Default for PdfConfig {
    fn default() -> Self {
        let style = PdfStyle::default();
        Self {
            font_size: style.font_size,
            body_font_size: style.body_font_size,
        }
    }
}

impl Config {
    /// Offset for date prefixes. Out-of-range values fall back to UTC.
    pub fn utc_offset(&self) -> FixedOffset {
        self.naming
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                tracing::warn!(
                    minutes = self.naming.utc_offset_minutes,
                    "Invalid UTC offset in config, using UTC"
                );
                Utc.fix()
            })
    }

    /// PDF layout with the configured offset.
    pub fn pdf_style(&self) -> PdfStyle {
        PdfStyle {
            font_size: self.pdf.font_size,
            body_font_size: self.pdf.body_font_size,
            utc_offset: self.utc_offset(),
        }
    }

    /// Output root for `archive` when none is given on the command line.
    pub fn output_root_for(&self, archive: &Path) -> PathBuf {
        if let Some(dir) = &self.export.default_output_dir {
            return dir.clone();
        }
        let stem = archive
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive".to_string());
        PathBuf::from("output").join(format!("{stem}_extracted"))
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            return load_from(&path);
        }
    }
    Config::default()
}

/// Load one config file, falling back to defaults on any error.
pub fn load_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILEXTRACT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailextract").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailextract")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mailextract.log")
}
