//! Configuration persistence for gradepea settings

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::task::RetryPolicy;

/// Image display and compression limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Bounding box for images opened in an editor
    pub max_display_width: u32,
    pub max_display_height: u32,
    /// Only images larger than this on either axis are compressed for preview
    pub compress_threshold: u32,
    pub compress_max_width: u32,
    pub compress_max_height: u32,
    /// JPEG quality, 0.0-1.0
    pub compress_quality: f32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_display_width: 1440,
            max_display_height: 1440,
            compress_threshold: 2000,
            compress_max_width: 1920,
            compress_max_height: 1920,
            compress_quality: 0.85,
        }
    }
}

impl ImageConfig {
    /// Quality on the 1-100 scale used by JPEG encoders
    pub fn jpeg_quality(&self) -> u8 {
        (self.compress_quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    pub initial_zoom: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub zoom_step: f32,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            initial_zoom: 1.0,
            min_zoom: 0.5,
            max_zoom: 3.0,
            zoom_step: 0.25,
        }
    }
}

/// Side panel text metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub analysis_max_width: f64,
    pub analysis_font_size: f64,
    pub question_font_size: f64,
    pub line_height_ratio: f64,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            analysis_max_width: 400.0,
            analysis_font_size: 20.0,
            question_font_size: 24.0,
            line_height_ratio: 1.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub export_ms: u64,
    pub pdf_load_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            export_ms: 10_000,
            pdf_load_ms: 30_000,
        }
    }
}

impl TimeoutConfig {
    pub fn export(&self) -> Duration {
        Duration::from_millis(self.export_ms)
    }

    pub fn pdf_load(&self) -> Duration {
        Duration::from_millis(self.pdf_load_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff_ms: 1_000,
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
        }
    }
}

/// File name prefixes for exported PNGs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub canvas_prefix: String,
    pub grade_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            canvas_prefix: "excalidraw".to_string(),
            grade_prefix: "grade".to_string(),
        }
    }
}

/// Application configuration persisted between sessions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub image: ImageConfig,
    pub pdf: PdfConfig,
    pub text: TextConfig,
    pub timeouts: TimeoutConfig,
    pub fetch: FetchConfig,
    pub export: ExportConfig,
    /// Text field holding the grading JSON (or a URL to it)
    #[serde(default = "default_grade_field_name")]
    pub grade_field_name: String,
    /// Attachment fields whose name contains this are offered first as export targets
    #[serde(default = "default_result_field_hint")]
    pub result_field_hint: String,
}

fn default_grade_field_name() -> String {
    "自动批改结果参考".to_string()
}

fn default_result_field_hint() -> String {
    "结果".to_string()
}

impl AppConfig {
    /// Directory name under the user's config dir
    pub const ID: &'static str = "gradepea";

    /// Standard config location, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(Self::ID).join("config.json"))
    }

    /// Load configuration from disk, or return defaults if unavailable
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            log::warn!("No config directory available, using defaults");
            return Self::with_defaults();
        };
        if !path.exists() {
            return Self::with_defaults();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Error loading config, using defaults: {:?}", err);
                Self::with_defaults()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save configuration to disk
    pub fn save(&self) {
        let Some(path) = Self::default_path() else {
            log::error!("No config directory available for saving");
            return;
        };
        if let Err(err) = self.save_to(&path) {
            log::error!("Failed to save config: {:?}", err);
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Defaults with the named fields filled in
    pub fn with_defaults() -> Self {
        Self {
            grade_field_name: default_grade_field_name(),
            result_field_hint: default_result_field_hint(),
            ..Self::default()
        }
    }
}
