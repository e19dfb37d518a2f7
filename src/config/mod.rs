//! Application Configuration
//!
//! Pipeline tuning stored in TOML format. Every section falls back to its
//! defaults when omitted from the file.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Circle detection settings
    pub detection: DetectionSettings,
    /// OCR ensemble settings
    pub ocr: OcrSettings,
    /// Zero-shot classifier settings
    pub classifier: ClassifierSettings,
    /// Valuation settings
    pub valuation: ValuationSettings,
}

/// Circle detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Gaussian blur sigma applied before edge detection
    pub blur_sigma: f32,
    /// Inverse ratio of accumulator resolution to image resolution
    pub accumulator_resolution: f32,
    /// Minimum distance between detected centers (pixels)
    pub min_center_distance: f32,
    /// Upper Canny threshold (the lower one is half of it)
    pub edge_threshold: f32,
    /// Votes a center (and its radius) needs to be accepted
    pub accumulator_threshold: u32,
    /// Smallest accepted coin radius (pixels)
    pub min_radius: u32,
    /// Largest accepted coin radius (pixels)
    pub max_radius: u32,
    /// Maximum number of regions processed per image
    pub max_regions: usize,
    /// Padding added around each coin when cropping, relative to the radius
    pub padding_ratio: f32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            blur_sigma: 2.0,
            accumulator_resolution: 1.5,
            min_center_distance: 100.0,
            edge_threshold: 200.0,
            accumulator_threshold: 80,
            min_radius: 50,
            max_radius: 300,
            max_regions: 10,
            padding_ratio: 0.2,
        }
    }
}

/// OCR ensemble settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Tesseract `tessdata` directory (defaults to the library's own path)
    pub tessdata_dir: Option<PathBuf>,
    /// Tesseract language code
    pub language: String,
    /// Upscale factor applied to a region before any pass
    pub upscale_factor: u32,
    /// CLAHE clip limit
    pub clahe_clip_limit: f32,
    /// CLAHE tile grid size (tiles per side)
    pub clahe_tile_grid: u32,
    /// Adaptive threshold block size (odd, pixels)
    pub adaptive_block_size: u32,
    /// Constant subtracted from the local mean in adaptive thresholding
    pub adaptive_offset: i32,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            tessdata_dir: None,
            language: "eng".to_string(),
            upscale_factor: 3,
            clahe_clip_limit: 2.0,
            clahe_tile_grid: 8,
            adaptive_block_size: 11,
            adaptive_offset: 2,
        }
    }
}

/// Zero-shot classifier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Run the visual classifier at all
    pub enabled: bool,
    /// Directory holding the CLIP models (defaults to the data directory)
    pub models_dir: Option<PathBuf>,
    /// Temperature applied to cosine similarities before the softmax
    pub logit_scale: f32,
    /// Number of ranked candidates kept
    pub top_k: usize,
    /// Download missing models on first use
    pub auto_download: bool,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            models_dir: None,
            logit_scale: 100.0,
            top_k: 3,
            auto_download: false,
        }
    }
}

/// Valuation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationSettings {
    /// Silver spot price in USD per troy ounce, enables melt values
    pub silver_spot_usd: Option<f64>,
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "coinappraiser", "CoinAppraiser")
        .ok_or_else(|| anyhow::anyhow!("Could not determine platform directories"))
}

/// Default location of `config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// Application data directory (created on demand); models are cached below it
pub fn data_dir() -> Result<PathBuf> {
    let dir = project_dirs()?.data_dir().to_path_buf();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
