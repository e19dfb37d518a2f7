//! Model management for ONNX Runtime
//!
//! Handles downloading, caching, and loading of the CLIP ViT-B/32 encoders and
//! their tokenizer.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use ort::session::{builder::GraphOptimizationLevel, Session};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Set to any value to forbid network downloads
pub const OFFLINE_ENV: &str = "COIN_APPRAISER_OFFLINE";

/// Model identifier for CLIP components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Image tower, pixels to embedding
    VisualEncoder,
    /// Text tower, token ids to embedding
    TextEncoder,
    /// BPE tokenizer for the text tower
    Tokenizer,
}

impl ModelType {
    pub const ALL: [ModelType; 3] = [
        ModelType::VisualEncoder,
        ModelType::TextEncoder,
        ModelType::Tokenizer,
    ];

    /// Get the filename for this model type
    pub fn filename(&self) -> &'static str {
        match self {
            ModelType::VisualEncoder => "clip-vit-b32-visual.onnx",
            ModelType::TextEncoder => "clip-vit-b32-text.onnx",
            ModelType::Tokenizer => "clip-tokenizer.json",
        }
    }

    /// Get the download URL for this model (Qdrant exports on Hugging Face)
    pub fn download_url(&self) -> &'static str {
        match self {
            ModelType::VisualEncoder => {
                "https://huggingface.co/Qdrant/clip-ViT-B-32-vision/resolve/main/model.onnx"
            }
            ModelType::TextEncoder => {
                "https://huggingface.co/Qdrant/clip-ViT-B-32-text/resolve/main/model.onnx"
            }
            ModelType::Tokenizer => {
                "https://huggingface.co/Qdrant/clip-ViT-B-32-text/resolve/main/tokenizer.json"
            }
        }
    }

    /// Plausible file size range in bytes
    pub fn expected_size_range(&self) -> (u64, u64) {
        match self {
            ModelType::VisualEncoder => (50_000_000, 700_000_000), // ~350 MB
            ModelType::TextEncoder => (50_000_000, 600_000_000),   // ~250 MB
            ModelType::Tokenizer => (100_000, 20_000_000),         // ~2 MB
        }
    }

    /// Display name for progress reporting
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::VisualEncoder => "CLIP Visual Encoder",
            ModelType::TextEncoder => "CLIP Text Encoder",
            ModelType::Tokenizer => "CLIP Tokenizer",
        }
    }
}

/// Model manifest tracking downloaded models
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelManifest {
    pub version: String,
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub filename: String,
    pub size_bytes: u64,
    pub sha256: String,
    /// Unix seconds
    pub downloaded_at: u64,
}

impl Default for ModelManifest {
    fn default() -> Self {
        Self {
            version: "1.0.0".to_string(),
            models: Vec::new(),
        }
    }
}

/// Availability of one model file
#[derive(Debug, Clone)]
pub struct ModelStatus {
    pub model_type: ModelType,
    pub path: PathBuf,
    pub available: bool,
    pub size_bytes: Option<u64>,
}

/// Model manager for downloading and caching ONNX models
pub struct ModelManager {
    models_dir: PathBuf,
}

impl ModelManager {
    /// Manager rooted at `<data_dir>/models`
    pub fn new() -> Result<Self> {
        Self::with_dir(crate::config::data_dir()?.join("models"))
    }

    /// Create model manager with custom directory
    pub fn with_dir(models_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&models_dir)
            .with_context(|| format!("Failed to create models directory {:?}", models_dir))?;
        Ok(Self { models_dir })
    }

    /// Configured directory if any, otherwise the default location
    pub fn from_settings(models_dir: Option<&Path>) -> Result<Self> {
        match models_dir {
            Some(dir) => Self::with_dir(dir.to_path_buf()),
            None => Self::new(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn model_path(&self, model_type: ModelType) -> PathBuf {
        self.models_dir.join(model_type.filename())
    }

    /// Present on disk with a plausible size
    pub fn is_model_available(&self, model_type: ModelType) -> bool {
        match std::fs::metadata(self.model_path(model_type)) {
            Ok(metadata) => {
                let (min, max) = model_type.expected_size_range();
                let size = metadata.len();
                size >= min && size <= max
            }
            Err(_) => false,
        }
    }

    pub fn are_models_ready(&self) -> bool {
        ModelType::ALL.iter().all(|&m| self.is_model_available(m))
    }

    pub fn model_status(&self) -> Vec<ModelStatus> {
        ModelType::ALL
            .iter()
            .map(|&model_type| {
                let path = self.model_path(model_type);
                let size_bytes = std::fs::metadata(&path).ok().map(|m| m.len());
                ModelStatus {
                    model_type,
                    available: self.is_model_available(model_type),
                    path,
                    size_bytes,
                }
            })
            .collect()
    }

    /// Path to a model, downloading it first when missing and `download` is set
    pub fn ensure_model(&self, model_type: ModelType, download: bool) -> Result<PathBuf> {
        let path = self.model_path(model_type);

        if self.is_model_available(model_type) {
            debug!("Model {:?} available at {:?}", model_type, path);
            return Ok(path);
        }

        if !download {
            anyhow::bail!(
                "{} not found at {:?}; run `coin-appraiser models --download` or fetch {}",
                model_type.display_name(),
                path,
                model_type.download_url()
            );
        }

        self.download_model(model_type)?;
        Ok(path)
    }

    /// Download every missing model
    pub fn ensure_all_models(&self) -> Result<()> {
        for model_type in ModelType::ALL {
            self.ensure_model(model_type, true)?;
        }
        Ok(())
    }

    /// Download a specific model, replacing any existing file
    pub fn download_model(&self, model_type: ModelType) -> Result<()> {
        let url = model_type.download_url();
        let path = self.model_path(model_type);

        if std::env::var_os(OFFLINE_ENV).is_some() {
            anyhow::bail!(
                "Offline mode: cannot download models. Please download manually from {} and place at {:?}",
                url,
                path
            );
        }

        info!("Downloading {} model from {}", model_type.display_name(), url);

        let rt = Runtime::new().context("Failed to create tokio runtime")?;
        let sha256 = rt.block_on(download_file_async(url, &path))?;

        if !self.is_model_available(model_type) {
            anyhow::bail!("Download completed but model verification failed");
        }

        self.update_manifest_for_model(model_type, sha256)?;

        info!("Successfully downloaded {} model", model_type.display_name());
        Ok(())
    }

    fn update_manifest_for_model(&self, model_type: ModelType, sha256: String) -> Result<()> {
        let mut manifest = self.load_manifest().unwrap_or_default();
        let metadata = std::fs::metadata(self.model_path(model_type))?;

        let model_info = ModelInfo {
            model_type: format!("{:?}", model_type),
            filename: model_type.filename().to_string(),
            size_bytes: metadata.len(),
            sha256,
            downloaded_at: unix_timestamp(),
        };

        if let Some(existing) = manifest
            .models
            .iter_mut()
            .find(|m| m.filename == model_info.filename)
        {
            *existing = model_info;
        } else {
            manifest.models.push(model_info);
        }

        self.save_manifest(&manifest)
    }

    pub fn load_manifest(&self) -> Result<ModelManifest> {
        let manifest_path = self.models_dir.join("manifest.json");
        if manifest_path.exists() {
            let content = std::fs::read_to_string(&manifest_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(ModelManifest::default())
        }
    }

    pub fn save_manifest(&self, manifest: &ModelManifest) -> Result<()> {
        let manifest_path = self.models_dir.join("manifest.json");
        std::fs::write(manifest_path, serde_json::to_string_pretty(manifest)?)?;
        Ok(())
    }
}

/// Stream `url` into `path` via a temp file. Returns the SHA-256 of the body.
async fn download_file_async(url: &str, path: &Path) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(600))
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to send download request")?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    let total_size = response.content_length();
    debug!("Download size: {:?} bytes", total_size);

    let temp_path = path.with_extension("part");
    let mut file = std::fs::File::create(&temp_path).context("Failed to create temp file")?;

    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Error reading download stream")?;
        file.write_all(&chunk).context("Failed to write to temp file")?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;
    }
    debug!("Downloaded {} bytes to {:?}", downloaded, path);

    file.flush().context("Failed to flush temp file")?;
    drop(file);

    std::fs::rename(&temp_path, path)
        .context("Failed to move downloaded file to final location")?;

    Ok(format!("{:x}", hasher.finalize()))
}

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// ONNX Runtime session wrapper
pub struct OnnxSession {
    session: Session,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl OnnxSession {
    /// Create a new ONNX session from a model file
    pub fn new(model_path: &Path) -> Result<Self> {
        info!("Loading ONNX model from {:?}", model_path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load ONNX model {:?}", model_path))?;

        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();

        info!(
            "Model loaded. Inputs: {:?}, Outputs: {:?}",
            input_names, output_names
        );

        Ok(Self {
            session,
            input_names,
            output_names,
        })
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.input_names.iter().any(|n| n == name)
    }

    /// First output whose name is in `preferred`, else the first output
    pub fn pick_output(&self, preferred: &[&str]) -> Option<String> {
        preferred
            .iter()
            .find_map(|p| self.output_names.iter().find(|n| n == p))
            .or_else(|| self.output_names.first())
            .cloned()
    }
}
