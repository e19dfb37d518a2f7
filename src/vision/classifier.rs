//! Zero-shot coin classification
//!
//! A coin image is embedded next to the catalog prompts in CLIP's shared
//! image/text space. Cosine similarities, scaled by the logit temperature and
//! passed through a softmax over the whole catalog, rank the coin types.

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use ndarray::{Array2, ArrayViewD};
use ort::value::Value;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use super::models::{ModelManager, ModelType, OnnxSession};
use super::preprocess::{preprocess_for_clip, PreprocessConfig};
use crate::catalog::{CoinType, Denomination};
use crate::config::ClassifierSettings;

/// CLIP text context length
pub const CONTEXT_LENGTH: usize = 77;

/// Maps images and texts into one embedding space
pub trait ImageTextEmbedder: Send + Sync {
    fn embed_image(&self, image: &DynamicImage) -> Result<Vec<f32>>;
    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}

/// CLIP ViT-B/32 running on ONNX Runtime
pub struct ClipOnnxEmbedder {
    visual: Mutex<OnnxSession>,
    text: Mutex<OnnxSession>,
    tokenizer: Tokenizer,
    pad_id: u32,
    preprocess: PreprocessConfig,
}

impl ClipOnnxEmbedder {
    /// Load all three model files through the manager
    pub fn load(manager: &ModelManager, download: bool) -> Result<Self> {
        let visual = manager.ensure_model(ModelType::VisualEncoder, download)?;
        let text = manager.ensure_model(ModelType::TextEncoder, download)?;
        let tokenizer = manager.ensure_model(ModelType::Tokenizer, download)?;
        Self::from_files(&visual, &text, &tokenizer)
    }

    pub fn from_files(visual_path: &Path, text_path: &Path, tokenizer_path: &Path) -> Result<Self> {
        let visual = OnnxSession::new(visual_path)?;
        let text = OnnxSession::new(text_path)?;
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer {:?}: {}", tokenizer_path, e))?;
        let pad_id = tokenizer.token_to_id("<|endoftext|>").unwrap_or(0);

        Ok(Self {
            visual: Mutex::new(visual),
            text: Mutex::new(text),
            tokenizer,
            pad_id,
            preprocess: PreprocessConfig::default(),
        })
    }

    /// Token ids and attention mask, truncated or padded to the context length
    fn tokenize(&self, texts: &[&str]) -> Result<(Array2<i64>, Array2<i64>)> {
        let mut ids = Vec::with_capacity(texts.len() * CONTEXT_LENGTH);
        let mut mask = Vec::with_capacity(texts.len() * CONTEXT_LENGTH);

        for text in texts {
            let encoding = self
                .tokenizer
                .encode(*text, true)
                .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
            let tokens = encoding.get_ids();
            let used = tokens.len().min(CONTEXT_LENGTH);

            ids.extend(tokens[..used].iter().map(|&id| id as i64));
            ids.extend(std::iter::repeat(self.pad_id as i64).take(CONTEXT_LENGTH - used));
            mask.extend(std::iter::repeat(1i64).take(used));
            mask.extend(std::iter::repeat(0i64).take(CONTEXT_LENGTH - used));
        }

        let shape = (texts.len(), CONTEXT_LENGTH);
        Ok((
            Array2::from_shape_vec(shape, ids).context("Failed to create input_ids array")?,
            Array2::from_shape_vec(shape, mask).context("Failed to create attention_mask array")?,
        ))
    }
}

/// Rows of a `[batch, dim]` output tensor
fn embedding_rows(output: ArrayViewD<'_, f32>) -> Result<Vec<Vec<f32>>> {
    if output.ndim() != 2 {
        anyhow::bail!("Unexpected embedding shape {:?} (expected [batch, dim])", output.shape());
    }
    Ok(output
        .outer_iter()
        .map(|row| row.iter().copied().collect())
        .collect())
}

impl ImageTextEmbedder for ClipOnnxEmbedder {
    fn embed_image(&self, image: &DynamicImage) -> Result<Vec<f32>> {
        let tensor = preprocess_for_clip(image, &self.preprocess);

        let mut visual = self.visual.lock();
        let input_name = visual
            .input_names()
            .first()
            .cloned()
            .unwrap_or_else(|| "pixel_values".to_string());
        let output_name = visual
            .pick_output(&["image_embeds"])
            .context("Visual encoder has no outputs")?;

        let outputs = visual
            .session_mut()
            .run(ort::inputs![input_name => Value::from_array(tensor)?])?;
        let array = outputs[output_name.as_str()]
            .try_extract_array::<f32>()
            .context("Failed to extract image embedding")?;

        embedding_rows(array)?
            .into_iter()
            .next()
            .context("Visual encoder returned an empty batch")
    }

    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let (input_ids, attention_mask) = self.tokenize(texts)?;

        let mut text = self.text.lock();
        let output_name = text
            .pick_output(&["text_embeds"])
            .context("Text encoder has no outputs")?;
        let with_mask = text.has_input("attention_mask");

        let outputs = if with_mask {
            text.session_mut().run(ort::inputs![
                "input_ids" => Value::from_array(input_ids)?,
                "attention_mask" => Value::from_array(attention_mask)?
            ])?
        } else {
            text.session_mut()
                .run(ort::inputs!["input_ids" => Value::from_array(input_ids)?])?
        };
        let array = outputs[output_name.as_str()]
            .try_extract_array::<f32>()
            .context("Failed to extract text embeddings")?;

        embedding_rows(array)
    }
}

/// Loads [`ClipOnnxEmbedder`] on first use, once per process.
///
/// A failed load is remembered; later calls report the same error.
pub struct LazyClipEmbedder {
    models_dir: Option<PathBuf>,
    auto_download: bool,
    inner: OnceLock<Result<ClipOnnxEmbedder, String>>,
}

impl LazyClipEmbedder {
    pub fn new(settings: &ClassifierSettings) -> Self {
        Self {
            models_dir: settings.models_dir.clone(),
            auto_download: settings.auto_download,
            inner: OnceLock::new(),
        }
    }

    fn get(&self) -> Result<&ClipOnnxEmbedder> {
        let loaded = self.inner.get_or_init(|| {
            let start = Instant::now();
            let result = ModelManager::from_settings(self.models_dir.as_deref())
                .and_then(|manager| ClipOnnxEmbedder::load(&manager, self.auto_download));
            match result {
                Ok(embedder) => {
                    info!("CLIP model ready in {:?}", start.elapsed());
                    Ok(embedder)
                }
                Err(e) => {
                    warn!("CLIP model unavailable: {:#}", e);
                    Err(format!("{:#}", e))
                }
            }
        });

        loaded.as_ref().map_err(|e| anyhow!("CLIP model unavailable: {}", e))
    }
}

impl ImageTextEmbedder for LazyClipEmbedder {
    fn embed_image(&self, image: &DynamicImage) -> Result<Vec<f32>> {
        self.get()?.embed_image(image)
    }

    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.get()?.embed_texts(texts)
    }
}

/// One ranked coin type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationCandidate {
    pub coin_type: CoinType,
    /// Softmax probability, rounded to 4 places
    pub confidence: f64,
    pub denomination: Denomination,
    pub estimated_value: f64,
    /// 1 = best
    pub rank: usize,
}

/// Result of classifying one image
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationOutcome {
    /// Candidates ordered best first, never empty
    Success { candidates: Vec<ClassificationCandidate> },
    Failure { error: String },
}

impl ClassificationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ClassificationOutcome::Success { .. })
    }

    pub fn top(&self) -> Option<&ClassificationCandidate> {
        match self {
            ClassificationOutcome::Success { candidates } => candidates.first(),
            ClassificationOutcome::Failure { .. } => None,
        }
    }

    /// Runner-up candidates
    pub fn alternatives(&self) -> &[ClassificationCandidate] {
        match self {
            ClassificationOutcome::Success { candidates } if !candidates.is_empty() => {
                &candidates[1..]
            }
            _ => &[],
        }
    }

    /// Winning confidence, 0.0 on failure
    pub fn confidence(&self) -> f64 {
        self.top().map_or(0.0, |c| c.confidence)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ClassificationOutcome::Failure { error } => Some(error),
            ClassificationOutcome::Success { .. } => None,
        }
    }
}

/// Catalog classifier over any [`ImageTextEmbedder`]
pub struct ZeroShotClassifier {
    embedder: Arc<dyn ImageTextEmbedder>,
    logit_scale: f32,
    top_k: usize,
    catalog_embeddings: OnceLock<Result<Vec<Vec<f32>>, String>>,
}

impl ZeroShotClassifier {
    pub fn new(embedder: Arc<dyn ImageTextEmbedder>, settings: &ClassifierSettings) -> Self {
        Self {
            embedder,
            logit_scale: settings.logit_scale,
            top_k: settings.top_k.max(1),
            catalog_embeddings: OnceLock::new(),
        }
    }

    /// Classify an image. Never panics; errors become [`ClassificationOutcome::Failure`].
    pub fn classify(&self, image: &DynamicImage) -> ClassificationOutcome {
        match self.rank(image) {
            Ok(candidates) => {
                if let Some(top) = candidates.first() {
                    debug!("Classified as {} ({:.4})", top.coin_type, top.confidence);
                }
                ClassificationOutcome::Success { candidates }
            }
            Err(e) => {
                warn!("Classification failed: {:#}", e);
                ClassificationOutcome::Failure {
                    error: format!("{:#}", e),
                }
            }
        }
    }

    /// Normalized prompt embeddings, computed on first use
    fn catalog(&self) -> Result<&[Vec<f32>]> {
        let cached = self.catalog_embeddings.get_or_init(|| {
            let prompts = CoinType::descriptions();
            match self.embedder.embed_texts(&prompts) {
                Ok(embeddings) if embeddings.iter().flatten().any(|x| !x.is_finite()) => {
                    Err("prompt embeddings contain non-finite values".to_string())
                }
                Ok(embeddings) if embeddings.len() == prompts.len() => {
                    debug!("Embedded {} catalog prompts", embeddings.len());
                    Ok(embeddings.into_iter().map(l2_normalize).collect())
                }
                Ok(embeddings) => Err(format!(
                    "expected {} prompt embeddings, got {}",
                    prompts.len(),
                    embeddings.len()
                )),
                Err(e) => Err(format!("{:#}", e)),
            }
        });

        cached
            .as_deref()
            .map_err(|e| anyhow!("catalog embeddings unavailable: {}", e))
    }

    fn rank(&self, image: &DynamicImage) -> Result<Vec<ClassificationCandidate>> {
        let catalog = self.catalog()?;
        let image_embedding = self.embedder.embed_image(image)?;
        if image_embedding.iter().any(|x| !x.is_finite()) {
            anyhow::bail!("image embedding contains non-finite values");
        }
        let image_embedding = l2_normalize(image_embedding);

        let logits = catalog
            .iter()
            .map(|text| {
                if text.len() != image_embedding.len() {
                    anyhow::bail!(
                        "embedding size mismatch: image {} vs text {}",
                        image_embedding.len(),
                        text.len()
                    );
                }
                Ok(dot(&image_embedding, text) * self.logit_scale)
            })
            .collect::<Result<Vec<f32>>>()?;

        let probabilities = softmax(&logits);
        if probabilities.iter().any(|p| !p.is_finite()) {
            anyhow::bail!("similarity scores are not finite");
        }
        let mut order: Vec<usize> = (0..probabilities.len()).collect();
        order.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));

        Ok(order
            .into_iter()
            .take(self.top_k)
            .enumerate()
            .map(|(i, idx)| {
                let coin_type = CoinType::ALL[idx];
                ClassificationCandidate {
                    coin_type,
                    confidence: round4(probabilities[idx] as f64),
                    denomination: coin_type.denomination(),
                    estimated_value: coin_type.base_value(),
                    rank: i + 1,
                }
            })
            .collect())
    }
}

fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
