//! OCR (Optical Character Recognition) module
//!
//! Recognition is delegated to an engine behind the [`OcrEngine`] trait.
//! The default engine is Tesseract, reached through `leptess`.

use image::{GrayImage, ImageFormat};
use leptess::{LepTess, Variable};
use std::io::Cursor;
use std::path::PathBuf;
use tracing::debug;

/// Tesseract page segmentation mode: find as much sparse text as possible
pub const PSM_SPARSE_TEXT: u8 = 11;

/// Per-call recognition settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    /// Restrict output to these characters (`None` = unrestricted)
    pub char_whitelist: Option<String>,
    /// Page segmentation mode
    pub page_seg_mode: u8,
}

impl RecognitionConfig {
    /// Sparse text, digits only
    pub fn digits() -> Self {
        Self {
            char_whitelist: Some("0123456789".to_string()),
            ..Self::unrestricted()
        }
    }

    /// Sparse text, any character
    pub fn unrestricted() -> Self {
        Self {
            char_whitelist: None,
            page_seg_mode: PSM_SPARSE_TEXT,
        }
    }

    /// Tesseract variables to set before recognition
    fn variables(&self) -> Vec<(Variable, String)> {
        let mut vars = vec![(Variable::TesseditPagesegMode, self.page_seg_mode.to_string())];
        if let Some(whitelist) = &self.char_whitelist {
            vars.push((Variable::TesseditCharWhitelist, whitelist.clone()));
        }
        vars
    }
}

/// OCR failures
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("failed to initialize Tesseract: {0}")]
    Init(String),
    #[error("failed to encode OCR input: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Tesseract rejected the input image: {0}")]
    Image(String),
    #[error("failed to set Tesseract variable: {0}")]
    Variable(String),
    #[error("Tesseract returned invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// A text recognizer. Empty output is a legitimate result.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;
    fn recognize(&self, image: &GrayImage, config: &RecognitionConfig) -> Result<String, OcrError>;
}

/// Tesseract via `leptess`.
///
/// `LepTess` handles are not `Send`, so every call initializes its own.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    tessdata_dir: Option<PathBuf>,
    language: String,
}

impl TesseractOcr {
    /// `tessdata_dir = None` uses Tesseract's compiled-in data path
    pub fn new(tessdata_dir: Option<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            tessdata_dir,
            language: language.into(),
        }
    }

    fn open(&self) -> Result<LepTess, OcrError> {
        let data_path = match &self.tessdata_dir {
            Some(dir) => Some(dir.to_str().ok_or_else(|| {
                OcrError::Init(format!("tessdata path {:?} is not valid UTF-8", dir))
            })?),
            None => None,
        };
        LepTess::new(data_path, &self.language).map_err(|e| {
            OcrError::Init(format!("{:?} (language '{}', data {:?})", e, self.language, data_path))
        })
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new(None, "eng")
    }
}

impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &GrayImage, config: &RecognitionConfig) -> Result<String, OcrError> {
        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let mut tess = self.open()?;
        for (variable, value) in config.variables() {
            tess.set_variable(variable, &value)
                .map_err(|e| OcrError::Variable(format!("{:?} = {}", e, value)))?;
        }
        tess.set_image_from_mem(&png)
            .map_err(|e| OcrError::Image(format!("{:?}", e)))?;

        let text = tess.get_utf8_text()?;
        debug!("Tesseract ({}x{}) -> {:?}", image.width(), image.height(), text.trim());
        Ok(text)
    }
}
