//! Vision Layer
//!
//! Everything that looks at pixels: coin detection, cropping, OCR passes and
//! the CLIP-based zero-shot classifier.

pub mod classifier;
pub mod detection;
pub mod ensemble;
pub mod models;
pub mod ocr;
pub mod ocr_preprocess;
pub mod preprocess;
pub mod region;

use image::{DynamicImage, GenericImageView};
use tracing::debug;

pub use classifier::{
    ClassificationCandidate, ClassificationOutcome, ClipOnnxEmbedder, ImageTextEmbedder,
    LazyClipEmbedder, ZeroShotClassifier,
};
pub use detection::{DetectedRegion, RegionDetector};
pub use ensemble::{EnsembleResult, OcrEnsemble, OcrObservation, OcrPass, PassOutcome, PassSet};
pub use models::{ModelManager, ModelType, OnnxSession};
pub use ocr::{OcrEngine, OcrError, RecognitionConfig, TesseractOcr};
pub use region::extract_coin_region;

/// Image-level failures
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("image is empty")]
    EmptyImage,
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("region at ({x}, {y}) r={radius} lies outside the {width}x{height} image")]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        radius: u32,
        width: u32,
        height: u32,
    },
}

/// Decode raw image bytes (any format `image` recognizes)
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, VisionError> {
    if bytes.is_empty() {
        return Err(VisionError::EmptyImage);
    }

    let image = image::load_from_memory(bytes)?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(VisionError::EmptyImage);
    }

    debug!("Decoded {}x{} image ({} bytes)", width, height, bytes.len());
    Ok(image)
}
