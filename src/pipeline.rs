//! Coin appraisal pipeline
//!
//! Wires detection, cropping, the OCR ensemble, year resolution, the
//! zero-shot classifier and result fusion into the two entry points:
//! [`CoinPipeline::analyze`] for multi-coin photos and
//! [`CoinPipeline::identify`] for a photo of a single coin.

use image::{DynamicImage, GenericImageView};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::report::{
    AnalysisReport, CoinRecord, FailureReport, IdentificationReport, ImageSize, Position, Response,
};
use crate::valuation::{Identification, IdentificationMethod, ResultFusion, YearResolver};
use crate::vision::{
    decode_image, extract_coin_region, ClassificationOutcome, DetectedRegion, ImageTextEmbedder,
    LazyClipEmbedder,
    OcrEngine, OcrEnsemble, PassSet, RegionDetector, TesseractOcr, VisionError, ZeroShotClassifier,
};

/// Request-level failures
#[derive(Debug, thiserror::Error)]
pub enum AppraisalError {
    #[error(transparent)]
    Vision(#[from] VisionError),
}

/// The full detection and identification pipeline
pub struct CoinPipeline {
    detector: RegionDetector,
    ensemble: OcrEnsemble,
    classifier: Option<ZeroShotClassifier>,
    years: YearResolver,
    fusion: ResultFusion,
    padding_ratio: f32,
}

impl CoinPipeline {
    /// Pipeline over explicit collaborators. `embedder = None` disables the
    /// visual classifier; every coin then goes through the keyword fallback.
    pub fn new(
        config: &AppConfig,
        ocr: Arc<dyn OcrEngine>,
        embedder: Option<Arc<dyn ImageTextEmbedder>>,
    ) -> Self {
        Self {
            detector: RegionDetector::with_config(config.detection.clone()),
            ensemble: OcrEnsemble::new(ocr, config.ocr.clone()),
            classifier: embedder.map(|e| ZeroShotClassifier::new(e, &config.classifier)),
            years: YearResolver::new(),
            fusion: ResultFusion::new(&config.valuation),
            padding_ratio: config.detection.padding_ratio,
        }
    }

    /// Tesseract for OCR and, when enabled, a lazily loaded CLIP model
    pub fn from_config(config: &AppConfig) -> Self {
        let ocr = Arc::new(TesseractOcr::new(
            config.ocr.tessdata_dir.clone(),
            config.ocr.language.clone(),
        ));
        let embedder: Option<Arc<dyn ImageTextEmbedder>> = if config.classifier.enabled {
            Some(Arc::new(LazyClipEmbedder::new(&config.classifier)))
        } else {
            info!("Visual classifier disabled, using OCR keywords only");
            None
        };
        Self::new(config, ocr, embedder)
    }

    /// Detect and appraise every coin in a photo
    pub fn analyze(&self, bytes: &[u8]) -> Result<AnalysisReport, AppraisalError> {
        let start = Instant::now();
        let image = decode_image(bytes)?;
        let (width, height) = image.dimensions();

        let regions = self.detector.detect(&image);
        info!("Analyzing {} coin regions", regions.len());

        let coins: Vec<CoinRecord> = regions
            .iter()
            .enumerate()
            .map(|(id, region)| self.appraise_region(id, &image, region))
            .collect();

        let report = AnalysisReport::new(ImageSize { width, height }, coins);
        info!(
            "Analysis complete: {} coins, ${:.2} total ({:?})",
            report.total_coins,
            report.estimated_total_value,
            start.elapsed()
        );
        Ok(report)
    }

    /// Treat the whole photo as one coin and identify it in detail
    pub fn identify(&self, bytes: &[u8]) -> Result<IdentificationReport, AppraisalError> {
        let start = Instant::now();
        let image = decode_image(bytes)?;
        let (width, height) = image.dimensions();

        let (identification, classification) = self.identify_coin(&image, PassSet::SingleCoin);

        let position = Position {
            x: width / 2,
            y: height / 2,
            radius: width.min(height) / 2,
        };
        let notes = match identification.method {
            IdentificationMethod::ClipZeroShot => format!(
                "Identified using CLIP ML model with {:.1}% confidence",
                classification.as_ref().map_or(0.0, |c| c.confidence()) * 100.0
            ),
            IdentificationMethod::OcrKeywords => format!(
                "Identified from OCR keywords with {:.1}% confidence",
                identification.confidence * 100.0
            ),
        };
        let coin = CoinRecord::new(0, position, &identification).with_notes(notes);
        let classifier_error = classification
            .as_ref()
            .and_then(|c| c.error())
            .map(str::to_string);

        info!(
            "Identified {} ({:?}) in {:?}",
            identification.coin_type,
            identification.year,
            start.elapsed()
        );
        Ok(IdentificationReport::new(coin, &identification, classifier_error))
    }

    /// [`Self::analyze`] with failures folded into a failure document
    pub fn analyze_response(&self, bytes: &[u8]) -> Response<AnalysisReport> {
        into_response(self.analyze(bytes), "Analysis")
    }

    /// [`Self::identify`] with failures folded into a failure document
    pub fn identify_response(&self, bytes: &[u8]) -> Response<IdentificationReport> {
        into_response(self.identify(bytes), "Identification")
    }

    /// One record per region; a crop failure yields an unknown coin with a note
    fn appraise_region(&self, id: usize, image: &DynamicImage, region: &DetectedRegion) -> CoinRecord {
        let position = Position::from(*region);
        match extract_coin_region(image, region, self.padding_ratio) {
            Ok(coin) => {
                let (identification, _) = self.identify_coin(&coin, PassSet::Region);
                CoinRecord::new(id, position, &identification)
            }
            Err(e) => {
                warn!("Coin {}: {}", id, e);
                let identification = self.fusion.fuse(None, "", None);
                CoinRecord::new(id, position, &identification)
                    .with_notes(format!("Region extraction failed: {}", e))
            }
        }
    }

    fn identify_coin(
        &self,
        coin: &DynamicImage,
        passes: PassSet,
    ) -> (Identification, Option<ClassificationOutcome>) {
        let classification = self.classifier.as_ref().map(|c| c.classify(coin));

        let ocr = self.ensemble.run(coin, passes);
        let text = ocr.combined_text();
        let year = self.years.resolve(&text);
        if year.is_none() && !text.is_empty() {
            warn!("No year found in OCR text {:?}", text);
        }

        let identification = self.fusion.fuse(classification.as_ref(), &text, year);
        (identification, classification)
    }
}

fn into_response<T>(result: Result<T, AppraisalError>, what: &str) -> Response<T> {
    match result {
        Ok(report) => Response::Success(report),
        Err(e) => {
            error!("{} failed: {}", what, e);
            Response::Failure(FailureReport::new(format!("{} failed: {}", what, e)))
        }
    }
}
