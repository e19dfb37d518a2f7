//! OCR ensemble
//!
//! Runs several independently preprocessed recognition passes over one coin
//! and joins whatever text they produce. A pass that fails or reads nothing
//! is logged and skipped; it never takes its siblings down with it.

use image::{DynamicImage, GenericImageView, GrayImage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use super::ocr::{OcrEngine, RecognitionConfig};
use super::ocr_preprocess::{adaptive_gaussian_threshold, clahe, otsu_binarize, upscale};
use crate::config::OcrSettings;

/// One preprocessing + recognition combination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrPass {
    /// Otsu threshold, digits only
    OtsuDigits,
    /// Inverted Otsu threshold, digits only
    InvertedOtsuDigits,
    /// CLAHE, then Otsu, digits only
    ClaheDigits,
    /// Adaptive Gaussian threshold, any character
    AdaptiveFullText,
    /// Adaptive Gaussian threshold, digits only
    AdaptiveDigits,
    /// Upscaled grayscale as is, any character
    RawFullText,
}

impl OcrPass {
    pub fn method_id(&self) -> &'static str {
        match self {
            OcrPass::OtsuDigits => "otsu_digits",
            OcrPass::InvertedOtsuDigits => "inverted_otsu_digits",
            OcrPass::ClaheDigits => "clahe_digits",
            OcrPass::AdaptiveFullText => "adaptive_text",
            OcrPass::AdaptiveDigits => "adaptive_digits",
            OcrPass::RawFullText => "raw_text",
        }
    }

    pub fn recognition(&self) -> RecognitionConfig {
        match self {
            OcrPass::AdaptiveFullText | OcrPass::RawFullText => RecognitionConfig::unrestricted(),
            _ => RecognitionConfig::digits(),
        }
    }

    /// Apply this pass's filter to the upscaled grayscale coin
    pub fn prepare(&self, upscaled: &GrayImage, settings: &OcrSettings) -> GrayImage {
        match self {
            OcrPass::OtsuDigits => otsu_binarize(upscaled, false),
            OcrPass::InvertedOtsuDigits => otsu_binarize(upscaled, true),
            OcrPass::ClaheDigits => {
                let equalized = clahe(upscaled, settings.clahe_clip_limit, settings.clahe_tile_grid);
                otsu_binarize(&equalized, false)
            }
            OcrPass::AdaptiveFullText | OcrPass::AdaptiveDigits => adaptive_gaussian_threshold(
                upscaled,
                settings.adaptive_block_size,
                settings.adaptive_offset,
            ),
            OcrPass::RawFullText => upscaled.clone(),
        }
    }
}

/// Which passes to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassSet {
    /// Per detected region in a multi-coin photo
    Region,
    /// Whole photo treated as a single coin
    SingleCoin,
}

impl PassSet {
    pub fn passes(&self) -> &'static [OcrPass] {
        match self {
            PassSet::Region => &[
                OcrPass::OtsuDigits,
                OcrPass::InvertedOtsuDigits,
                OcrPass::ClaheDigits,
                OcrPass::AdaptiveFullText,
            ],
            PassSet::SingleCoin => &[
                OcrPass::OtsuDigits,
                OcrPass::InvertedOtsuDigits,
                OcrPass::AdaptiveDigits,
                OcrPass::ClaheDigits,
                OcrPass::RawFullText,
            ],
        }
    }
}

/// Text read by one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrObservation {
    pub method_id: &'static str,
    pub raw_text: String,
}

/// What happened to a single pass
#[derive(Debug, Clone)]
pub enum PassOutcome {
    Observed(OcrObservation),
    Empty(OcrPass),
    Failed { pass: OcrPass, error: String },
}

/// Outcomes of every pass, in pass order
#[derive(Debug, Clone, Default)]
pub struct EnsembleResult {
    pub outcomes: Vec<PassOutcome>,
}

impl EnsembleResult {
    pub fn observations(&self) -> impl Iterator<Item = &OcrObservation> {
        self.outcomes.iter().filter_map(|o| match o {
            PassOutcome::Observed(obs) => Some(obs),
            _ => None,
        })
    }

    /// Non-empty pass outputs joined with a space, in pass order
    pub fn combined_text(&self) -> String {
        self.observations()
            .map(|obs| obs.raw_text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, PassOutcome::Failed { .. }))
            .count()
    }
}

/// Runs a pass set against one OCR engine
pub struct OcrEnsemble {
    engine: Arc<dyn OcrEngine>,
    settings: OcrSettings,
}

impl OcrEnsemble {
    pub fn new(engine: Arc<dyn OcrEngine>, settings: OcrSettings) -> Self {
        Self { engine, settings }
    }

    /// Run every pass of `set` over a coin image.
    ///
    /// Passes run concurrently on scoped threads; outcomes keep pass order.
    pub fn run(&self, coin: &DynamicImage, set: PassSet) -> EnsembleResult {
        let (width, height) = coin.dimensions();
        if width == 0 || height == 0 {
            warn!("Skipping OCR on empty coin image");
            return EnsembleResult::default();
        }

        let start = Instant::now();
        let upscaled = upscale(&coin.to_luma8(), self.settings.upscale_factor);
        let input = &upscaled;

        let outcomes: Vec<PassOutcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = set
                .passes()
                .iter()
                .map(|&pass| (pass, scope.spawn(move || self.run_pass(pass, input))))
                .collect();

            handles
                .into_iter()
                .map(|(pass, handle)| {
                    handle.join().unwrap_or_else(|_| PassOutcome::Failed {
                        pass,
                        error: "OCR pass panicked".to_string(),
                    })
                })
                .collect()
        });

        let result = EnsembleResult { outcomes };
        debug!(
            "OCR ensemble ({:?}, {}): {} observations, {} failures in {:?}",
            set,
            self.engine.name(),
            result.observations().count(),
            result.failures(),
            start.elapsed()
        );
        result
    }

    fn run_pass(&self, pass: OcrPass, upscaled: &GrayImage) -> PassOutcome {
        let prepared = pass.prepare(upscaled, &self.settings);

        match self.engine.recognize(&prepared, &pass.recognition()) {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    debug!("OCR pass {} read nothing", pass.method_id());
                    PassOutcome::Empty(pass)
                } else {
                    debug!("OCR pass {} read {:?}", pass.method_id(), text);
                    PassOutcome::Observed(OcrObservation {
                        method_id: pass.method_id(),
                        raw_text: text.to_string(),
                    })
                }
            }
            Err(e) => {
                warn!("OCR pass {} ({}) failed: {}", pass.method_id(), self.engine.name(), e);
                PassOutcome::Failed {
                    pass,
                    error: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::ocr::OcrError;
    use image::Luma;

    /// Answers by whitelist: digit passes get `digits`, text passes get `text`
    struct ScriptedOcr {
        digits: &'static str,
        text: Option<&'static str>,
    }

    impl OcrEngine for ScriptedOcr {
        fn name(&self) -> &str {
            "scripted"
        }

        fn recognize(&self, _image: &GrayImage, config: &RecognitionConfig) -> Result<String, OcrError> {
            match (&config.char_whitelist, self.text) {
                (Some(_), _) => Ok(self.digits.to_string()),
                (None, Some(text)) => Ok(text.to_string()),
                (None, None) => Err(OcrError::Init("boom".to_string())),
            }
        }
    }

    fn coin() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(20, 20, |x, y| Luma([((x + y) * 6) as u8])))
    }

    fn ensemble(engine: ScriptedOcr) -> OcrEnsemble {
        OcrEnsemble::new(Arc::new(engine), OcrSettings::default())
    }

    #[test]
    fn test_region_pass_order() {
        let ids: Vec<_> = PassSet::Region.passes().iter().map(|p| p.method_id()).collect();
        assert_eq!(
            ids,
            ["otsu_digits", "inverted_otsu_digits", "clahe_digits", "adaptive_text"]
        );
    }

    #[test]
    fn test_single_coin_pass_order() {
        let passes = PassSet::SingleCoin.passes();
        assert_eq!(passes.len(), 5);
        assert_eq!(passes[2], OcrPass::AdaptiveDigits);
        assert_eq!(passes[4], OcrPass::RawFullText);
        assert!(passes[4].recognition().char_whitelist.is_none());
    }

    #[test]
    fn test_combined_text_in_pass_order() {
        let result = ensemble(ScriptedOcr {
            digits: " 1921\n",
            text: Some("LIBERTY"),
        })
        .run(&coin(), PassSet::Region);

        assert_eq!(result.combined_text(), "1921 1921 1921 LIBERTY");
    }

    #[test]
    fn test_failed_pass_is_isolated() {
        let result = ensemble(ScriptedOcr {
            digits: "1878",
            text: None,
        })
        .run(&coin(), PassSet::SingleCoin);

        assert_eq!(result.failures(), 1);
        assert_eq!(result.combined_text(), "1878 1878 1878 1878");
    }

    #[test]
    fn test_empty_passes_are_skipped() {
        let result = ensemble(ScriptedOcr {
            digits: "   ",
            text: Some("WE TRUST"),
        })
        .run(&coin(), PassSet::Region);

        assert_eq!(result.combined_text(), "WE TRUST");
        assert!(matches!(result.outcomes[0], PassOutcome::Empty(OcrPass::OtsuDigits)));
    }

    #[test]
    fn test_prepare_keeps_dimensions() {
        let settings = OcrSettings::default();
        let gray = upscale(&coin().to_luma8(), settings.upscale_factor);
        for pass in PassSet::SingleCoin.passes() {
            assert_eq!(pass.prepare(&gray, &settings).dimensions(), (60, 60));
        }
    }
}
