//! Result fusion
//!
//! Merges the classifier outcome, the resolved year and the OCR text into one
//! identification. When the classifier has nothing to offer, coin-name
//! keywords in the OCR text decide instead.

use serde::Serialize;
use tracing::debug;

use super::metals::silver_melt_value;
use crate::catalog::Denomination;
use crate::config::ValuationSettings;
use crate::vision::classifier::{ClassificationCandidate, ClassificationOutcome};

/// First year of clad (non-silver) circulating coinage
pub const CLAD_TRANSITION_YEAR: u16 = 1965;

/// Upper bound on any reported confidence
pub const MAX_CONFIDENCE: f64 = 0.95;

const DOLLAR_FLOOR_USD: f64 = 30.00;
const FRACTIONAL_SILVER_FLOOR_USD: f64 = 5.00;

const SILVER_COMPOSITION: &str = "90% Silver, 10% Copper";
const CLAD_COMPOSITION: &str = "Copper-Nickel Clad";

/// Where the coin type came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentificationMethod {
    ClipZeroShot,
    OcrKeywords,
}

impl IdentificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentificationMethod::ClipZeroShot => "CLIP Zero-Shot Classification",
            IdentificationMethod::OcrKeywords => "OCR Keyword Fallback",
        }
    }
}

impl Serialize for IdentificationMethod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Metal composition implied by the mint year
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Composition {
    pub description: &'static str,
    pub silver_content: bool,
}

/// Fused identification of one coin
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub coin_type: String,
    pub denomination: Denomination,
    /// Value before any year floor
    pub base_value: f64,
    /// Rounded to cents, never negative
    pub estimated_value: f64,
    /// Rounded to 2 places, at most [`MAX_CONFIDENCE`]
    pub confidence: f64,
    pub year: Option<u16>,
    pub composition: Option<Composition>,
    pub melt_value: Option<f64>,
    pub method: IdentificationMethod,
    pub alternatives: Vec<ClassificationCandidate>,
}

/// Fixed answer for an OCR keyword hit
struct KeywordRule {
    coin_type: &'static str,
    denomination: Denomination,
    value: f64,
    confidence: f64,
    matches: fn(&str) -> bool,
}

/// Checked in order; the first hit wins
const KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule {
        coin_type: "Morgan Dollar",
        denomination: Denomination::Dollar,
        value: 25.00,
        confidence: 0.60,
        matches: |t| t.contains("morgan") || (t.contains("liberty") && t.contains("dollar")),
    },
    KeywordRule {
        coin_type: "Peace Dollar",
        denomination: Denomination::Dollar,
        value: 25.00,
        confidence: 0.60,
        matches: |t| t.contains("peace") && t.contains("dollar"),
    },
    KeywordRule {
        coin_type: "Washington Quarter",
        denomination: Denomination::Quarter,
        value: 0.25,
        confidence: 0.55,
        matches: |t| t.contains("washington"),
    },
    KeywordRule {
        coin_type: "Kennedy Half Dollar",
        denomination: Denomination::HalfDollar,
        value: 0.50,
        confidence: 0.55,
        matches: |t| t.contains("kennedy"),
    },
    KeywordRule {
        coin_type: "Liberty Coin",
        denomination: Denomination::Unknown,
        value: 5.00,
        confidence: 0.50,
        matches: |t| t.contains("liberty"),
    },
];

const UNKNOWN_COIN: &str = "Unknown Coin";
const UNKNOWN_CONFIDENCE: f64 = 0.50;

/// Combines classifier, year and OCR signals
#[derive(Debug, Clone, Default)]
pub struct ResultFusion {
    silver_spot_usd: Option<f64>,
}

impl ResultFusion {
    pub fn new(settings: &ValuationSettings) -> Self {
        Self {
            silver_spot_usd: settings.silver_spot_usd,
        }
    }

    /// Fuse one coin's signals.
    ///
    /// `classification` is `None` when the classifier is disabled; a
    /// [`ClassificationOutcome::Failure`] is treated the same way.
    pub fn fuse(
        &self,
        classification: Option<&ClassificationOutcome>,
        ocr_text: &str,
        year: Option<u16>,
    ) -> Identification {
        let (coin_type, denomination, base_value, confidence, method, alternatives) =
            match classification.and_then(|c| c.top().map(|top| (top, c.alternatives()))) {
                Some((top, alternatives)) => (
                    top.coin_type.display_name(),
                    top.denomination,
                    top.estimated_value,
                    top.confidence,
                    IdentificationMethod::ClipZeroShot,
                    alternatives.to_vec(),
                ),
                None => {
                    let (coin_type, denomination, value, confidence) = keyword_fallback(ocr_text);
                    (
                        coin_type.to_string(),
                        denomination,
                        value,
                        confidence,
                        IdentificationMethod::OcrKeywords,
                        Vec::new(),
                    )
                }
            };

        let mut estimated_value = base_value;
        if let Some(year) = year {
            estimated_value = apply_year_floor(estimated_value, &coin_type, denomination, year);
        }

        let composition = year.and_then(|y| composition_for(&coin_type, y));
        let melt_value = match (composition, self.silver_spot_usd) {
            (Some(c), Some(spot)) if c.silver_content => silver_melt_value(denomination, spot),
            _ => None,
        };

        debug!(
            "Fused {} ({}) year={:?} value={:.2} via {}",
            coin_type,
            denomination,
            year,
            estimated_value,
            method.as_str()
        );

        Identification {
            coin_type,
            denomination,
            base_value,
            estimated_value: round2(finite_or_zero(estimated_value).max(0.0)),
            confidence: round2(finite_or_zero(confidence).clamp(0.0, MAX_CONFIDENCE)),
            year,
            composition,
            melt_value,
            method,
            alternatives,
        }
    }
}

/// Keyword match over lower-cased OCR text
fn keyword_fallback(ocr_text: &str) -> (&'static str, Denomination, f64, f64) {
    let text = ocr_text.to_lowercase();
    KEYWORD_RULES
        .iter()
        .find(|rule| (rule.matches)(&text))
        .map(|rule| (rule.coin_type, rule.denomination, rule.value, rule.confidence))
        .unwrap_or((UNKNOWN_COIN, Denomination::Unknown, 0.0, UNKNOWN_CONFIDENCE))
}

/// Pre-1965 silver coinage is worth at least its floor
pub fn apply_year_floor(value: f64, coin_type: &str, denomination: Denomination, year: u16) -> f64 {
    if year >= CLAD_TRANSITION_YEAR {
        return value;
    }
    if coin_type.to_lowercase().contains("dollar") {
        value.max(DOLLAR_FLOOR_USD)
    } else if denomination.has_silver_floor() {
        value.max(FRACTIONAL_SILVER_FLOOR_USD)
    } else {
        value
    }
}

/// Composition implied by the year; `None` for pre-1965 types that were
/// never struck in 90% silver
pub fn composition_for(coin_type: &str, year: u16) -> Option<Composition> {
    if year >= CLAD_TRANSITION_YEAR {
        return Some(Composition {
            description: CLAD_COMPOSITION,
            silver_content: false,
        });
    }

    let name = coin_type.to_lowercase();
    ["dollar", "half", "quarter", "dime"]
        .iter()
        .any(|kind| name.contains(kind))
        .then_some(Composition {
            description: SILVER_COMPOSITION,
            silver_content: true,
        })
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CoinType;

    fn candidate(coin_type: CoinType, confidence: f64, rank: usize) -> ClassificationCandidate {
        ClassificationCandidate {
            coin_type,
            confidence,
            denomination: coin_type.denomination(),
            estimated_value: coin_type.base_value(),
            rank,
        }
    }

    fn success(types: &[(CoinType, f64)]) -> ClassificationOutcome {
        ClassificationOutcome::Success {
            candidates: types
                .iter()
                .enumerate()
                .map(|(i, &(t, c))| candidate(t, c, i + 1))
                .collect(),
        }
    }

    fn fusion() -> ResultFusion {
        ResultFusion::default()
    }

    #[test]
    fn test_primary_path_uses_top_candidate() {
        let outcome = success(&[
            (CoinType::WalkingLibertyHalf, 0.8123),
            (CoinType::FranklinHalf, 0.1),
            (CoinType::KennedyHalf, 0.05),
        ]);
        let id = fusion().fuse(Some(&outcome), "", None);

        assert_eq!(id.coin_type, "Walking Liberty Half");
        assert_eq!(id.denomination, Denomination::HalfDollar);
        assert_eq!(id.estimated_value, 15.0);
        assert_eq!(id.confidence, 0.81);
        assert_eq!(id.method, IdentificationMethod::ClipZeroShot);
        assert_eq!(id.alternatives.len(), 2);
        assert!(id.composition.is_none());
    }

    #[test]
    fn test_confidence_capped() {
        let outcome = success(&[(CoinType::LincolnCent, 0.9987)]);
        let id = fusion().fuse(Some(&outcome), "", None);
        assert_eq!(id.confidence, 0.95);
    }

    #[test]
    fn test_non_finite_scores_become_zero() {
        let mut outcome = success(&[(CoinType::MorganDollar, f64::NAN)]);
        if let ClassificationOutcome::Success { candidates } = &mut outcome {
            candidates[0].estimated_value = f64::INFINITY;
        }
        let id = fusion().fuse(Some(&outcome), "", None);

        assert_eq!(id.confidence, 0.0);
        assert_eq!(id.estimated_value, 0.0);
        assert_eq!(id.coin_type, "Morgan Dollar");
    }

    #[test]
    fn test_dollar_floor_1921() {
        let outcome = success(&[(CoinType::PeaceDollar, 0.7)]);
        let id = fusion().fuse(Some(&outcome), "1921", Some(1921));
        assert!(id.estimated_value >= 30.0);
        assert_eq!(id.base_value, 25.0);
    }

    #[test]
    fn test_quarter_floor_1950() {
        let outcome = success(&[(CoinType::WashingtonQuarter, 0.7)]);
        let id = fusion().fuse(Some(&outcome), "", Some(1950));
        assert_eq!(id.estimated_value, 5.0);

        let clad = fusion().fuse(Some(&outcome), "", Some(1970));
        assert_eq!(clad.estimated_value, 5.0);

        let cheap = success(&[(CoinType::StateQuarter, 0.7)]);
        assert_eq!(fusion().fuse(Some(&cheap), "", Some(1950)).estimated_value, 5.0);
        assert_eq!(fusion().fuse(Some(&cheap), "", Some(1999)).estimated_value, 0.5);
    }

    #[test]
    fn test_cent_has_no_floor() {
        let outcome = success(&[(CoinType::WheatCent, 0.6)]);
        let id = fusion().fuse(Some(&outcome), "", Some(1944));
        assert_eq!(id.estimated_value, 0.25);
        assert!(id.composition.is_none());
    }

    #[test]
    fn test_fallback_washington() {
        let id = fusion().fuse(None, "WASHINGTON LIBERTY 1964", Some(1964));
        assert_eq!(id.coin_type, "Washington Quarter");
        assert_eq!(id.denomination.as_str(), "$0.25");
        assert_eq!(id.confidence, 0.55);
        assert_eq!(id.method, IdentificationMethod::OcrKeywords);
        // Floor still applies on the fallback path
        assert_eq!(id.estimated_value, 5.0);
    }

    #[test]
    fn test_fallback_after_classifier_failure() {
        let failure = ClassificationOutcome::Failure {
            error: "model missing".to_string(),
        };
        let id = fusion().fuse(Some(&failure), "in god we trust kennedy", None);
        assert_eq!(id.coin_type, "Kennedy Half Dollar");
        assert_eq!(id.estimated_value, 0.5);
    }

    #[test]
    fn test_fallback_priority() {
        assert_eq!(fusion().fuse(None, "liberty one dollar", None).coin_type, "Morgan Dollar");
        assert_eq!(fusion().fuse(None, "PEACE ONE DOLLAR", None).coin_type, "Peace Dollar");
        assert_eq!(fusion().fuse(None, "peace", None).coin_type, "Unknown Coin");

        let liberty = fusion().fuse(None, "LIBERTY", None);
        assert_eq!(liberty.coin_type, "Liberty Coin");
        assert_eq!(liberty.denomination, Denomination::Unknown);
        assert_eq!(liberty.estimated_value, 5.0);
        assert_eq!(liberty.confidence, 0.5);
    }

    #[test]
    fn test_fallback_unknown() {
        let id = fusion().fuse(None, "", None);
        assert_eq!(id.coin_type, "Unknown Coin");
        assert_eq!(id.denomination, Denomination::Unknown);
        assert_eq!(id.estimated_value, 0.0);
        assert_eq!(id.confidence, 0.5);
        assert_eq!(id.year, None);
    }

    #[test]
    fn test_composition() {
        let silver = composition_for("Mercury Dime", 1942).unwrap();
        assert_eq!(silver.description, "90% Silver, 10% Copper");
        assert!(silver.silver_content);

        let clad = composition_for("Roosevelt Dime", 1965).unwrap();
        assert_eq!(clad.description, "Copper-Nickel Clad");
        assert!(!clad.silver_content);

        assert_eq!(composition_for("Buffalo Nickel", 1930), None);
    }

    #[test]
    fn test_melt_value_needs_spot_and_silver() {
        let outcome = success(&[(CoinType::MorganDollar, 0.9)]);
        let settings = ValuationSettings {
            silver_spot_usd: Some(30.0),
        };
        let fusion = ResultFusion::new(&settings);

        assert_eq!(fusion.fuse(Some(&outcome), "", Some(1921)).melt_value, Some(23.2));
        assert_eq!(fusion.fuse(Some(&outcome), "", Some(1971)).melt_value, None);
        assert_eq!(fusion.fuse(Some(&outcome), "", None).melt_value, None);
        assert_eq!(ResultFusion::default().fuse(Some(&outcome), "", Some(1921)).melt_value, None);
    }

    #[test]
    fn test_fusion_is_deterministic() {
        let outcome = success(&[(CoinType::BarberDime, 0.42), (CoinType::MercuryDime, 0.3)]);
        let a = fusion().fuse(Some(&outcome), "1899", Some(1899));
        let b = fusion().fuse(Some(&outcome), "1899", Some(1899));
        assert_eq!(a, b);
    }
}
