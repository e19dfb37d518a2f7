//! Response documents
//!
//! The JSON-facing shapes returned by the two entry points. Absent years are
//! serialized as `null`; optional metadata is omitted when unknown.

use serde::Serialize;

use crate::catalog::Denomination;
use crate::valuation::{Identification, IdentificationMethod};
use crate::vision::{ClassificationCandidate, DetectedRegion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
    pub radius: u32,
}

impl From<DetectedRegion> for Position {
    fn from(region: DetectedRegion) -> Self {
        Self {
            x: region.center_x,
            y: region.center_y,
            radius: region.radius,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Final per-coin result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoinRecord {
    pub id: usize,
    pub position: Position,
    pub coin_type: String,
    pub denomination: Denomination,
    pub year: Option<u16>,
    pub estimated_value: f64,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silver_content: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub melt_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CoinRecord {
    pub fn new(id: usize, position: Position, identification: &Identification) -> Self {
        Self {
            id,
            position,
            coin_type: identification.coin_type.clone(),
            denomination: identification.denomination,
            year: identification.year,
            estimated_value: identification.estimated_value,
            confidence: identification.confidence,
            composition: identification
                .composition
                .map(|c| c.description.to_string()),
            silver_content: identification.composition.map(|c| c.silver_content),
            melt_value: identification.melt_value,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Multi-coin analysis of one photo
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub success: bool,
    pub image_size: ImageSize,
    pub detected_coins: Vec<CoinRecord>,
    pub total_coins: usize,
    pub estimated_total_value: f64,
}

impl AnalysisReport {
    pub fn new(image_size: ImageSize, detected_coins: Vec<CoinRecord>) -> Self {
        let total: f64 = detected_coins.iter().map(|c| c.estimated_value).sum();
        Self {
            success: true,
            image_size,
            total_coins: detected_coins.len(),
            estimated_total_value: (total * 100.0).round() / 100.0,
            detected_coins,
        }
    }
}

/// Whole-photo identification of a single coin
#[derive(Debug, Clone, Serialize)]
pub struct IdentificationReport {
    pub success: bool,
    #[serde(flatten)]
    pub coin: CoinRecord,
    pub base_value: f64,
    pub method: IdentificationMethod,
    pub alternatives: Vec<ClassificationCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier_error: Option<String>,
}

impl IdentificationReport {
    pub fn new(coin: CoinRecord, identification: &Identification, classifier_error: Option<String>) -> Self {
        Self {
            success: true,
            coin,
            base_value: identification.base_value,
            method: identification.method,
            alternatives: identification.alternatives.clone(),
            classifier_error,
        }
    }
}

/// Request-level failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    pub success: bool,
    pub error: String,
}

impl FailureReport {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Either a report or a failure, serialized without a wrapper
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Response<T> {
    Success(T),
    Failure(FailureReport),
}

impl<T> Response<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::Composition;
    use serde_json::json;

    fn identification(year: Option<u16>) -> Identification {
        Identification {
            coin_type: "Mercury Dime".to_string(),
            denomination: Denomination::Dime,
            base_value: 3.0,
            estimated_value: 5.0,
            confidence: 0.72,
            year,
            composition: year.map(|_| Composition {
                description: "90% Silver, 10% Copper",
                silver_content: true,
            }),
            melt_value: None,
            method: IdentificationMethod::ClipZeroShot,
            alternatives: vec![],
        }
    }

    fn position() -> Position {
        Position { x: 10, y: 20, radius: 60 }
    }

    #[test]
    fn test_missing_year_is_null() {
        let record = CoinRecord::new(1, position(), &identification(None));
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["year"], serde_json::Value::Null);
        assert!(value.get("composition").is_none());
        assert!(value.get("notes").is_none());
        assert_eq!(value["denomination"], "$0.10");
        assert_eq!(value["position"], json!({"x": 10, "y": 20, "radius": 60}));
    }

    #[test]
    fn test_composition_fields() {
        let record = CoinRecord::new(1, position(), &identification(Some(1942)));
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["year"], 1942);
        assert_eq!(value["composition"], "90% Silver, 10% Copper");
        assert_eq!(value["silver_content"], true);
    }

    #[test]
    fn test_analysis_totals() {
        let coins = vec![
            CoinRecord::new(1, position(), &identification(None)),
            CoinRecord::new(2, position(), &identification(None)),
        ];
        let report = AnalysisReport::new(ImageSize { width: 640, height: 480 }, coins);

        assert!(report.success);
        assert_eq!(report.total_coins, 2);
        assert_eq!(report.estimated_total_value, 10.0);
    }

    #[test]
    fn test_empty_analysis() {
        let report = AnalysisReport::new(ImageSize { width: 1, height: 1 }, vec![]);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["total_coins"], 0);
        assert_eq!(value["estimated_total_value"], 0.0);
        assert_eq!(value["detected_coins"], json!([]));
    }

    #[test]
    fn test_identification_is_flat() {
        let id = identification(Some(1942));
        let coin = CoinRecord::new(1, position(), &id).with_notes("note");
        let report = IdentificationReport::new(coin, &id, None);
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["coin_type"], "Mercury Dime");
        assert_eq!(value["method"], "CLIP Zero-Shot Classification");
        assert_eq!(value["base_value"], 3.0);
        assert_eq!(value["notes"], "note");
    }

    #[test]
    fn test_failure_response() {
        let response: Response<AnalysisReport> = Response::Failure(FailureReport::new("bad image"));
        assert!(!response.is_success());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": false, "error": "bad image"})
        );
    }
}
