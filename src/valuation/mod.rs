//! Valuation Layer
//!
//! Turns OCR text and classifier output into a dated, priced identification.

pub mod fusion;
pub mod metals;
pub mod year;

pub use fusion::{Composition, Identification, IdentificationMethod, ResultFusion, MAX_CONFIDENCE};
pub use metals::silver_melt_value;
pub use year::{YearResolver, YearSource};
