//! Coin Appraiser
//!
//! Finds coins in a photograph, reads their dates, classifies their type
//! against a fixed US catalog and estimates what they are worth.

pub mod catalog;
pub mod config;
pub mod pipeline;
pub mod report;
pub mod valuation;
pub mod vision;

pub use catalog::{CoinType, Denomination};
pub use config::AppConfig;
pub use pipeline::{AppraisalError, CoinPipeline};
pub use report::{AnalysisReport, CoinRecord, FailureReport, IdentificationReport, Response};
