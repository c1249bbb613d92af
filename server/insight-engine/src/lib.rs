//! PushLog Log Insight Engine: deterministic, rule-based descriptive analytics.
//!
//! Loads a consolidated log dataset once, slices it by category and date
//! range, and computes aggregates, trends, anomalies, weekday/hour patterns,
//! cross-category correlation and a short-horizon forecast.
//!
//! Findings are tags and cause codes; rendering them into text is left to
//! the caller. No DB, no network; pure computation over in-memory records.

pub mod aggregate;
pub mod anomaly;
pub mod config;
pub mod correlation;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod normalize;
pub mod pattern;
pub mod stats;
pub mod trend;
pub mod types;

pub use config::Config;
pub use dataset::{Dataset, View};
pub use engine::Engine;
pub use error::AnalyticsError;
pub use types::{AnalysisRequest, Filter, Outcome, Report};
