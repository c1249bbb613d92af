//! Typed failures of an analysis request. Each variant names the
//! precondition that failed and where.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
  /// A required record field is absent or blank.
  #[error("records[{record}].{field}: missing")]
  MissingField { record: usize, field: &'static str },

  #[error("records[{record}].timestamp: unparseable date {value:?}, expected YYYY-MM-DD or RFC3339")]
  UnparseableTimestamp { record: usize, value: String },

  /// A record field is present but out of its domain (hour, weekday).
  #[error("records[{record}].{field}: {reason}")]
  InvalidRecordValue {
    record: usize,
    field: &'static str,
    reason: String,
  },

  #[error("filter.{field}: {reason}")]
  InvalidFilter { field: &'static str, reason: String },

  /// A threshold override the heuristics cannot work with.
  #[error("config.{field}: {reason}")]
  InvalidConfig {
    field: &'static str,
    reason: &'static str,
  },

  #[error("stdin: {0}")]
  Read(#[from] std::io::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl AnalyticsError {
  pub fn invalid_config(field: &'static str, reason: &'static str) -> Self {
    Self::InvalidConfig { field, reason }
  }

  pub fn invalid_filter(field: &'static str, reason: impl Into<String>) -> Self {
    Self::InvalidFilter {
      field,
      reason: reason.into(),
    }
  }

  /// Dotted path of the offending input, when the error is about one.
  pub fn field(&self) -> Option<String> {
    match self {
      Self::MissingField { record, field } | Self::InvalidRecordValue { record, field, .. } => {
        Some(format!("records[{}].{}", record, field))
      }
      Self::UnparseableTimestamp { record, .. } => Some(format!("records[{}].timestamp", record)),
      Self::InvalidFilter { field, .. } => Some(format!("filter.{}", field)),
      Self::InvalidConfig { field, .. } => Some(format!("config.{}", field)),
      Self::Read(_) | Self::Json(_) => None,
    }
  }
}
