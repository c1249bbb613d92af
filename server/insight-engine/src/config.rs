//! Engine configuration with sane defaults.
//!
//! Every threshold is a heuristic judgment call; callers may override any of
//! them per request (missing keys keep their default).

use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;

/// Tunable thresholds for the analytics heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Trailing window (points) for the daily moving average.
  pub moving_average_window: usize,
  /// Percent change beyond which the overall trend is growth/decline.
  pub trend_threshold_pct: f64,
  /// Fraction of points compared at each end by the segment trend.
  pub segment_fraction: f64,
  /// Minimum points required by the segment trend.
  pub segment_min_points: usize,
  /// Percent change beyond which a category trend is growth/decline.
  pub category_trend_threshold_pct: f64,
  /// Distinct dates the view must exceed before per-category trends run.
  pub category_trend_min_dates: usize,
  /// Coefficient of variation (%) above which a series is volatile.
  pub volatility_threshold_pct: f64,
  /// Trailing points considered by the short-horizon forecast.
  pub forecast_lookback: usize,
  /// Relative gap between forecast and weekday history that flags divergence.
  pub forecast_divergence_ratio: f64,
  /// Sigma multiple that flags a point as anomalous.
  pub anomaly_sigma: f64,
  /// Sigma multiple above which an anomaly is high severity.
  pub high_severity_sigma: f64,
  /// IQR multiplier for size outlier bounds.
  pub iqr_multiplier: f64,
  /// Fraction of the mean below which a day is a likely outage.
  pub low_volume_fraction: f64,
  /// Multiplier of the daily mean under which a day counts as a drop.
  pub drop_multiplier: f64,
  /// Multiplier of the daily mean over which a day counts as a peak.
  pub peak_multiplier: f64,
  /// Minimum consistency ratio (0..1) to report a weekday pattern.
  pub pattern_consistency: f64,
  /// Magnitude (%) above which a weekday pattern is pronounced.
  pub pronounced_pct: f64,
  /// Business window, inclusive start hour.
  pub business_start_hour: u8,
  /// Business window, inclusive end hour.
  pub business_end_hour: u8,
  /// Fraction of the hourly mean under which an hour is a maintenance window.
  pub maintenance_fraction: f64,
  /// Multiplier of the hourly mean over which an hour is a peak hour.
  pub peak_hour_multiplier: f64,
  /// Overnight share (%) above which overnight processing is heavy.
  pub heavy_overnight_pct: f64,
  /// Correlation below which two categories compete.
  pub competing_correlation: f64,
  /// Correlation above which two categories co-move.
  pub co_moving_correlation: f64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      moving_average_window: 7,
      trend_threshold_pct: 10.0,
      segment_fraction: 1.0 / 3.0,
      segment_min_points: 4,
      category_trend_threshold_pct: 5.0,
      category_trend_min_dates: 7,
      volatility_threshold_pct: 30.0,
      forecast_lookback: 7,
      forecast_divergence_ratio: 0.2,
      anomaly_sigma: 2.0,
      high_severity_sigma: 3.0,
      iqr_multiplier: 1.5,
      low_volume_fraction: 0.10,
      drop_multiplier: 0.85,
      peak_multiplier: 1.15,
      pattern_consistency: 0.5,
      pronounced_pct: 20.0,
      business_start_hour: 8,
      business_end_hour: 18,
      maintenance_fraction: 0.5,
      peak_hour_multiplier: 1.3,
      heavy_overnight_pct: 40.0,
      competing_correlation: -0.3,
      co_moving_correlation: 0.7,
    }
  }
}

/// Largest `category_trend_min_dates` accepted (ten years of daily points).
const MAX_CATEGORY_TREND_DATES: usize = 3650;

impl Config {
  /// Reject threshold combinations the heuristics cannot work with.
  /// Comparisons are written so that NaN fails them.
  pub fn validate(&self) -> Result<(), AnalyticsError> {
    let fail = |field: &'static str, reason: &'static str| -> Result<(), AnalyticsError> {
      Err(AnalyticsError::invalid_config(field, reason))
    };

    if self.moving_average_window == 0 {
      return fail("moving_average_window", "must be at least 1");
    }
    if !(self.segment_fraction > 0.0 && self.segment_fraction <= 0.5) {
      return fail("segment_fraction", "must be in (0, 0.5]");
    }
    if self.segment_min_points < 2 {
      return fail("segment_min_points", "must be at least 2");
    }
    if self.category_trend_min_dates > MAX_CATEGORY_TREND_DATES {
      return fail("category_trend_min_dates", "must be at most 3650");
    }
    if self.forecast_lookback < 3 {
      return fail("forecast_lookback", "must be at least 3");
    }
    if !(self.forecast_divergence_ratio > 0.0 && self.forecast_divergence_ratio.is_finite()) {
      return fail("forecast_divergence_ratio", "must be positive and finite");
    }
    if !(self.anomaly_sigma > 0.0
      && self.high_severity_sigma >= self.anomaly_sigma
      && self.high_severity_sigma.is_finite())
    {
      return fail("high_severity_sigma", "sigma thresholds must be positive and ordered");
    }
    if !(self.iqr_multiplier > 0.0 && self.iqr_multiplier.is_finite()) {
      return fail("iqr_multiplier", "must be positive and finite");
    }
    if !(self.low_volume_fraction > 0.0 && self.low_volume_fraction < 1.0) {
      return fail("low_volume_fraction", "must be in (0, 1)");
    }
    if !(self.drop_multiplier < 1.0 && self.peak_multiplier > 1.0 && self.peak_multiplier.is_finite()) {
      return fail("drop_multiplier", "drop multiplier must be < 1 and peak multiplier > 1");
    }
    if !(0.0..=1.0).contains(&self.pattern_consistency) {
      return fail("pattern_consistency", "must be in [0, 1]");
    }
    if self.business_start_hour > self.business_end_hour || self.business_end_hour > 23 {
      return fail("business_end_hour", "business window must satisfy start <= end <= 23");
    }
    if !(self.maintenance_fraction > 0.0 && self.maintenance_fraction <= 1.0) {
      return fail("maintenance_fraction", "must be in (0, 1]");
    }
    if !(self.peak_hour_multiplier > 1.0 && self.peak_hour_multiplier.is_finite()) {
      return fail("peak_hour_multiplier", "must be above 1 and finite");
    }
    if !(self.competing_correlation < self.co_moving_correlation) {
      return fail("competing_correlation", "must be below co_moving_correlation");
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    assert!(Config::default().validate().is_ok());
  }

  #[test]
  fn partial_override_keeps_other_defaults() {
    let config: Config = serde_json::from_str(r#"{"trend_threshold_pct": 25.0}"#).unwrap();
    assert_eq!(config.trend_threshold_pct, 25.0);
    assert_eq!(config.moving_average_window, 7);
    assert_eq!(config.drop_multiplier, 0.85);
  }

  #[test]
  fn inverted_business_window_rejected() {
    let config = Config {
      business_start_hour: 19,
      business_end_hour: 8,
      ..Config::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("business_end_hour"));
  }

  #[test]
  fn zero_window_rejected() {
    let config = Config {
      moving_average_window: 0,
      ..Config::default()
    };
    assert!(config.validate().is_err());
  }

  fn rejected_field(config: Config) -> Option<String> {
    config.validate().err().and_then(|e| e.field())
  }

  #[test]
  fn huge_category_trend_min_dates_rejected() {
    let config = Config {
      category_trend_min_dates: usize::MAX,
      ..Config::default()
    };
    assert_eq!(rejected_field(config).as_deref(), Some("config.category_trend_min_dates"));

    let at_cap = Config {
      category_trend_min_dates: MAX_CATEGORY_TREND_DATES,
      ..Config::default()
    };
    assert!(at_cap.validate().is_ok());
  }

  #[test]
  fn single_point_segments_rejected() {
    let config = Config {
      segment_min_points: 1,
      ..Config::default()
    };
    assert_eq!(rejected_field(config).as_deref(), Some("config.segment_min_points"));
  }

  #[test]
  fn low_volume_fraction_out_of_range_rejected() {
    for bad in [0.0, 1.0, -0.2, f64::NAN] {
      let config = Config {
        low_volume_fraction: bad,
        ..Config::default()
      };
      assert_eq!(rejected_field(config).as_deref(), Some("config.low_volume_fraction"), "{}", bad);
    }
  }

  #[test]
  fn maintenance_fraction_out_of_range_rejected() {
    for bad in [0.0, 1.5, f64::NAN] {
      let config = Config {
        maintenance_fraction: bad,
        ..Config::default()
      };
      assert_eq!(rejected_field(config).as_deref(), Some("config.maintenance_fraction"), "{}", bad);
    }
    let full = Config {
      maintenance_fraction: 1.0,
      ..Config::default()
    };
    assert!(full.validate().is_ok());
  }

  #[test]
  fn non_positive_iqr_multiplier_rejected() {
    for bad in [0.0, -1.5, f64::INFINITY] {
      let config = Config {
        iqr_multiplier: bad,
        ..Config::default()
      };
      assert_eq!(rejected_field(config).as_deref(), Some("config.iqr_multiplier"), "{}", bad);
    }
  }

  #[test]
  fn peak_hour_multiplier_must_exceed_one() {
    for bad in [1.0, 0.8, f64::NAN] {
      let config = Config {
        peak_hour_multiplier: bad,
        ..Config::default()
      };
      assert_eq!(rejected_field(config).as_deref(), Some("config.peak_hour_multiplier"), "{}", bad);
    }
  }

  #[test]
  fn non_positive_divergence_ratio_rejected() {
    for bad in [0.0, -0.2, f64::NAN] {
      let config = Config {
        forecast_divergence_ratio: bad,
        ..Config::default()
      };
      assert_eq!(
        rejected_field(config).as_deref(),
        Some("config.forecast_divergence_ratio"),
        "{}",
        bad
      );
    }
  }
}
