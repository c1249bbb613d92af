//! Outlier detection: sigma bands on daily volume, IQR fences on sizes and
//! the low-volume floor that signals likely outages.
//!
//! A zero mean or zero deviation (constant or single-point series) never
//! produces a flag.

use std::collections::BTreeMap;

use crate::aggregate;
use crate::config::Config;
use crate::stats;
use crate::types::*;

/// Fraction of the daily mean under which an anomalous day suggests a failed load.
const FAILURE_FRACTION: f64 = 0.5;
/// Multiple of the daily mean over which an anomalous day suggests reprocessing.
const REPROCESSING_MULTIPLE: f64 = 2.0;

/// Days whose count is more than `sigma` sample standard deviations from the mean.
pub fn std_anomalies(series: &[DailyCount], sigma: f64, high_sigma: f64) -> Vec<Anomaly> {
  let vals = aggregate::values(series);
  let (Some(mean), Some(std)) = (stats::mean(&vals), stats::sample_std(&vals)) else {
    return Vec::new();
  };
  if mean == 0.0 || std == 0.0 {
    return Vec::new();
  }

  series
    .iter()
    .filter_map(|d| {
      let value = d.count as f64;
      let delta = value - mean;
      let distance = delta.abs() / std;
      if distance <= sigma {
        return None;
      }
      Some(Anomaly {
        date: d.date,
        value,
        delta,
        delta_pct: delta / mean * 100.0,
        sigma: distance,
        kind: if delta > 0.0 {
          AnomalyKind::Peak
        } else {
          AnomalyKind::Drop
        },
        severity: if distance > high_sigma {
          Severity::High
        } else {
          Severity::Moderate
        },
      })
    })
    .collect()
}

/// Some anomalous day fell under half the daily mean.
pub fn suspected_failure(anomalies: &[Anomaly], mean: f64) -> bool {
  anomalies.iter().any(|a| a.value < mean * FAILURE_FRACTION)
}

/// Some anomalous day exceeded twice the daily mean (reprocessing or a special load).
pub fn suspected_reprocessing(anomalies: &[Anomaly], mean: f64) -> bool {
  anomalies.iter().any(|a| a.value > mean * REPROCESSING_MULTIPLE)
}

/// Values outside [Q1 - k·IQR, Q3 + k·IQR]; the lower fence never goes below zero.
pub fn iqr_anomalies(values: &[f64], multiplier: f64) -> Outcome<IqrReport> {
  let mut sorted = values.to_vec();
  sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
  let (Some(q1), Some(q3)) = (stats::quantile(&sorted, 0.25), stats::quantile(&sorted, 0.75)) else {
    return Outcome::NoData;
  };
  let iqr = q3 - q1;
  let lower = (q1 - multiplier * iqr).max(0.0);
  let upper = q3 + multiplier * iqr;

  let mut high = Vec::new();
  let mut low = Vec::new();
  for (i, &v) in values.iter().enumerate() {
    if v > upper {
      high.push(i);
    } else if v < lower {
      low.push(i);
    }
  }
  Outcome::Ready(IqrReport {
    q1,
    q3,
    iqr,
    lower,
    upper,
    high,
    low,
  })
}

/// Days below `floor_fraction` of the mean daily count.
pub fn low_volume_alert(series: &[DailyCount], floor_fraction: f64) -> Vec<LowVolumeDay> {
  let vals = aggregate::values(series);
  let Some(mean) = stats::mean(&vals).filter(|m| *m > 0.0) else {
    return Vec::new();
  };
  let floor = mean * floor_fraction;
  series
    .iter()
    .filter(|d| (d.count as f64) < floor)
    .map(|d| LowVolumeDay {
      date: d.date,
      count: d.count,
      share_of_mean_pct: d.count as f64 / mean * 100.0,
    })
    .collect()
}

/// Size metrics over records carrying both size fields.
pub fn size_summary(records: &[&Record], config: &Config) -> Outcome<SizeSummary> {
  let sized: Vec<(&Record, f64, f64)> = records
    .iter()
    .filter_map(|r| Some((*r, r.size_remote? as f64, r.size_local? as f64)))
    .collect();
  if sized.is_empty() {
    return Outcome::NoData;
  }

  let remote: Vec<f64> = sized.iter().map(|(_, s, _)| *s).collect();
  let local: Vec<f64> = sized.iter().map(|(_, _, l)| *l).collect();
  let mean_remote = stats::mean(&remote).unwrap_or(0.0);
  let mean_local = stats::mean(&local).unwrap_or(0.0);
  let compression_pct = stats::percent(mean_remote - mean_local, mean_remote).into();

  let Some(fences) = iqr_anomalies(&remote, config.iqr_multiplier).ready() else {
    return Outcome::NoData;
  };

  let mut per_category: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
  for (r, s, _) in &sized {
    per_category.entry(r.category.as_str()).or_default().push(*s);
  }

  Outcome::Ready(SizeSummary {
    records: sized.len(),
    mean_remote,
    mean_local,
    compression_pct,
    lower_bound: fences.lower,
    upper_bound: fences.upper,
    large_outliers: fences.high.len(),
    small_outliers: fences.low.len(),
    per_category: per_category
      .into_iter()
      .map(|(category, sizes)| CategorySize {
        category: category.to_string(),
        records: sizes.len(),
        mean_remote: stats::mean(&sizes).unwrap_or(0.0),
      })
      .collect(),
  })
}
