//! Trend heuristics: trailing moving average, first/last and segment
//! comparisons, per-category trends and the short-horizon forecast.

use chrono::{Days, NaiveDate, Weekday};
use std::collections::BTreeMap;

use crate::aggregate;
use crate::config::Config;
use crate::stats;
use crate::types::*;

/// Minimum points for a forecast.
const FORECAST_MIN_POINTS: usize = 3;
/// Points averaged for the forecast's base level.
const FORECAST_RECENT_POINTS: usize = 3;

/// Trailing mean over up to `window` points ending at each index.
/// Output has the input's length; the first element equals the first input.
pub fn moving_average(series: &[f64], window: usize) -> Vec<f64> {
  let window = window.max(1);
  (0..series.len())
    .map(|i| {
      let len = (i + 1).min(window);
      let slice = &series[i + 1 - len..=i];
      slice.iter().sum::<f64>() / len as f64
    })
    .collect()
}

pub fn classify(percent_change: f64, threshold_pct: f64) -> TrendDirection {
  if percent_change > threshold_pct {
    TrendDirection::Growth
  } else if percent_change < -threshold_pct {
    TrendDirection::Decline
  } else {
    TrendDirection::Stable
  }
}

/// Last value against the first value.
pub fn overall_trend(series: &[f64], threshold_pct: f64) -> Outcome<TrendChange> {
  let (first, last) = match (series.first(), series.last()) {
    (Some(&f), Some(&l)) if series.len() >= 2 => (f, l),
    (None, _) => return Outcome::NoData,
    _ => {
      return Outcome::InsufficientData {
        required: 2,
        available: series.len(),
      }
    }
  };
  match stats::percent_change(first, last) {
    Some(pct) => Outcome::Ready(TrendChange {
      first,
      last,
      absolute_change: last - first,
      percent_change: pct,
      direction: classify(pct, threshold_pct),
    }),
    None => Outcome::NotApplicable,
  }
}

/// Mean of the leading `fraction` of points against the trailing `fraction`.
pub fn segment_trend(series: &[f64], fraction: f64, min_points: usize) -> Outcome<SegmentChange> {
  if series.len() < min_points.max(2) {
    return Outcome::InsufficientData {
      required: min_points.max(2),
      available: series.len(),
    };
  }
  let n = series.len();
  // Epsilon keeps n * (1/3) from flooring to n/3 - 1 on exact multiples.
  let segment_len = ((n as f64 * fraction + 1e-9).floor() as usize).clamp(1, n / 2);
  let start_mean = stats::mean(&series[..segment_len]);
  let end_mean = stats::mean(&series[n - segment_len..]);
  match (start_mean, end_mean) {
    (Some(s), Some(e)) => stats::percent_change(s, e)
      .map(|pct| SegmentChange {
        segment_len,
        start_mean: s,
        end_mean: e,
        percent_change: pct,
      })
      .into(),
    _ => Outcome::NotApplicable,
  }
}

/// Projects the next value from the trailing `lookback` points.
pub fn short_horizon_forecast(series: &[f64], lookback: usize) -> Outcome<Forecast> {
  let tail = &series[series.len().saturating_sub(lookback)..];
  if tail.len() < FORECAST_MIN_POINTS {
    return Outcome::InsufficientData {
      required: FORECAST_MIN_POINTS,
      available: tail.len(),
    };
  }
  let half = tail.len() / 2;
  let first_half_mean = stats::mean(&tail[..half]);
  let second_half_mean = stats::mean(&tail[half..]);
  let recent_mean = stats::mean(&tail[tail.len() - FORECAST_RECENT_POINTS..]);
  let (Some(first_half_mean), Some(second_half_mean), Some(recent_mean)) =
    (first_half_mean, second_half_mean, recent_mean)
  else {
    return Outcome::NotApplicable;
  };
  let Some(delta_pct) = stats::percent_change(first_half_mean, second_half_mean) else {
    return Outcome::NotApplicable;
  };

  Outcome::Ready(Forecast {
    lookback: tail.len(),
    first_half_mean,
    second_half_mean,
    delta_pct,
    recent_mean,
    projected: recent_mean * (1.0 + delta_pct / 100.0),
  })
}

/// Compare the forecast to the history of the weekday after the last date.
pub fn forecast_check(
  series: &[DailyCount],
  weekdays: &BTreeMap<NaiveDate, Weekday>,
  forecast: &Forecast,
  divergence_ratio: f64,
) -> Outcome<ForecastCheck> {
  let Some(last) = series.last() else {
    return Outcome::NoData;
  };
  let (Some(next_date), Some(last_weekday)) =
    (last.date.checked_add_days(Days::new(1)), weekdays.get(&last.date))
  else {
    return Outcome::NotApplicable;
  };
  let next_weekday = last_weekday.succ();

  let history: Vec<f64> = series
    .iter()
    .filter(|d| weekdays.get(&d.date) == Some(&next_weekday))
    .map(|d| d.count as f64)
    .collect();
  let Some(historical_mean) = stats::mean(&history) else {
    return Outcome::NotApplicable;
  };
  let gap = (forecast.projected - historical_mean).abs();
  let Some(gap_pct) = stats::percent(gap, historical_mean) else {
    return Outcome::NotApplicable;
  };

  Outcome::Ready(ForecastCheck {
    next_date,
    next_weekday,
    historical_mean,
    gap_pct,
    divergent: gap > historical_mean * divergence_ratio,
  })
}

/// Segment trend and volatility per category, steepest growth first.
pub fn category_trends(records: &[&Record], config: &Config) -> Outcome<Vec<CategoryTrend>> {
  if records.is_empty() {
    return Outcome::NoData;
  }
  let distinct_dates = aggregate::daily_aggregate(records).len();
  if distinct_dates <= config.category_trend_min_dates {
    return Outcome::InsufficientData {
      required: config.category_trend_min_dates.saturating_add(1),
      available: distinct_dates,
    };
  }

  let mut by_category: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
  for r in records {
    by_category.entry(r.category.as_str()).or_default().push(r);
  }

  let mut trends: Vec<CategoryTrend> = by_category
    .into_iter()
    .filter_map(|(category, recs)| {
      let vals = aggregate::values(&aggregate::daily_aggregate(&recs));
      let change = segment_trend(&vals, config.segment_fraction, config.segment_min_points).ready()?;
      let volatility_pct = stats::coefficient_of_variation(&vals).unwrap_or(0.0);
      Some(CategoryTrend {
        category: category.to_string(),
        points: vals.len(),
        mean_daily: stats::mean(&vals).unwrap_or(0.0),
        percent_change: change.percent_change,
        direction: classify(change.percent_change, config.category_trend_threshold_pct),
        volatility_pct,
        high_volatility: volatility_pct > config.volatility_threshold_pct,
      })
    })
    .collect();

  trends.sort_by(|a, b| {
    b.percent_change
      .partial_cmp(&a.percent_change)
      .unwrap_or(std::cmp::Ordering::Equal)
      .then_with(|| a.category.cmp(&b.category))
  });
  Outcome::Ready(trends)
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Datelike;

  fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
  }

  #[test]
  fn moving_average_uses_partial_windows() {
    let ma = moving_average(&[2.0, 4.0, 6.0, 8.0], 3);
    assert_eq!(ma, vec![2.0, 3.0, 4.0, 6.0]);
  }

  #[test]
  fn moving_average_window_of_one_is_identity() {
    let series = [5.0, 1.0, 9.0];
    assert_eq!(moving_average(&series, 1), series.to_vec());
    assert_eq!(moving_average(&series, 0), series.to_vec());
  }

  #[test]
  fn moving_average_recomputes_each_window() {
    // A large early value must not leak into later windows.
    let series = [1e17, 1.0, 1.0];
    assert_eq!(moving_average(&series, 1), vec![1e17, 1.0, 1.0]);
    assert_eq!(moving_average(&series, 2), vec![1e17, 5e16, 1.0]);
  }

  #[test]
  fn overall_trend_growth() {
    let t = overall_trend(&[100.0, 100.0, 100.0, 150.0], 10.0).ready().unwrap();
    assert_eq!(t.direction, TrendDirection::Growth);
    assert!((t.percent_change - 50.0).abs() < 1e-9);
    assert_eq!(t.absolute_change, 50.0);
  }

  #[test]
  fn overall_trend_thresholds() {
    let stable = overall_trend(&[100.0, 110.0], 10.0).ready().unwrap();
    assert_eq!(stable.direction, TrendDirection::Stable);
    let decline = overall_trend(&[100.0, 80.0], 10.0).ready().unwrap();
    assert_eq!(decline.direction, TrendDirection::Decline);
  }

  #[test]
  fn overall_trend_degenerate_inputs() {
    assert_eq!(overall_trend(&[], 10.0), Outcome::NoData);
    assert_eq!(
      overall_trend(&[5.0], 10.0),
      Outcome::InsufficientData { required: 2, available: 1 }
    );
    assert_eq!(overall_trend(&[0.0, 5.0], 10.0), Outcome::NotApplicable);
  }

  #[test]
  fn segment_trend_compares_thirds() {
    let series = [10.0, 10.0, 10.0, 20.0, 20.0, 20.0, 30.0, 30.0, 30.0];
    let s = segment_trend(&series, 1.0 / 3.0, 4).ready().unwrap();
    assert_eq!(s.segment_len, 3);
    assert!((s.percent_change - 200.0).abs() < 1e-9);
  }

  #[test]
  fn segment_trend_needs_four_points() {
    assert_eq!(
      segment_trend(&[1.0, 2.0, 3.0], 1.0 / 3.0, 4),
      Outcome::InsufficientData { required: 4, available: 3 }
    );
  }

  #[test]
  fn forecast_projects_from_recent_mean() {
    // Last 7: halves [10,10,10] and [20,20,20,20] -> +100%, recent mean 20 -> 40.
    let series = [1.0, 10.0, 10.0, 10.0, 20.0, 20.0, 20.0, 20.0];
    let f = short_horizon_forecast(&series, 7).ready().unwrap();
    assert_eq!(f.lookback, 7);
    assert!((f.delta_pct - 100.0).abs() < 1e-9);
    assert!((f.projected - 40.0).abs() < 1e-9);
  }

  #[test]
  fn forecast_requires_three_points() {
    assert_eq!(
      short_horizon_forecast(&[4.0, 5.0], 7),
      Outcome::InsufficientData { required: 3, available: 2 }
    );
    assert_eq!(short_horizon_forecast(&[0.0, 5.0, 6.0], 7), Outcome::NotApplicable);
  }

  #[test]
  fn forecast_check_flags_divergence() {
    // 2024-09-01 is a Sunday; the day after the last date (Sep 8, Sunday) is a Monday.
    let series: Vec<DailyCount> = (1..=8)
      .map(|d| DailyCount {
        date: date(d),
        count: if d == 2 { 100 } else { 50 },
      })
      .collect();
    let weekdays: BTreeMap<NaiveDate, Weekday> =
      series.iter().map(|d| (d.date, d.date.weekday())).collect();
    let forecast = Forecast {
      lookback: 7,
      first_half_mean: 50.0,
      second_half_mean: 50.0,
      delta_pct: 0.0,
      recent_mean: 50.0,
      projected: 50.0,
    };
    let check = forecast_check(&series, &weekdays, &forecast, 0.2).ready().unwrap();
    assert_eq!(check.next_weekday, Weekday::Mon);
    assert_eq!(check.next_date, date(9));
    assert_eq!(check.historical_mean, 100.0);
    assert!(check.divergent);
  }

  #[test]
  fn category_trends_require_enough_dates() {
    let records: Vec<Record> = (1..=5).map(|d| Record::new(date(d), "co")).collect();
    let refs: Vec<&Record> = records.iter().collect();
    assert_eq!(
      category_trends(&refs, &Config::default()),
      Outcome::InsufficientData { required: 8, available: 5 }
    );
  }

  #[test]
  fn category_trends_with_unbounded_min_dates() {
    let records: Vec<Record> = (1..=3).map(|d| Record::new(date(d), "co")).collect();
    let refs: Vec<&Record> = records.iter().collect();
    let config = Config {
      category_trend_min_dates: usize::MAX,
      ..Config::default()
    };
    assert_eq!(
      category_trends(&refs, &config),
      Outcome::InsufficientData {
        required: usize::MAX,
        available: 3
      }
    );
  }

  #[test]
  fn category_trends_classify_each_category() {
    let mut records = Vec::new();
    for d in 1..=9u32 {
      // "co" grows 1 -> 3 records/day, "pe" stays flat at 2.
      let growing = 1 + (d - 1) / 3;
      for _ in 0..growing {
        records.push(Record::new(date(d), "co"));
      }
      for _ in 0..2 {
        records.push(Record::new(date(d), "pe"));
      }
    }
    let refs: Vec<&Record> = records.iter().collect();
    let trends = category_trends(&refs, &Config::default()).ready().unwrap();
    assert_eq!(trends[0].category, "co");
    assert_eq!(trends[0].direction, TrendDirection::Growth);
    assert_eq!(trends[1].category, "pe");
    assert_eq!(trends[1].direction, TrendDirection::Stable);
    assert!(!trends[1].high_volatility);
  }
}
