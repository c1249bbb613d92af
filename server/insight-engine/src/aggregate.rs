//! Grouping, breakdowns and summary metrics over a filtered view.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::{BTreeMap, BTreeSet};

use crate::stats;
use crate::types::*;

/// Coefficient of variation (%) under which day-to-day volume is steady.
const STEADY_CV_PCT: f64 = 15.0;
/// Max-min range (% of mean) under which the spread is controlled.
const CONTROLLED_RANGE_PCT: f64 = 30.0;
/// Share of days above the mean beyond which volume is rising / falling.
const RISING_ABOVE_PCT: f64 = 60.0;
const FALLING_ABOVE_PCT: f64 = 40.0;

pub const WEEK: [Weekday; 7] = [
  Weekday::Mon,
  Weekday::Tue,
  Weekday::Wed,
  Weekday::Thu,
  Weekday::Fri,
  Weekday::Sat,
  Weekday::Sun,
];

/// Count items per key, ordered by key.
pub fn group_count<T, K, F>(items: impl IntoIterator<Item = T>, mut key: F) -> BTreeMap<K, u64>
where
  K: Ord,
  F: FnMut(&T) -> K,
{
  let mut out = BTreeMap::new();
  for item in items {
    *out.entry(key(&item)).or_insert(0) += 1;
  }
  out
}

/// (date, count) pairs, ascending by date.
pub fn daily_aggregate(records: &[&Record]) -> Vec<DailyCount> {
  group_count(records.iter(), |r| r.timestamp)
    .into_iter()
    .map(|(date, count)| DailyCount { date, count })
    .collect()
}

pub fn values(series: &[DailyCount]) -> Vec<f64> {
  series.iter().map(|d| d.count as f64).collect()
}

pub fn category_counts(records: &[&Record]) -> BTreeMap<String, u64> {
  group_count(records.iter(), |r| r.category.clone())
}

/// Attach percentages (2 decimals) to category counts, largest first.
pub fn share_of(counts: &BTreeMap<String, u64>) -> Vec<CategoryShare> {
  let total: u64 = counts.values().sum();
  let mut out: Vec<CategoryShare> = counts
    .iter()
    .map(|(category, &count)| CategoryShare {
      category: category.clone(),
      count,
      share: stats::percent(count as f64, total as f64)
        .map(stats::round2)
        .unwrap_or(0.0),
    })
    .collect();
  out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
  out
}

/// Share of status-bearing records whose status looks like a success.
/// None when no record carries a status.
pub fn success_rate(records: &[&Record]) -> Option<f64> {
  let (ok, seen) = records
    .iter()
    .filter_map(|r| r.is_success())
    .fold((0usize, 0usize), |(ok, seen), s| (ok + s as usize, seen + 1));
  stats::percent(ok as f64, seen as f64)
}

/// Weekday of each date, taken from the first record of that date carrying one.
pub fn date_weekdays(records: &[&Record]) -> BTreeMap<NaiveDate, Weekday> {
  let mut out = BTreeMap::new();
  for r in records {
    if let Some(wd) = r.day_of_week {
      out.entry(r.timestamp).or_insert(wd);
    }
  }
  out
}

/// Counts per weekday present in the view, Monday first.
pub fn weekday_counts(records: &[&Record]) -> Vec<WeekdayCount> {
  let counts = group_count(records.iter().filter_map(|r| r.day_of_week), |wd| {
    wd.num_days_from_monday()
  });
  let mut dates: BTreeMap<u32, BTreeSet<NaiveDate>> = BTreeMap::new();
  for r in records {
    if let Some(wd) = r.day_of_week {
      dates
        .entry(wd.num_days_from_monday())
        .or_default()
        .insert(r.timestamp);
    }
  }

  WEEK
    .iter()
    .filter_map(|&weekday| {
      let idx = weekday.num_days_from_monday();
      let count = *counts.get(&idx)?;
      let occurrences = dates.get(&idx).map_or(0, BTreeSet::len);
      Some(WeekdayCount {
        weekday,
        count,
        occurrences,
        mean_per_occurrence: if occurrences == 0 {
          0.0
        } else {
          count as f64 / occurrences as f64
        },
      })
    })
    .collect()
}

pub fn day_of_month_counts(records: &[&Record]) -> Vec<DayOfMonthCount> {
  group_count(records.iter(), |r| r.timestamp.day())
    .into_iter()
    .map(|(day, count)| DayOfMonthCount { day, count })
    .collect()
}

/// Counts per hour present in the view, ascending.
pub fn hour_counts(records: &[&Record]) -> Vec<HourCount> {
  group_count(records.iter().filter_map(|r| r.hour), |h| *h)
    .into_iter()
    .map(|(hour, count)| HourCount { hour, count })
    .collect()
}

/// Headline statistics of a daily series; None when empty.
pub fn daily_summary(series: &[DailyCount]) -> Option<DailySummary> {
  let first = *series.first()?;
  let vals = values(series);
  let mean = stats::mean(&vals)?;
  let std_dev = stats::sample_std(&vals).unwrap_or(0.0);

  // First occurrence wins on ties.
  let (max, min) = series.iter().fold((first, first), |(max, min), d| {
    (
      if d.count > max.count { *d } else { max },
      if d.count < min.count { *d } else { min },
    )
  });

  let coefficient_of_variation_pct = stats::percent(std_dev, mean).unwrap_or(0.0);
  let range_pct = stats::percent((max.count - min.count) as f64, mean).unwrap_or(0.0);
  let days_above_mean = vals.iter().filter(|&&v| v > mean).count();
  let above_mean_pct = days_above_mean as f64 / series.len() as f64 * 100.0;

  Some(DailySummary {
    days: series.len(),
    mean,
    std_dev,
    max,
    min,
    coefficient_of_variation_pct,
    stability: if coefficient_of_variation_pct < STEADY_CV_PCT {
      Stability::Steady
    } else {
      Stability::Variable
    },
    range_pct,
    range: if range_pct < CONTROLLED_RANGE_PCT {
      RangeClass::Controlled
    } else {
      RangeClass::Wide
    },
    days_above_mean,
    above_mean_pct,
    balance: if above_mean_pct > RISING_ABOVE_PCT {
      DayBalance::Rising
    } else if above_mean_pct < FALLING_ABOVE_PCT {
      DayBalance::Falling
    } else {
      DayBalance::Balanced
    },
  })
}

/// Days with data against calendar days between the first and last date.
pub fn coverage(series: &[DailyCount]) -> Option<Coverage> {
  let first = series.first()?.date;
  let last = series.last()?.date;
  let days_in_range = (last - first).num_days() as usize + 1;
  let days_with_data = series.len();
  Some(Coverage {
    first,
    last,
    days_with_data,
    days_in_range,
    availability_pct: days_with_data as f64 / days_in_range as f64 * 100.0,
    missing_days: days_in_range - days_with_data,
  })
}
