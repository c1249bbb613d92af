//! Weekday / hour / calendar pattern detection.
//!
//! Findings carry tags and cause codes only; wording belongs to the
//! presentation layer.

use chrono::{NaiveDate, Weekday};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use crate::aggregate::{self, WEEK};
use crate::config::Config;
use crate::stats;
use crate::types::*;

/// Weekend total above this fraction of the weekday total is a busy weekend.
const HIGH_WEEKEND_RATIO: f64 = 0.4;
/// Weekend total below this fraction of the weekday total is a quiet weekend.
const LOW_WEEKEND_RATIO: f64 = 0.2;
/// Busiest vs quietest weekday spread (%) that counts as high variability.
const WEEKLY_SPREAD_PCT: f64 = 30.0;
/// Business-window share (%) above which traffic is office-bound.
const BUSINESS_HOURS_PCT: f64 = 70.0;
const BALANCED_HOURS_PCT: f64 = 50.0;
/// Overnight window: from this hour through midnight until the night period ends.
const OVERNIGHT_START: u8 = 22;
const OVERNIGHT_END: u8 = 6;
/// Month thirds and the multipliers that make one of them dominant.
const EARLY_MONTH_LAST_DAY: u32 = 10;
const MID_MONTH_LAST_DAY: u32 = 20;
const EDGE_LOAD_RATIO: f64 = 1.3;
const MID_LOAD_RATIO: f64 = 1.2;
/// Seasonality: first week is days 1..=7, last week starts on day 24.
const FIRST_WEEK_LAST_DAY: u32 = 7;
const LAST_WEEK_FIRST_DAY: u32 = 24;
const SEASONALITY_GAP_RATIO: f64 = 0.15;
/// Leader share (%) classes and the top-3 share that is top heavy.
const DOMINANT_SHARE_PCT: f64 = 70.0;
const CONCENTRATED_SHARE_PCT: f64 = 50.0;
const TOP_HEAVY_PCT: f64 = 80.0;

type CauseRule = (&'static [Weekday], CauseCode);

const DROP_CAUSES: &[CauseRule] = &[
  (&[Weekday::Sat, Weekday::Sun], CauseCode::WeekendLowActivity),
  (&[Weekday::Mon], CauseCode::WeekStartBacklog),
  (&[Weekday::Fri], CauseCode::WorkweekWindDown),
];

const PEAK_CAUSES: &[CauseRule] = &[
  (&[Weekday::Mon], CauseCode::WeekendBacklogCarryOver),
  (&[Weekday::Tue], CauseCode::SecondBusinessDay),
  (&[Weekday::Wed, Weekday::Thu], CauseCode::MidweekIntensive),
  (&[Weekday::Fri], CauseCode::WeeklyClose),
];

/// Cause lookup for a weekday pattern.
pub fn attribute_cause(kind: PatternKind, weekday: Weekday) -> CauseCode {
  let (rules, fallback) = match kind {
    PatternKind::Drop => (DROP_CAUSES, CauseCode::RecurringSchedule),
    PatternKind::Peak => (PEAK_CAUSES, CauseCode::ScheduledBatch),
  };
  rules
    .iter()
    .find(|(days, _)| days.contains(&weekday))
    .map_or(fallback, |(_, cause)| *cause)
}

/// Recurring low (drop) or high (peak) volume on one weekday.
///
/// Days beyond the threshold (a multiple of the daily mean) are grouped by
/// weekday; the most frequent weekday is reported when it crosses the
/// threshold on at least `pattern_consistency` of its occurrences.
pub fn weekday_pattern(
  series: &[DailyCount],
  weekdays: &BTreeMap<NaiveDate, Weekday>,
  kind: PatternKind,
  config: &Config,
) -> Option<PatternFinding> {
  let baseline = stats::mean(&aggregate::values(series)).filter(|m| *m > 0.0)?;
  let threshold = match kind {
    PatternKind::Drop => baseline * config.drop_multiplier,
    PatternKind::Peak => baseline * config.peak_multiplier,
  };
  let crosses = |count: u64| match kind {
    PatternKind::Drop => (count as f64) < threshold,
    PatternKind::Peak => (count as f64) > threshold,
  };

  let flagged: Vec<(DailyCount, Weekday)> = series
    .iter()
    .filter(|d| crosses(d.count))
    .filter_map(|d| Some((*d, *weekdays.get(&d.date)?)))
    .collect();
  let per_weekday = aggregate::group_count(flagged.iter(), |(_, wd)| wd.num_days_from_monday());

  // Most frequent weekday; ties go to the earliest in the week.
  let (subject, occurrences) = WEEK.iter().fold(None, |best: Option<(Weekday, u64)>, wd| {
    let n = per_weekday.get(&wd.num_days_from_monday()).copied().unwrap_or(0);
    match best {
      Some((_, m)) if m >= n => best,
      _ if n > 0 => Some((*wd, n)),
      _ => best,
    }
  })?;

  let total_occurrences = series
    .iter()
    .filter(|d| weekdays.get(&d.date) == Some(&subject))
    .count();
  let consistency = occurrences as f64 / total_occurrences as f64;
  if consistency < config.pattern_consistency {
    return None;
  }

  let hits: Vec<&DailyCount> = flagged
    .iter()
    .filter(|(_, wd)| *wd == subject)
    .map(|(d, _)| d)
    .collect();
  let subject_mean = hits.iter().map(|d| d.count as f64).sum::<f64>() / hits.len() as f64;
  let magnitude_pct = match kind {
    PatternKind::Drop => (baseline - subject_mean) / baseline * 100.0,
    PatternKind::Peak => (subject_mean - baseline) / baseline * 100.0,
  };

  Some(PatternFinding {
    kind,
    subject,
    occurrences: occurrences as usize,
    total_occurrences,
    consistency,
    subject_mean,
    baseline_mean: baseline,
    magnitude_pct,
    pronounced: magnitude_pct > config.pronounced_pct,
    cause: attribute_cause(kind, subject),
    dates: hits.iter().map(|d| d.date).collect(),
  })
}

/// Busiest/quietest weekday and how much of the load lands on the weekend.
pub fn weekly_shape(counts: &[WeekdayCount]) -> Option<WeeklyShape> {
  let first = *counts.first()?;
  let (busiest, quietest) = counts.iter().fold((first, first), |(hi, lo), c| {
    (
      if c.count > hi.count { *c } else { hi },
      if c.count < lo.count { *c } else { lo },
    )
  });
  let spread_pct: Outcome<f64> =
    stats::percent((busiest.count - quietest.count) as f64, quietest.count as f64).into();
  let high_variability = spread_pct.as_ready().is_some_and(|s| *s > WEEKLY_SPREAD_PCT);

  let is_weekend = |wd: Weekday| matches!(wd, Weekday::Sat | Weekday::Sun);
  let weekend_total: u64 = counts.iter().filter(|c| is_weekend(c.weekday)).map(|c| c.count).sum();
  let weekday_total: u64 = counts.iter().filter(|c| !is_weekend(c.weekday)).map(|c| c.count).sum();

  let weekend_load = if weekend_total as f64 > weekday_total as f64 * HIGH_WEEKEND_RATIO {
    WeekendLoad::High
  } else if (weekend_total as f64) < weekday_total as f64 * LOW_WEEKEND_RATIO {
    WeekendLoad::Low
  } else {
    WeekendLoad::Moderate
  };

  Some(WeeklyShape {
    busiest,
    quietest,
    spread_pct,
    high_variability,
    weekend_total,
    weekday_total,
    weekend_load,
  })
}

/// Hour-of-day profile over records carrying an hour.
///
/// `total_dates` is the number of distinct dates in the view and scales the
/// per-hour rates.
pub fn hour_profile(records: &[&Record], total_dates: usize, config: &Config) -> Option<HourProfile> {
  let counts = aggregate::hour_counts(records);
  let first = *counts.first()?;
  if total_dates == 0 {
    return None;
  }
  let total: u64 = counts.iter().map(|c| c.count).sum();
  let share = |n: u64| stats::percent(n as f64, total as f64).unwrap_or(0.0);

  let (peak, valley) = counts.iter().fold((first, first), |(hi, lo), c| {
    (
      if c.count > hi.count { *c } else { hi },
      if c.count < lo.count { *c } else { lo },
    )
  });

  let periods: Vec<PeriodShare> = DayPeriod::ALL
    .iter()
    .map(|&period| {
      let count = counts
        .iter()
        .filter(|c| DayPeriod::of_hour(c.hour) == period)
        .map(|c| c.count)
        .sum();
      PeriodShare {
        period,
        count,
        share: share(count),
      }
    })
    .collect();
  let busiest_period = periods
    .iter()
    .fold(None, |best: Option<PeriodShare>, p| match best {
      Some(b) if b.count >= p.count => best,
      _ => Some(*p),
    })
    .map_or(DayPeriod::Night, |p| p.period);

  let in_business = |h: u8| (config.business_start_hour..=config.business_end_hour).contains(&h);
  let business_share_pct = share(
    counts
      .iter()
      .filter(|c| in_business(c.hour))
      .map(|c| c.count)
      .sum(),
  );
  let workday_profile = if business_share_pct > BUSINESS_HOURS_PCT {
    WorkdayProfile::BusinessHours
  } else if business_share_pct > BALANCED_HOURS_PCT {
    WorkdayProfile::Balanced
  } else {
    WorkdayProfile::OffHours
  };

  let hourly_mean = total as f64 / counts.len() as f64;
  let mut maintenance_windows: Vec<HourCount> = counts
    .iter()
    .filter(|c| (c.count as f64) < hourly_mean * config.maintenance_fraction)
    .copied()
    .collect();
  maintenance_windows.sort_by_key(|c| (c.count, c.hour));

  let overnight_share_pct = share(
    counts
      .iter()
      .filter(|c| c.hour >= OVERNIGHT_START || c.hour < OVERNIGHT_END)
      .map(|c| c.count)
      .sum(),
  );

  Some(HourProfile {
    peak,
    valley,
    periods,
    busiest_period,
    business_share_pct,
    workday_profile,
    peak_outside_business: !in_business(peak.hour),
    maintenance_windows,
    overnight_share_pct,
    heavy_overnight: overnight_share_pct > config.heavy_overnight_pct,
    recurring_peak: recurring_peak(records, &counts, hourly_mean, total_dates, config),
    throughput_per_hour: total as f64 / (total_dates as f64 * 24.0),
    peak_hourly_rate: peak.count as f64 / total_dates as f64,
    counts,
  })
}

/// Among busy hours, the one active on the most distinct dates.
fn recurring_peak(
  records: &[&Record],
  counts: &[HourCount],
  hourly_mean: f64,
  total_dates: usize,
  config: &Config,
) -> Option<RecurringPeak> {
  let busy: BTreeSet<u8> = counts
    .iter()
    .filter(|c| c.count as f64 > hourly_mean * config.peak_hour_multiplier)
    .map(|c| c.hour)
    .collect();

  let mut dates: BTreeMap<u8, BTreeSet<NaiveDate>> = BTreeMap::new();
  for r in records {
    if let Some(h) = r.hour.filter(|h| busy.contains(h)) {
      dates.entry(h).or_default().insert(r.timestamp);
    }
  }

  let (hour, active) = dates
    .iter()
    .fold(None, |best: Option<(u8, usize)>, (h, d)| match best {
      Some((_, n)) if n >= d.len() => best,
      _ => Some((*h, d.len())),
    })?;

  Some(RecurringPeak {
    hour,
    active_dates: active,
    total_dates,
    consistency: active as f64 / total_dates as f64,
  })
}

/// Early/mid/late month load and first-vs-last-week seasonality.
pub fn monthly_shape(by_day: &[DayOfMonthCount], daily_mean: f64) -> Option<MonthlyShape> {
  if by_day.is_empty() {
    return None;
  }
  let sum_in = |days: RangeInclusive<u32>| -> u64 {
    by_day
      .iter()
      .filter(|d| days.contains(&d.day))
      .map(|d| d.count)
      .sum()
  };
  let early = sum_in(1..=EARLY_MONTH_LAST_DAY);
  let mid = sum_in(EARLY_MONTH_LAST_DAY + 1..=MID_MONTH_LAST_DAY);
  let late = sum_in(MID_MONTH_LAST_DAY + 1..=31);
  let total = (early + mid + late) as f64;
  let share = |n: u64| stats::percent(n as f64, total).unwrap_or(0.0);

  let (e, m, l) = (early as f64, mid as f64, late as f64);
  let profile = if e > m * EDGE_LOAD_RATIO && e > l * EDGE_LOAD_RATIO {
    MonthProfile::EarlyMonthLoad
  } else if l > e * EDGE_LOAD_RATIO && l > m * EDGE_LOAD_RATIO {
    MonthProfile::LateMonthLoad
  } else if m > e * MID_LOAD_RATIO && m > l * MID_LOAD_RATIO {
    MonthProfile::MidMonthPeak
  } else {
    MonthProfile::Uniform
  };

  Some(MonthlyShape {
    early,
    mid,
    late,
    early_share: share(early),
    mid_share: share(mid),
    late_share: share(late),
    profile,
    seasonality: seasonality(by_day, daily_mean),
  })
}

fn seasonality(by_day: &[DayOfMonthCount], daily_mean: f64) -> Option<Seasonality> {
  let mean_in = |days: RangeInclusive<u32>| {
    let vals: Vec<f64> = by_day
      .iter()
      .filter(|d| days.contains(&d.day))
      .map(|d| d.count as f64)
      .collect();
    stats::mean(&vals)
  };
  let first_week_mean = mean_in(1..=FIRST_WEEK_LAST_DAY)?;
  let last_week_mean = mean_in(LAST_WEEK_FIRST_DAY..=31)?;
  if (first_week_mean - last_week_mean).abs() <= daily_mean * SEASONALITY_GAP_RATIO {
    return None;
  }
  Some(Seasonality {
    heavier: if first_week_mean > last_week_mean {
      MonthEdge::FirstWeek
    } else {
      MonthEdge::LastWeek
    },
    first_week_mean,
    last_week_mean,
    gap_pct: stats::percent_change(last_week_mean, first_week_mean)?,
  })
}

/// How much of the volume the leading categories hold. `shares` must be
/// sorted largest first, as `aggregate::share_of` returns them.
pub fn concentration(shares: &[CategoryShare]) -> Option<Concentration> {
  let leader = shares.first()?.clone();
  let trailer = shares.last()?.clone();
  let top3_share: f64 = shares.iter().take(3).map(|s| s.share).sum();
  let class = if leader.share > DOMINANT_SHARE_PCT {
    ConcentrationClass::Dominant
  } else if leader.share > CONCENTRATED_SHARE_PCT {
    ConcentrationClass::Concentrated
  } else {
    ConcentrationClass::Balanced
  };
  let leader_to_trailer = if trailer.count == 0 {
    0.0
  } else {
    leader.count as f64 / trailer.count as f64
  };
  Some(Concentration {
    class,
    top3_share,
    top_heavy: top3_share > TOP_HEAVY_PCT,
    leader_to_trailer,
    leader,
    trailer,
  })
}
