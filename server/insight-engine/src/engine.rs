//! Core engine: runs every analysis over one filtered view and assembles the report.

use crate::aggregate;
use crate::anomaly;
use crate::config::Config;
use crate::correlation;
use crate::dataset::{Dataset, View};
use crate::error::AnalyticsError;
use crate::fingerprint;
use crate::pattern;
use crate::stats;
use crate::trend;
use crate::types::*;

/// The analytics engine. Stateless apart from its thresholds; the dataset is
/// passed in on every call.
#[derive(Debug, Clone, Default)]
pub struct Engine {
  config: Config,
}

impl Engine {
  pub fn new(config: Config) -> Self {
    Self { config }
  }

  pub fn with_defaults() -> Self {
    Self::new(Config::default())
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Analyze the records of `dataset` matching `filter`.
  ///
  /// A selection with no matching rows yields a report whose sections are
  /// all `no_data`; only an invalid configuration is an error.
  pub fn analyze(&self, dataset: &Dataset, filter: &Filter) -> Result<Report, AnalyticsError> {
    self.analyze_view(&dataset.view(filter), dataset.len())
  }

  /// Analyze an already-filtered view. `dataset_records` is the size of the
  /// dataset the view was taken from.
  pub fn analyze_view(&self, view: &View<'_>, dataset_records: usize) -> Result<Report, AnalyticsError> {
    self.config.validate()?;

    let records = view.records();
    let series = aggregate::daily_aggregate(records);
    let report_id = fingerprint::report_id(view.filter(), records.len(), &series);

    if view.is_empty() {
      tracing::info!(%report_id, "no records match the selection");
      return Ok(Report {
        report_id,
        filter: view.filter().clone(),
        overview: Outcome::NoData,
        daily: Outcome::NoData,
        categories: Outcome::NoData,
        weekdays: Outcome::NoData,
        calendar: Outcome::NoData,
        hours: Outcome::NoData,
        forecast: Outcome::NoData,
        sizes: Outcome::NoData,
        correlation: Outcome::NoData,
      });
    }

    let fields = view.fields();
    let values = aggregate::values(&series);

    let report = Report {
      overview: Outcome::Ready(self.overview(view, dataset_records, series.len())),
      daily: or_no_data(self.daily_section(&series, &values)),
      categories: or_no_data(self.category_section(records)),
      weekdays: match missing(fields, &[Field::DayOfWeek], "weekdays") {
        Some(missing) => Outcome::Skipped { missing },
        None => or_no_data(self.weekday_section(records, &series)),
      },
      calendar: or_no_data(calendar_section(records, &values)),
      hours: match missing(fields, &[Field::Hour], "hours") {
        Some(missing) => Outcome::Skipped { missing },
        None => or_no_data(pattern::hour_profile(records, view.distinct_dates(), &self.config)),
      },
      forecast: self.forecast_section(records, &series, &values, fields),
      sizes: match missing(fields, &[Field::SizeRemote, Field::SizeLocal], "sizes") {
        Some(missing) => Outcome::Skipped { missing },
        None => anomaly::size_summary(records, &self.config),
      },
      correlation: correlation::category_correlation(records, &self.config),
      report_id,
      filter: view.filter().clone(),
    };

    tracing::info!(
      report_id = %report.report_id,
      records = records.len(),
      days = series.len(),
      "analysis complete"
    );
    Ok(report)
  }

  fn overview(&self, view: &View<'_>, dataset_records: usize, days_with_data: usize) -> Overview {
    let fields = view.fields();
    let success_rate = match missing(fields, &[Field::Status], "success_rate") {
      Some(missing) => Outcome::Skipped { missing },
      None => aggregate::success_rate(view.records()).into(),
    };
    Overview {
      total_records: view.len(),
      dataset_records,
      categories: view.categories().len(),
      days_with_data,
      success_rate,
      fields: fields.clone(),
    }
  }

  fn daily_section(&self, series: &[DailyCount], values: &[f64]) -> Option<DailySection> {
    let c = &self.config;
    let summary = aggregate::daily_summary(series)?;
    let anomalies = anomaly::std_anomalies(series, c.anomaly_sigma, c.high_severity_sigma);
    Some(DailySection {
      series: series.to_vec(),
      moving_average: trend::moving_average(values, c.moving_average_window),
      coverage: aggregate::coverage(series)?,
      trend: trend::overall_trend(values, c.trend_threshold_pct),
      suspected_failure: anomaly::suspected_failure(&anomalies, summary.mean),
      suspected_reprocessing: anomaly::suspected_reprocessing(&anomalies, summary.mean),
      summary,
      anomalies,
      low_volume: anomaly::low_volume_alert(series, c.low_volume_fraction),
    })
  }

  fn category_section(&self, records: &[&Record]) -> Option<CategorySection> {
    let shares = aggregate::share_of(&aggregate::category_counts(records));
    Some(CategorySection {
      concentration: pattern::concentration(&shares)?,
      shares,
      trends: trend::category_trends(records, &self.config),
    })
  }

  fn weekday_section(&self, records: &[&Record], series: &[DailyCount]) -> Option<WeekdaySection> {
    let counts = aggregate::weekday_counts(records);
    let shape = pattern::weekly_shape(&counts)?;
    let weekdays = aggregate::date_weekdays(records);
    let drop_pattern = pattern::weekday_pattern(series, &weekdays, PatternKind::Drop, &self.config);
    let peak_pattern = pattern::weekday_pattern(series, &weekdays, PatternKind::Peak, &self.config);
    if let Some(p) = &drop_pattern {
      tracing::debug!(weekday = %p.subject, consistency = p.consistency, "recurring drop");
    }
    if let Some(p) = &peak_pattern {
      tracing::debug!(weekday = %p.subject, consistency = p.consistency, "recurring peak");
    }
    Some(WeekdaySection {
      counts,
      shape,
      drop_pattern,
      peak_pattern,
    })
  }

  fn forecast_section(
    &self,
    records: &[&Record],
    series: &[DailyCount],
    values: &[f64],
    fields: &FieldSet,
  ) -> Outcome<ForecastSection> {
    trend::short_horizon_forecast(values, self.config.forecast_lookback).map(|forecast| {
      let check = match missing(fields, &[Field::DayOfWeek], "forecast_check") {
        Some(missing) => Outcome::Skipped { missing },
        None => trend::forecast_check(
          series,
          &aggregate::date_weekdays(records),
          &forecast,
          self.config.forecast_divergence_ratio,
        ),
      };
      ForecastSection { forecast, check }
    })
  }
}

fn calendar_section(records: &[&Record], values: &[f64]) -> Option<CalendarSection> {
  let by_day_of_month = aggregate::day_of_month_counts(records);
  let shape = pattern::monthly_shape(&by_day_of_month, stats::mean(values)?)?;
  Some(CalendarSection {
    by_day_of_month,
    shape,
  })
}

/// First of `needed` the dataset does not carry.
fn missing(fields: &FieldSet, needed: &[Field], section: &str) -> Option<Field> {
  let field = fields.first_missing(needed);
  if let Some(field) = field {
    tracing::debug!(section, ?field, "skipped, field not present");
  }
  field
}

/// A section that could not be built from non-empty input has nothing to show.
fn or_no_data<T>(value: Option<T>) -> Outcome<T> {
  value.map_or(Outcome::NoData, Outcome::Ready)
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Datelike, Days, NaiveDate};

  fn start() -> NaiveDate {
    // A Monday.
    NaiveDate::from_ymd_opt(2024, 9, 2).unwrap()
  }

  /// Four weeks of traffic for two categories with quiet Sundays.
  fn weekly_dataset() -> Dataset {
    let mut records = Vec::new();
    for i in 0..28 {
      let date = start().checked_add_days(Days::new(i)).unwrap();
      let n = if date.weekday() == chrono::Weekday::Sun { 5 } else { 10 };
      for j in 0..n {
        let mut r = Record::new(date, if j % 2 == 0 { "co" } else { "pe" });
        r.day_of_week = Some(date.weekday());
        r.hour = Some((8 + j) as u8);
        r.status = Some(if j == 0 { "Failed".into() } else { "Success".into() });
        records.push(r);
      }
    }
    Dataset::new(records)
  }

  #[test]
  fn full_report_over_weekly_data() {
    let dataset = weekly_dataset();
    let report = Engine::with_defaults().analyze(&dataset, &Filter::default()).unwrap();
    assert!(report.report_id.starts_with("rpt-"));

    let overview = report.overview.ready().unwrap();
    assert_eq!(overview.total_records, dataset.len());
    assert_eq!(overview.categories, 2);
    assert_eq!(overview.days_with_data, 28);
    assert!(overview.success_rate.is_ready());

    let daily = report.daily.ready().unwrap();
    assert_eq!(daily.series.iter().map(|d| d.count).sum::<u64>() as usize, dataset.len());
    assert_eq!(daily.moving_average.len(), daily.series.len());

    let weekdays = report.weekdays.ready().unwrap();
    let drop = weekdays.drop_pattern.unwrap();
    assert_eq!(drop.subject, chrono::Weekday::Sun);
    assert_eq!(drop.cause, CauseCode::WeekendLowActivity);

    assert!(report.hours.is_ready());
    assert!(report.forecast.is_ready());
    assert_eq!(
      report.sizes,
      Outcome::Skipped {
        missing: Field::SizeRemote
      }
    );
    assert!(report.correlation.is_ready());
  }

  #[test]
  fn empty_selection_is_all_no_data() {
    let dataset = weekly_dataset();
    let filter = Filter {
      category: CategoryFilter::Only("zz".into()),
      ..Filter::default()
    };
    let report = Engine::with_defaults().analyze(&dataset, &filter).unwrap();
    assert_eq!(report.overview, Outcome::NoData);
    assert_eq!(report.daily, Outcome::NoData);
    assert_eq!(report.categories, Outcome::NoData);
    assert_eq!(report.weekdays, Outcome::NoData);
    assert_eq!(report.calendar, Outcome::NoData);
    assert_eq!(report.hours, Outcome::NoData);
    assert_eq!(report.forecast, Outcome::NoData);
    assert_eq!(report.sizes, Outcome::NoData);
    assert_eq!(report.correlation, Outcome::NoData);
  }

  #[test]
  fn missing_optional_fields_skip_their_analyses() {
    let records: Vec<Record> = (0..10)
      .map(|i| Record::new(start().checked_add_days(Days::new(i)).unwrap(), "co"))
      .collect();
    let dataset = Dataset::new(records);
    let report = Engine::with_defaults().analyze(&dataset, &Filter::default()).unwrap();

    assert_eq!(
      report.overview.ready().unwrap().success_rate,
      Outcome::Skipped { missing: Field::Status }
    );
    assert_eq!(report.weekdays, Outcome::Skipped { missing: Field::DayOfWeek });
    assert_eq!(report.hours, Outcome::Skipped { missing: Field::Hour });
    let forecast = report.forecast.ready().unwrap();
    assert_eq!(forecast.check, Outcome::Skipped { missing: Field::DayOfWeek });
    assert!(report.daily.is_ready());
    assert_eq!(
      report.correlation,
      Outcome::InsufficientData { required: 2, available: 1 }
    );
  }

  #[test]
  fn single_category_selection() {
    let dataset = weekly_dataset();
    let filter = Filter {
      category: CategoryFilter::Only("co".into()),
      ..Filter::default()
    };
    let report = Engine::with_defaults().analyze(&dataset, &filter).unwrap();
    let categories = report.categories.ready().unwrap();
    assert_eq!(categories.shares.len(), 1);
    assert_eq!(categories.shares[0].share, 100.0);
    assert_eq!(categories.concentration.class, ConcentrationClass::Dominant);
  }

  #[test]
  fn report_id_is_stable() {
    let dataset = weekly_dataset();
    let engine = Engine::with_defaults();
    let a = engine.analyze(&dataset, &Filter::default()).unwrap();
    let b = engine.analyze(&dataset, &Filter::default()).unwrap();
    assert_eq!(a.report_id, b.report_id);
    assert_eq!(a, b);
  }

  #[test]
  fn refined_view_matches_direct_filter() {
    let dataset = weekly_dataset();
    let engine = Engine::with_defaults();
    let september = Filter {
      month: Some(9),
      ..Filter::default()
    };
    let refined = dataset.all().refine(&september);
    let via_view = engine.analyze_view(&refined, dataset.len()).unwrap();
    let direct = engine.analyze(&dataset, &september).unwrap();
    assert_eq!(via_view, direct);
  }

  #[test]
  fn invalid_config_returns_error() {
    let engine = Engine::new(Config {
      moving_average_window: 0,
      ..Config::default()
    });
    let err = engine.analyze(&weekly_dataset(), &Filter::default()).unwrap_err();
    assert!(err.to_string().contains("moving_average_window"));
  }

  #[test]
  fn oversized_min_dates_rejected_before_analysis() {
    let records: Vec<Record> = (0..3)
      .map(|i| Record::new(start().checked_add_days(Days::new(i)).unwrap(), "co"))
      .collect();
    let engine = Engine::new(Config {
      category_trend_min_dates: usize::MAX,
      ..Config::default()
    });
    let err = engine.analyze(&Dataset::new(records), &Filter::default()).unwrap_err();
    assert_eq!(err.field().as_deref(), Some("config.category_trend_min_dates"));
  }

  #[test]
  fn failed_load_day_sets_failure_signal() {
    let mut records = Vec::new();
    for i in 0..21u64 {
      let date = start().checked_add_days(Days::new(i)).unwrap();
      let n = if i == 10 { 1 } else { 20 };
      for _ in 0..n {
        records.push(Record::new(date, "co"));
      }
    }
    let report = Engine::with_defaults().analyze(&Dataset::new(records), &Filter::default()).unwrap();
    let daily = report.daily.ready().unwrap();
    assert_eq!(daily.anomalies.len(), 1);
    assert!(daily.suspected_failure);
    assert!(!daily.suspected_reprocessing);
  }
}
