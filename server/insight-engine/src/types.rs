//! Core types for the insight engine (JSON contracts + internal models).

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;

use crate::config::Config;

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: what the caller sends)
// ---------------------------------------------------------------------------

/// One request on stdin: the consolidated records plus the user's selection.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
  pub records: Vec<InboundRecord>,
  #[serde(default)]
  pub filter: InboundFilter,
  #[serde(default)]
  pub config: Option<Config>,
}

/// One inbound log record. Every field is optional here so validation can
/// name the precondition that failed. Unknown fields are silently ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundRecord {
  #[serde(default)]
  pub timestamp: Option<String>,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub hour: Option<i64>,
  #[serde(default)]
  pub day_of_week: Option<String>,
  #[serde(default)]
  pub size_remote: Option<u64>,
  #[serde(default)]
  pub size_local: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundFilter {
  /// "ALL" (any case), empty or absent selects every category.
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub from: Option<String>,
  #[serde(default)]
  pub to: Option<String>,
  #[serde(default)]
  pub month: Option<u32>,
}

// ---------------------------------------------------------------------------
// Internal normalized types
// ---------------------------------------------------------------------------

/// Canonical record after normalization + validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
  pub timestamp: NaiveDate,
  pub category: String,
  pub status: Option<String>,
  pub hour: Option<u8>,
  pub day_of_week: Option<Weekday>,
  pub size_remote: Option<u64>,
  pub size_local: Option<u64>,
}

impl Record {
  pub fn new(timestamp: NaiveDate, category: impl Into<String>) -> Self {
    Self {
      timestamp,
      category: category.into(),
      status: None,
      hour: None,
      day_of_week: None,
      size_remote: None,
      size_local: None,
    }
  }

  /// Success-like status, matched case-insensitively. None without a status.
  pub fn is_success(&self) -> Option<bool> {
    self
      .status
      .as_ref()
      .map(|s| s.to_ascii_lowercase().contains("success"))
  }
}

/// Record fields an analysis may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
  Timestamp,
  Category,
  Status,
  Hour,
  DayOfWeek,
  SizeRemote,
  SizeLocal,
}

/// Capability set: which fields the loaded dataset actually carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldSet(BTreeSet<Field>);

impl FieldSet {
  pub fn insert(&mut self, field: Field) {
    self.0.insert(field);
  }

  pub fn contains(&self, field: Field) -> bool {
    self.0.contains(&field)
  }

  /// First field of `fields` that is absent, if any.
  pub fn first_missing(&self, fields: &[Field]) -> Option<Field> {
    fields.iter().copied().find(|f| !self.contains(*f))
  }
}

impl FromIterator<Field> for FieldSet {
  fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

// ---------------------------------------------------------------------------
// Filter selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
  #[default]
  All,
  Only(String),
}

impl CategoryFilter {
  pub fn matches(&self, category: &str) -> bool {
    match self {
      Self::All => true,
      Self::Only(c) => c == category,
    }
  }
}

impl Serialize for CategoryFilter {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Self::All => serializer.serialize_str("ALL"),
      Self::Only(c) => serializer.serialize_str(c),
    }
  }
}

/// Validated selection. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Filter {
  pub category: CategoryFilter,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub from: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub to: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub month: Option<u32>,
}

// ---------------------------------------------------------------------------
// Analysis outcome
// ---------------------------------------------------------------------------

/// Tagged result of one analysis: either a value or the reason there is none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome<T> {
  Ready(T),
  NoData,
  Skipped { missing: Field },
  InsufficientData { required: usize, available: usize },
  NotApplicable,
}

impl<T> Outcome<T> {
  pub fn is_ready(&self) -> bool {
    matches!(self, Self::Ready(_))
  }

  pub fn ready(self) -> Option<T> {
    match self {
      Self::Ready(v) => Some(v),
      _ => None,
    }
  }

  pub fn as_ready(&self) -> Option<&T> {
    match self {
      Self::Ready(v) => Some(v),
      _ => None,
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
    match self {
      Self::Ready(v) => Outcome::Ready(f(v)),
      Self::NoData => Outcome::NoData,
      Self::Skipped { missing } => Outcome::Skipped { missing },
      Self::InsufficientData { required, available } => {
        Outcome::InsufficientData { required, available }
      }
      Self::NotApplicable => Outcome::NotApplicable,
    }
  }
}

impl<T> From<Option<T>> for Outcome<T> {
  /// None maps to "not applicable" (zero denominator, degenerate statistic).
  fn from(value: Option<T>) -> Self {
    match value {
      Some(v) => Self::Ready(v),
      None => Self::NotApplicable,
    }
  }
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyCount {
  pub date: NaiveDate,
  pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
  pub category: String,
  pub count: u64,
  /// Percentage of the total, rounded to 2 decimals.
  pub share: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourCount {
  pub hour: u8,
  pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeekdayCount {
  pub weekday: Weekday,
  pub count: u64,
  /// Distinct dates in the view falling on this weekday.
  pub occurrences: usize,
  pub mean_per_occurrence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayOfMonthCount {
  pub day: u32,
  pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability {
  Steady,
  Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeClass {
  Controlled,
  Wide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayBalance {
  Rising,
  Balanced,
  Falling,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
  pub days: usize,
  pub mean: f64,
  pub std_dev: f64,
  pub max: DailyCount,
  pub min: DailyCount,
  pub coefficient_of_variation_pct: f64,
  pub stability: Stability,
  pub range_pct: f64,
  pub range: RangeClass,
  pub days_above_mean: usize,
  pub above_mean_pct: f64,
  pub balance: DayBalance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coverage {
  pub first: NaiveDate,
  pub last: NaiveDate,
  pub days_with_data: usize,
  pub days_in_range: usize,
  pub availability_pct: f64,
  pub missing_days: usize,
}

// ---------------------------------------------------------------------------
// Trends + forecast
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
  Growth,
  Stable,
  Decline,
}

/// First vs last value of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendChange {
  pub first: f64,
  pub last: f64,
  pub absolute_change: f64,
  pub percent_change: f64,
  pub direction: TrendDirection,
}

/// Mean of the leading segment vs mean of the trailing segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentChange {
  pub segment_len: usize,
  pub start_mean: f64,
  pub end_mean: f64,
  pub percent_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTrend {
  pub category: String,
  pub points: usize,
  pub mean_daily: f64,
  pub percent_change: f64,
  pub direction: TrendDirection,
  pub volatility_pct: f64,
  pub high_volatility: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
  /// Points actually used (at most the configured lookback).
  pub lookback: usize,
  pub first_half_mean: f64,
  pub second_half_mean: f64,
  pub delta_pct: f64,
  pub recent_mean: f64,
  pub projected: f64,
}

/// Forecast compared against the history of the weekday it lands on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastCheck {
  pub next_date: NaiveDate,
  pub next_weekday: Weekday,
  pub historical_mean: f64,
  pub gap_pct: f64,
  pub divergent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSection {
  pub forecast: Forecast,
  pub check: Outcome<ForecastCheck>,
}

// ---------------------------------------------------------------------------
// Anomalies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
  Peak,
  Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
  Moderate,
  High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
  pub date: NaiveDate,
  pub value: f64,
  pub delta: f64,
  pub delta_pct: f64,
  /// Distance from the mean in standard deviations.
  pub sigma: f64,
  pub kind: AnomalyKind,
  pub severity: Severity,
}

/// IQR outlier bounds and the indices of values outside them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IqrReport {
  pub q1: f64,
  pub q3: f64,
  pub iqr: f64,
  pub lower: f64,
  pub upper: f64,
  pub high: Vec<usize>,
  pub low: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowVolumeDay {
  pub date: NaiveDate,
  pub count: u64,
  pub share_of_mean_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySize {
  pub category: String,
  pub records: usize,
  pub mean_remote: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeSummary {
  pub records: usize,
  pub mean_remote: f64,
  pub mean_local: f64,
  pub compression_pct: Outcome<f64>,
  pub lower_bound: f64,
  pub upper_bound: f64,
  pub large_outliers: usize,
  pub small_outliers: usize,
  pub per_category: Vec<CategorySize>,
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
  Drop,
  Peak,
}

/// Rule-table cause attributed to a weekday pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CauseCode {
  WeekendLowActivity,
  WeekStartBacklog,
  WorkweekWindDown,
  RecurringSchedule,
  WeekendBacklogCarryOver,
  SecondBusinessDay,
  MidweekIntensive,
  WeeklyClose,
  ScheduledBatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternFinding {
  pub kind: PatternKind,
  pub subject: Weekday,
  /// Days of this weekday meeting the threshold.
  pub occurrences: usize,
  /// Days of this weekday in the view.
  pub total_occurrences: usize,
  /// occurrences / total_occurrences (0..1).
  pub consistency: f64,
  pub subject_mean: f64,
  pub baseline_mean: f64,
  /// Deviation of subject_mean from baseline_mean, in percent.
  pub magnitude_pct: f64,
  pub pronounced: bool,
  pub cause: CauseCode,
  pub dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekendLoad {
  High,
  Moderate,
  Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyShape {
  pub busiest: WeekdayCount,
  pub quietest: WeekdayCount,
  pub spread_pct: Outcome<f64>,
  pub high_variability: bool,
  pub weekend_total: u64,
  pub weekday_total: u64,
  pub weekend_load: WeekendLoad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPeriod {
  Night,
  Morning,
  Afternoon,
  Evening,
}

impl DayPeriod {
  pub const ALL: [DayPeriod; 4] = [Self::Night, Self::Morning, Self::Afternoon, Self::Evening];

  pub fn of_hour(hour: u8) -> Self {
    match hour {
      0..=5 => Self::Night,
      6..=11 => Self::Morning,
      12..=17 => Self::Afternoon,
      _ => Self::Evening,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodShare {
  pub period: DayPeriod,
  pub count: u64,
  pub share: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkdayProfile {
  BusinessHours,
  Balanced,
  OffHours,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecurringPeak {
  pub hour: u8,
  pub active_dates: usize,
  pub total_dates: usize,
  pub consistency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourProfile {
  pub counts: Vec<HourCount>,
  pub peak: HourCount,
  pub valley: HourCount,
  pub periods: Vec<PeriodShare>,
  pub busiest_period: DayPeriod,
  pub business_share_pct: f64,
  pub workday_profile: WorkdayProfile,
  pub peak_outside_business: bool,
  /// Quietest first.
  pub maintenance_windows: Vec<HourCount>,
  pub overnight_share_pct: f64,
  pub heavy_overnight: bool,
  pub recurring_peak: Option<RecurringPeak>,
  pub throughput_per_hour: f64,
  pub peak_hourly_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthProfile {
  EarlyMonthLoad,
  MidMonthPeak,
  LateMonthLoad,
  Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthEdge {
  FirstWeek,
  LastWeek,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Seasonality {
  pub heavier: MonthEdge,
  pub first_week_mean: f64,
  pub last_week_mean: f64,
  pub gap_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyShape {
  pub early: u64,
  pub mid: u64,
  pub late: u64,
  pub early_share: f64,
  pub mid_share: f64,
  pub late_share: f64,
  pub profile: MonthProfile,
  pub seasonality: Option<Seasonality>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationClass {
  Dominant,
  Concentrated,
  Balanced,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Concentration {
  pub leader: CategoryShare,
  pub trailer: CategoryShare,
  pub class: ConcentrationClass,
  pub top3_share: f64,
  pub top_heavy: bool,
  pub leader_to_trailer: f64,
}

// ---------------------------------------------------------------------------
// Correlation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
  Competing,
  CoMoving,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationPair {
  pub left: String,
  pub right: String,
  pub coefficient: f64,
  pub relation: Relation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationScan {
  pub categories: usize,
  pub dates: usize,
  pub pairs: Vec<CorrelationPair>,
}

// ---------------------------------------------------------------------------
// Report (JSON contract: what we emit)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
  pub total_records: usize,
  pub dataset_records: usize,
  pub categories: usize,
  pub days_with_data: usize,
  pub success_rate: Outcome<f64>,
  pub fields: FieldSet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySection {
  pub series: Vec<DailyCount>,
  pub moving_average: Vec<f64>,
  pub summary: DailySummary,
  pub coverage: Coverage,
  pub trend: Outcome<TrendChange>,
  pub anomalies: Vec<Anomaly>,
  /// An anomalous day under half the daily mean (likely failed load).
  pub suspected_failure: bool,
  /// An anomalous day over twice the daily mean (reprocessing or special load).
  pub suspected_reprocessing: bool,
  pub low_volume: Vec<LowVolumeDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySection {
  pub shares: Vec<CategoryShare>,
  pub concentration: Concentration,
  pub trends: Outcome<Vec<CategoryTrend>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdaySection {
  pub counts: Vec<WeekdayCount>,
  pub shape: WeeklyShape,
  pub drop_pattern: Option<PatternFinding>,
  pub peak_pattern: Option<PatternFinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarSection {
  pub by_day_of_month: Vec<DayOfMonthCount>,
  pub shape: MonthlyShape,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
  pub report_id: String,
  pub filter: Filter,
  pub overview: Outcome<Overview>,
  pub daily: Outcome<DailySection>,
  pub categories: Outcome<CategorySection>,
  pub weekdays: Outcome<WeekdaySection>,
  pub calendar: Outcome<CalendarSection>,
  pub hours: Outcome<HourProfile>,
  pub forecast: Outcome<ForecastSection>,
  pub sizes: Outcome<SizeSummary>,
  pub correlation: Outcome<CorrelationScan>,
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for an invalid request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}
