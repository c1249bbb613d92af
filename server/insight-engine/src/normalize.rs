//! Normalize inbound records and filters into canonical internal models.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Weekday};

use crate::error::AnalyticsError;
use crate::types::*;

/// Parse and validate every inbound record. The first failure names the
/// record index and field, e.g. `records[3].timestamp`.
pub fn normalize_records(raw: &[InboundRecord]) -> Result<Vec<Record>, AnalyticsError> {
  raw
    .iter()
    .enumerate()
    .map(|(i, r)| normalize_record(i, r))
    .collect()
}

fn normalize_record(index: usize, raw: &InboundRecord) -> Result<Record, AnalyticsError> {
  let missing = |field: &'static str| AnalyticsError::MissingField {
    record: index,
    field,
  };
  let invalid = |field: &'static str, reason: String| AnalyticsError::InvalidRecordValue {
    record: index,
    field,
    reason,
  };

  let timestamp = match raw.timestamp.as_deref().map(str::trim) {
    Some(s) if !s.is_empty() => parse_date(s).ok_or_else(|| AnalyticsError::UnparseableTimestamp {
      record: index,
      value: s.to_string(),
    })?,
    _ => return Err(missing("timestamp")),
  };

  let category = match raw.category.as_deref().map(str::trim) {
    Some(c) if !c.is_empty() => c.to_string(),
    _ => return Err(missing("category")),
  };

  let hour = match raw.hour {
    Some(h) if (0..=23).contains(&h) => Some(h as u8),
    Some(h) => return Err(invalid("hour", format!("{} is outside 0..=23", h))),
    None => None,
  };

  let day_of_week = match raw.day_of_week.as_deref().map(str::trim) {
    Some(d) if !d.is_empty() => Some(
      d.parse::<Weekday>()
        .map_err(|_| invalid("day_of_week", format!("unknown weekday {:?}", d)))?,
    ),
    _ => None,
  };

  let status = raw
    .status
    .as_deref()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_string);

  Ok(Record {
    timestamp,
    category,
    status,
    hour,
    day_of_week,
    size_remote: raw.size_remote,
    size_local: raw.size_local,
  })
}

/// Validate a filter selection.
pub fn normalize_filter(raw: &InboundFilter) -> Result<Filter, AnalyticsError> {
  let category = match raw.category.as_deref().map(str::trim) {
    None | Some("") => CategoryFilter::All,
    Some(c) if c.eq_ignore_ascii_case("all") => CategoryFilter::All,
    Some(c) => CategoryFilter::Only(c.to_string()),
  };

  let bound = |value: &Option<String>, name: &'static str| -> Result<Option<NaiveDate>, AnalyticsError> {
    match value.as_deref().map(str::trim) {
      None | Some("") => Ok(None),
      Some(s) => parse_date(s)
        .map(Some)
        .ok_or_else(|| AnalyticsError::invalid_filter(name, format!("unparseable date {:?}", s))),
    }
  };
  let from = bound(&raw.from, "from")?;
  let to = bound(&raw.to, "to")?;

  if let (Some(f), Some(t)) = (from, to) {
    if f > t {
      return Err(AnalyticsError::invalid_filter("from", "must not be after filter.to"));
    }
  }

  if let Some(m) = raw.month {
    if !(1..=12).contains(&m) {
      return Err(AnalyticsError::invalid_filter("month", "expected 1..=12"));
    }
  }

  Ok(Filter {
    category,
    from,
    to,
    month: raw.month,
  })
}

/// Calendar date of a timestamp, as written (no timezone shift).
pub fn parse_date(s: &str) -> Option<NaiveDate> {
  if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
    return Some(d);
  }
  for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
      return Some(dt.date());
    }
  }
  DateTime::parse_from_rfc3339(s)
    .ok()
    .map(|dt| dt.date_naive())
}
