//! Load-once dataset handle and the immutable filtered views taken from it.

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;

use crate::error::AnalyticsError;
use crate::normalize;
use crate::types::{Field, FieldSet, Filter, InboundRecord, Record};

/// Read-only record set shared by every analysis pass.
#[derive(Debug, Clone)]
pub struct Dataset {
  records: Vec<Record>,
  fields: FieldSet,
}

impl Dataset {
  /// Build from canonical records. An optional field counts as present when
  /// at least one record carries it.
  pub fn new(records: Vec<Record>) -> Self {
    let mut fields: FieldSet = [Field::Timestamp, Field::Category].into_iter().collect();
    for r in &records {
      if r.status.is_some() {
        fields.insert(Field::Status);
      }
      if r.hour.is_some() {
        fields.insert(Field::Hour);
      }
      if r.day_of_week.is_some() {
        fields.insert(Field::DayOfWeek);
      }
      if r.size_remote.is_some() {
        fields.insert(Field::SizeRemote);
      }
      if r.size_local.is_some() {
        fields.insert(Field::SizeLocal);
      }
    }
    tracing::debug!(records = records.len(), ?fields, "dataset loaded");
    Self { records, fields }
  }

  pub fn from_inbound(raw: &[InboundRecord]) -> Result<Self, AnalyticsError> {
    Ok(Self::new(normalize::normalize_records(raw)?))
  }

  pub fn records(&self) -> &[Record] {
    &self.records
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn fields(&self) -> &FieldSet {
    &self.fields
  }

  /// Distinct categories, ascending.
  pub fn categories(&self) -> Vec<&str> {
    let set: BTreeSet<&str> = self.records.iter().map(|r| r.category.as_str()).collect();
    set.into_iter().collect()
  }

  pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
    bounds(self.records.iter())
  }

  /// Unfiltered view over every record.
  pub fn all(&self) -> View<'_> {
    self.view(&Filter::default())
  }

  /// New view holding the records that match `filter`.
  pub fn view(&self, filter: &Filter) -> View<'_> {
    View {
      records: self.records.iter().filter(|r| matches(filter, r)).collect(),
      fields: &self.fields,
      filter: filter.clone(),
    }
  }
}

/// Immutable subset of a dataset's records.
#[derive(Debug, Clone)]
pub struct View<'a> {
  records: Vec<&'a Record>,
  fields: &'a FieldSet,
  filter: Filter,
}

impl<'a> View<'a> {
  pub fn records(&self) -> &[&'a Record] {
    &self.records
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn fields(&self) -> &FieldSet {
    self.fields
  }

  /// The selection this view was produced by.
  pub fn filter(&self) -> &Filter {
    &self.filter
  }

  /// Narrow this view further; the result holds records matching both selections.
  pub fn refine(&self, filter: &Filter) -> View<'a> {
    View {
      records: self
        .records
        .iter()
        .copied()
        .filter(|r| matches(filter, r))
        .collect(),
      fields: self.fields,
      filter: filter.clone(),
    }
  }

  /// Distinct categories, ascending.
  pub fn categories(&self) -> Vec<&'a str> {
    let set: BTreeSet<&'a str> = self.records.iter().map(|r| r.category.as_str()).collect();
    set.into_iter().collect()
  }

  pub fn distinct_dates(&self) -> usize {
    self
      .records
      .iter()
      .map(|r| r.timestamp)
      .collect::<BTreeSet<_>>()
      .len()
  }

  pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
    bounds(self.records.iter().copied())
  }
}

fn matches(filter: &Filter, record: &Record) -> bool {
  filter.category.matches(&record.category)
    && filter.from.map_or(true, |f| record.timestamp >= f)
    && filter.to.map_or(true, |t| record.timestamp <= t)
    && filter.month.map_or(true, |m| record.timestamp.month() == m)
}

fn bounds<'r>(records: impl Iterator<Item = &'r Record>) -> Option<(NaiveDate, NaiveDate)> {
  records.fold(None, |acc, r| match acc {
    None => Some((r.timestamp, r.timestamp)),
    Some((lo, hi)) => Some((lo.min(r.timestamp), hi.max(r.timestamp))),
  })
}
