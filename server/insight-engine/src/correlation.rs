//! Cross-category correlation over daily counts.
//!
//! Builds a date × category matrix (missing combinations count as zero) and
//! reports the category pairs whose Pearson coefficient crosses either
//! cutoff. Pairs in between are not reported.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::Config;
use crate::stats;
use crate::types::{CorrelationPair, CorrelationScan, Outcome, Record, Relation};

/// Daily count columns keyed by category, each aligned to `dates`.
struct Matrix<'a> {
  dates: Vec<NaiveDate>,
  columns: BTreeMap<&'a str, Vec<f64>>,
}

fn build_matrix<'a>(records: &[&'a Record]) -> Matrix<'a> {
  let dates: Vec<NaiveDate> = records
    .iter()
    .map(|r| r.timestamp)
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect();
  let row: BTreeMap<NaiveDate, usize> = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

  let mut columns: BTreeMap<&'a str, Vec<f64>> = BTreeMap::new();
  for r in records {
    let column = columns
      .entry(r.category.as_str())
      .or_insert_with(|| vec![0.0; dates.len()]);
    if let Some(&i) = row.get(&r.timestamp) {
      column[i] += 1.0;
    }
  }
  Matrix { dates, columns }
}

/// Pairwise scan over every category in the view.
///
/// Pairs are emitted with `left < right` by name, in category order, so the
/// output is stable for a given input.
pub fn category_correlation(records: &[&Record], config: &Config) -> Outcome<CorrelationScan> {
  if records.is_empty() {
    return Outcome::NoData;
  }
  let matrix = build_matrix(records);
  let categories = matrix.columns.len();
  if categories < 2 {
    return Outcome::InsufficientData {
      required: 2,
      available: categories,
    };
  }
  if matrix.dates.len() < 2 {
    return Outcome::InsufficientData {
      required: 2,
      available: matrix.dates.len(),
    };
  }

  let names: Vec<(&&str, &Vec<f64>)> = matrix.columns.iter().collect();
  let mut pairs = Vec::new();
  for (i, (left, xs)) in names.iter().enumerate() {
    for (right, ys) in &names[i + 1..] {
      // Constant columns have no defined coefficient.
      let Some(coefficient) = stats::pearson(xs, ys) else {
        continue;
      };
      let relation = if coefficient < config.competing_correlation {
        Relation::Competing
      } else if coefficient > config.co_moving_correlation {
        Relation::CoMoving
      } else {
        continue;
      };
      pairs.push(CorrelationPair {
        left: left.to_string(),
        right: right.to_string(),
        coefficient,
        relation,
      });
    }
  }

  tracing::debug!(categories, dates = matrix.dates.len(), reported = pairs.len(), "correlation scan");
  Outcome::Ready(CorrelationScan {
    categories,
    dates: matrix.dates.len(),
    pairs,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn records_from(columns: &[(&str, &[u64])]) -> Vec<Record> {
    let mut out = Vec::new();
    for (category, counts) in columns {
      for (i, &n) in counts.iter().enumerate() {
        let date = NaiveDate::from_ymd_opt(2024, 9, i as u32 + 1).unwrap();
        for _ in 0..n {
          out.push(Record::new(date, *category));
        }
      }
    }
    out
  }

  #[test]
  fn mirrored_series_compete() {
    // Deviations from the mean are exact negatives of each other.
    let records = records_from(&[("co", &[10, 20, 30, 20, 10]), ("pe", &[30, 20, 10, 20, 30])]);
    let refs: Vec<&Record> = records.iter().collect();
    let scan = category_correlation(&refs, &Config::default()).ready().unwrap();
    assert_eq!(scan.pairs.len(), 1);
    let pair = &scan.pairs[0];
    assert_eq!((pair.left.as_str(), pair.right.as_str()), ("co", "pe"));
    assert_eq!(pair.relation, Relation::Competing);
    assert!(pair.coefficient <= -0.99);
  }

  #[test]
  fn proportional_series_co_move() {
    let records = records_from(&[("co", &[1, 2, 3, 4]), ("mx", &[2, 4, 6, 8])]);
    let refs: Vec<&Record> = records.iter().collect();
    let scan = category_correlation(&refs, &Config::default()).ready().unwrap();
    assert_eq!(scan.pairs[0].relation, Relation::CoMoving);
    assert!(scan.pairs[0].coefficient > 0.99);
  }

  #[test]
  fn missing_dates_count_as_zero() {
    // "pe" only appears on the days "co" is absent.
    let records = records_from(&[("co", &[5, 0, 5, 0]), ("pe", &[0, 5, 0, 5])]);
    let refs: Vec<&Record> = records.iter().collect();
    let scan = category_correlation(&refs, &Config::default()).ready().unwrap();
    assert_eq!(scan.dates, 4);
    assert_eq!(scan.pairs[0].relation, Relation::Competing);
  }

  #[test]
  fn weak_and_constant_pairs_not_reported() {
    let records = records_from(&[
      ("co", &[1, 2, 3, 4]),
      ("pe", &[3, 3, 3, 3]),
      ("mx", &[2, 1, 1, 2]),
    ]);
    let refs: Vec<&Record> = records.iter().collect();
    let scan = category_correlation(&refs, &Config::default()).ready().unwrap();
    assert_eq!(scan.categories, 3);
    assert!(scan.pairs.is_empty());
  }

  #[test]
  fn needs_two_categories_and_two_dates() {
    let single_category = records_from(&[("co", &[1, 2, 3])]);
    let refs: Vec<&Record> = single_category.iter().collect();
    assert_eq!(
      category_correlation(&refs, &Config::default()),
      Outcome::InsufficientData { required: 2, available: 1 }
    );

    let single_date = records_from(&[("co", &[4]), ("pe", &[2])]);
    let refs: Vec<&Record> = single_date.iter().collect();
    assert_eq!(
      category_correlation(&refs, &Config::default()),
      Outcome::InsufficientData { required: 2, available: 1 }
    );

    assert_eq!(category_correlation(&[], &Config::default()), Outcome::NoData);
  }
}
