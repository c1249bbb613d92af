//! Stable report identifier.

use crate::types::{CategoryFilter, DailyCount, Filter};

/// Compute a stable id for one analysis pass.
///
/// Key components: the selection (category, bounds, month) plus the shape of
/// the selected data (record count and the daily series). Same dataset and
/// same filter always give the same id.
pub fn report_id(filter: &Filter, total_records: usize, series: &[DailyCount]) -> String {
  let mut hasher = blake3::Hasher::new();
  match &filter.category {
    CategoryFilter::All => hasher.update(b"*"),
    CategoryFilter::Only(c) => hasher.update(c.as_bytes()),
  };
  hasher.update(b"|");
  if let Some(from) = filter.from {
    hasher.update(from.to_string().as_bytes());
  }
  hasher.update(b"|");
  if let Some(to) = filter.to {
    hasher.update(to.to_string().as_bytes());
  }
  hasher.update(b"|");
  if let Some(month) = filter.month {
    hasher.update(&month.to_le_bytes());
  }
  hasher.update(b"|");
  hasher.update(&(total_records as u64).to_le_bytes());
  for d in series {
    hasher.update(b"|");
    hasher.update(d.date.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(&d.count.to_le_bytes());
  }

  let hex = hasher.finalize().to_hex();
  format!("rpt-{}", &hex[..16])
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::NaiveDate;

  fn series(counts: &[u64]) -> Vec<DailyCount> {
    counts
      .iter()
      .enumerate()
      .map(|(i, &count)| DailyCount {
        date: NaiveDate::from_ymd_opt(2024, 9, i as u32 + 1).unwrap(),
        count,
      })
      .collect()
  }

  #[test]
  fn same_input_same_id() {
    let f = Filter::default();
    assert_eq!(report_id(&f, 6, &series(&[1, 2, 3])), report_id(&f, 6, &series(&[1, 2, 3])));
  }

  #[test]
  fn different_category_different_id() {
    let all = Filter::default();
    let co = Filter {
      category: CategoryFilter::Only("co".into()),
      ..Filter::default()
    };
    let s = series(&[4, 4]);
    assert_ne!(report_id(&all, 8, &s), report_id(&co, 8, &s));
  }

  #[test]
  fn different_series_different_id() {
    let f = Filter::default();
    assert_ne!(report_id(&f, 5, &series(&[2, 3])), report_id(&f, 5, &series(&[3, 2])));
  }

  #[test]
  fn id_is_prefixed_16_hex_chars() {
    let id = report_id(&Filter::default(), 0, &[]);
    let hex = id.strip_prefix("rpt-").unwrap();
    assert_eq!(hex.len(), 16);
    assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
  }
}
