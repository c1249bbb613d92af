//! Numeric helpers shared by the analyses. Every helper returns None instead
//! of dividing by zero.

/// Arithmetic mean; None for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
  if values.is_empty() {
    return None;
  }
  Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator); None below two points.
pub fn sample_std(values: &[f64]) -> Option<f64> {
  if values.len() < 2 {
    return None;
  }
  let m = mean(values)?;
  let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
  Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Coefficient of variation in percent; None when the mean is zero or σ is undefined.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
  let m = mean(values)?;
  if m == 0.0 {
    return None;
  }
  Some(sample_std(values)? / m * 100.0)
}

/// Quantile of an ascending slice with linear interpolation between ranks.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
  if sorted.is_empty() {
    return None;
  }
  let pos = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
  let lo = pos.floor() as usize;
  let hi = pos.ceil() as usize;
  let frac = pos - lo as f64;
  Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Pearson correlation; None on length mismatch, fewer than two points or zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
  if x.len() != y.len() || x.len() < 2 {
    return None;
  }
  let mx = mean(x)?;
  let my = mean(y)?;
  let mut cov = 0.0;
  let mut vx = 0.0;
  let mut vy = 0.0;
  for (a, b) in x.iter().zip(y) {
    cov += (a - mx) * (b - my);
    vx += (a - mx).powi(2);
    vy += (b - my).powi(2);
  }
  if vx == 0.0 || vy == 0.0 {
    return None;
  }
  Some((cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0))
}

/// `part / whole` as a percentage; None when whole is zero.
pub fn percent(part: f64, whole: f64) -> Option<f64> {
  if whole == 0.0 {
    return None;
  }
  Some(part / whole * 100.0)
}

/// Relative change from `from` to `to` in percent; None when `from` is zero.
pub fn percent_change(from: f64, to: f64) -> Option<f64> {
  percent(to - from, from)
}

pub fn round2(v: f64) -> f64 {
  (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mean_and_std() {
    let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
    assert_eq!(mean(&v), Some(5.0));
    // Sample σ of the classic example is sqrt(32/7).
    assert!((sample_std(&v).unwrap() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    assert_eq!(sample_std(&[3.0]), None);
    assert_eq!(mean(&[]), None);
  }

  #[test]
  fn quantile_interpolates() {
    let v = [1.0, 2.0, 3.0, 4.0];
    assert!((quantile(&v, 0.25).unwrap() - 1.75).abs() < 1e-12);
    assert!((quantile(&v, 0.75).unwrap() - 3.25).abs() < 1e-12);
    assert_eq!(quantile(&v, 0.0), Some(1.0));
    assert_eq!(quantile(&v, 1.0), Some(4.0));
  }

  #[test]
  fn pearson_extremes() {
    let a = [1.0, 2.0, 3.0, 4.0];
    let b = [2.0, 4.0, 6.0, 8.0];
    let c = [4.0, 3.0, 2.0, 1.0];
    assert!((pearson(&a, &b).unwrap() - 1.0).abs() < 1e-12);
    assert!((pearson(&a, &c).unwrap() + 1.0).abs() < 1e-12);
    assert_eq!(pearson(&a, &[5.0, 5.0, 5.0, 5.0]), None);
  }

  #[test]
  fn zero_denominators_are_none() {
    assert_eq!(percent(3.0, 0.0), None);
    assert_eq!(percent_change(0.0, 10.0), None);
    assert_eq!(coefficient_of_variation(&[0.0, 0.0]), None);
    assert_eq!(percent_change(100.0, 150.0), Some(50.0));
  }

  #[test]
  fn round2_rounds_half_away() {
    assert_eq!(round2(33.333), 33.33);
    assert_eq!(round2(66.666), 66.67);
  }
}
