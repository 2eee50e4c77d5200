//! Small descriptive-statistics helpers shared by the aggregators.
//!
//! All helpers take already-filtered samples (no `NaN`) and return `None`
//! or `0.0` for degenerate input instead of propagating `NaN`.

#[allow(clippy::cast_precision_loss)]
fn len_f64(values: &[f64]) -> f64 {
    values.len() as f64
}

/// Arithmetic mean, `None` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / len_f64(values))
    }
}

/// Population standard deviation (`ddof = 0`); `0.0` for fewer than one
/// value.
#[must_use]
pub fn population_std(values: &[f64]) -> f64 {
    variance(values, 0).map_or(0.0, f64::sqrt)
}

/// Sample standard deviation (`ddof = 1`); `0.0` for fewer than two
/// values.
#[must_use]
pub fn sample_std(values: &[f64]) -> f64 {
    variance(values, 1).map_or(0.0, f64::sqrt)
}

fn variance(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    #[allow(clippy::cast_precision_loss)]
    let denom = (values.len() - ddof) as f64;
    Some(ss / denom)
}

/// Quantile with linear interpolation between closest ranks.
///
/// `sorted` must be ascending. Returns `None` for an empty slice.
#[must_use]
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (len_f64(sorted) - 1.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lower = pos.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let frac = pos - pos.floor();
    Some((sorted[upper] - sorted[lower]).mul_add(frac, sorted[lower]))
}

/// Pearson correlation of paired samples.
///
/// Returns `None` when fewer than two pairs exist or either side has zero
/// variance.
#[must_use]
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    let r = sxy / (sxx * syy).sqrt();
    r.is_finite().then_some(r)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
        assert!(close(mean(&[1.0, 2.0, 6.0]).unwrap(), 3.0));
    }

    #[test]
    fn std_variants() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(close(population_std(&values), 2.0));
        assert!(close(sample_std(&values), 2.138_089_935_299_395));
        assert!(close(sample_std(&[3.0]), 0.0));
        assert!(close(population_std(&[]), 0.0));
    }

    #[test]
    fn quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!(close(quantile(&sorted, 0.5).unwrap(), 2.5));
        assert!(close(quantile(&sorted, 0.95).unwrap(), 3.85));
        assert!(close(quantile(&sorted, 0.0).unwrap(), 1.0));
        assert!(close(quantile(&sorted, 1.0).unwrap(), 4.0));
        assert!(close(quantile(&[5.0], 0.95).unwrap(), 5.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn pearson_perfect_and_degenerate() {
        assert!(close(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap(), 1.0));
        assert!(close(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap(), -1.0));
        assert_eq!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(pearson(&[1.0], &[1.0]), None);
    }
}
