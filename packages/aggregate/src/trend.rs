//! Linear trend of a per-district time series.

/// Fewer valid samples than this yields a flat trend.
pub const MIN_TREND_POINTS: usize = 3;

/// Ordinary least-squares slope of `value` against time-step index.
///
/// `NaN` entries are dropped but the remaining samples keep their original
/// index, so gaps widen the x spacing rather than being closed up. Returns
/// `0.0` when fewer than [`MIN_TREND_POINTS`] samples remain or the fit is
/// degenerate.
#[must_use]
pub fn linear_trend(series: &[f64]) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let valid: Vec<(f64, f64)> = series
        .iter()
        .enumerate()
        .filter(|(_, y)| !y.is_nan())
        .map(|(i, &y)| (i as f64, y))
        .collect();

    if valid.len() < MIN_TREND_POINTS {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let n = valid.len() as f64;
    let x_mean = valid.iter().map(|(x, _)| x).sum::<f64>() / n;
    let y_mean = valid.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (sxx, sxy) = valid.iter().fold((0.0, 0.0), |(sxx, sxy), (x, y)| {
        let dx = x - x_mean;
        (dx.mul_add(dx, sxx), dx.mul_add(y - y_mean, sxy))
    });

    if sxx <= 0.0 || !sxx.is_finite() {
        return 0.0;
    }

    let slope = sxy / sxx;
    if slope.is_finite() { slope } else { 0.0 }
}
