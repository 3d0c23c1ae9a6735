/// Least-squares line over `(index, value)`, evaluated at each index.
///
/// A single point has no slope; it yields a flat two-point line so the
/// chart still has something to draw.
pub fn fit_linear_trend(series: &[f64]) -> Vec<f64> {
    match series {
        [] => Vec::new(),
        [only] => vec![*only, *only],
        _ => {
            let n = series.len() as f64;
            let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
            for (index, value) in series.iter().enumerate() {
                let x = index as f64;
                sum_x += x;
                sum_y += value;
                sum_xy += x * value;
                sum_xx += x * x;
            }

            let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x);
            let intercept = (sum_y - slope * sum_x) / n;
            (0..series.len())
                .map(|index| slope * index as f64 + intercept)
                .collect()
        }
    }
}

/// Slope of the fitted line; zero when fewer than two points.
pub fn trend_slope(fitted: &[f64]) -> f64 {
    match fitted {
        [first, second, ..] => second - first,
        _ => 0.0,
    }
}
