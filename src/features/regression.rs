/// Least-squares slope of `values` against their index `0..n`.
///
/// Returns `None` for fewer than two points.
pub fn index_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let count = n as f64;
    let mean_x = (count - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / count;
    let mut covariance = 0.0;
    let mut variance = 0.0;
    for (idx, &y) in values.iter().enumerate() {
        let dx = idx as f64 - mean_x;
        covariance += dx * (y - mean_y);
        variance += dx * dx;
    }
    Some(covariance / variance)
}

/// Slope of the straight line through two points.
pub fn two_point_slope(x0: f64, y0: f64, x1: f64, y1: f64) -> Option<f64> {
    let run = x1 - x0;
    if run == 0.0 {
        return None;
    }
    Some((y1 - y0) / run)
}
