//! F0 delta: the local slope of the log-F0 contour.
//!
//! Two families are provided. The sliding-window delta fits a line over a
//! window centred on every step of the voiced contour. The extrema deltas
//! detect turning points of the contour and take the slope of the straight
//! line between each peak and the following valley (or vice versa).

use tracing::warn;

use super::regression::{index_slope, two_point_slope};

/// Sliding-window slopes of `ln(f0)` over voiced F0 values.
///
/// The window spans `[i - half_width, i + half_width]`, clipped to the series.
/// Fewer than two voiced values yield an empty series.
pub fn sliding_window_delta(voiced_f0: &[f64], half_width: usize, step: usize) -> Vec<f64> {
    if voiced_f0.len() < 2 {
        return Vec::new();
    }
    let log_f0 = log_contour(voiced_f0);
    let step = step.max(1);
    let len = log_f0.len();
    (0..len)
        .step_by(step)
        .filter_map(|i| {
            let start = i.saturating_sub(half_width);
            let end = (i + half_width + 1).min(len);
            index_slope(&log_f0[start..end])
        })
        .collect()
}

fn log_contour(voiced_f0: &[f64]) -> Vec<f64> {
    let log_f0: Vec<f64> = voiced_f0.iter().map(|f| f.ln()).collect();
    let nonfinite = log_f0.iter().filter(|v| !v.is_finite()).count();
    if nonfinite > 0 {
        warn!("non-finite values in log F0: {} values", nonfinite);
    }
    log_f0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremumKind {
    Max,
    Min,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremum {
    pub index: usize,
    pub value: f64,
    pub kind: ExtremumKind,
}

/// How candidate extrema are filtered before lines are fitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtremaFilter {
    /// Keep maxima above and minima below the mean of the contour.
    Baseline,
    /// Keep an extremum only if it differs from the previous extremum of
    /// the same type by at least this much (in log-F0).
    MinChange(f64),
}

/// Indices of strict local maxima; a flat top counts once, at its middle.
///
/// End points are never peaks.
pub fn find_peaks(values: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if values.len() < 3 {
        return peaks;
    }
    let last = values.len() - 1;
    let mut i = 1;
    while i < last {
        if values[i - 1] < values[i] {
            let mut ahead = i + 1;
            while ahead < last && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks
}

fn find_valleys(values: &[f64]) -> Vec<usize> {
    let negated: Vec<f64> = values.iter().map(|v| -v).collect();
    find_peaks(&negated)
}

/// Candidate extrema after `filter`, in time order.
pub fn filtered_extrema(log_f0: &[f64], filter: ExtremaFilter) -> Vec<Extremum> {
    let maxima = find_peaks(log_f0);
    let minima = find_valleys(log_f0);
    let mut extrema: Vec<Extremum> = match filter {
        ExtremaFilter::Baseline => {
            let baseline = log_f0.iter().sum::<f64>() / log_f0.len().max(1) as f64;
            let highs = maxima
                .into_iter()
                .filter(|&i| log_f0[i] > baseline)
                .map(|i| extremum(log_f0, i, ExtremumKind::Max));
            let lows = minima
                .into_iter()
                .filter(|&i| log_f0[i] < baseline)
                .map(|i| extremum(log_f0, i, ExtremumKind::Min));
            highs.chain(lows).collect()
        }
        ExtremaFilter::MinChange(threshold) => {
            let highs = significant_changes(log_f0, &maxima, threshold)
                .map(|i| extremum(log_f0, i, ExtremumKind::Max));
            let lows = significant_changes(log_f0, &minima, threshold)
                .map(|i| extremum(log_f0, i, ExtremumKind::Min));
            highs.chain(lows).collect()
        }
    };
    extrema.sort_by_key(|e| e.index);
    extrema
}

fn extremum(log_f0: &[f64], index: usize, kind: ExtremumKind) -> Extremum {
    Extremum {
        index,
        value: log_f0[index],
        kind,
    }
}

// The first extremum of each type has no predecessor and is never kept.
fn significant_changes<'a>(
    log_f0: &'a [f64],
    indices: &'a [usize],
    threshold: f64,
) -> impl Iterator<Item = usize> + 'a {
    indices
        .windows(2)
        .filter(move |pair| (log_f0[pair[1]] - log_f0[pair[0]]).abs() >= threshold)
        .map(|pair| pair[1])
}

/// Reduce each run of same-type extrema to its most extreme member.
pub fn collapse_runs(extrema: &[Extremum]) -> Vec<Extremum> {
    let mut kept: Vec<Extremum> = Vec::with_capacity(extrema.len());
    for &candidate in extrema {
        match kept.last_mut() {
            Some(last) if last.kind == candidate.kind => {
                let more_extreme = match candidate.kind {
                    ExtremumKind::Max => candidate.value > last.value,
                    ExtremumKind::Min => candidate.value < last.value,
                };
                if more_extreme {
                    *last = candidate;
                }
            }
            _ => kept.push(candidate),
        }
    }
    kept
}

/// Slopes of the lines joining consecutive extrema of opposite type.
pub fn connect_extrema(extrema: &[Extremum]) -> Vec<f64> {
    extrema
        .windows(2)
        .filter(|pair| pair[0].kind != pair[1].kind)
        .filter_map(|pair| {
            two_point_slope(
                pair[0].index as f64,
                pair[0].value,
                pair[1].index as f64,
                pair[1].value,
            )
        })
        .collect()
}

/// Extrema-to-extrema slopes of `ln(f0)` over voiced F0 values.
pub fn extrema_delta(voiced_f0: &[f64], filter: ExtremaFilter) -> Vec<f64> {
    if voiced_f0.len() < 3 {
        return Vec::new();
    }
    let log_f0 = log_contour(voiced_f0);
    let extrema = collapse_runs(&filtered_extrema(&log_f0, filter));
    connect_extrema(&extrema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn sliding_window_on_geometric_glide_is_constant() {
        // ln(f0) rises by 0.01 per frame.
        let f0: Vec<f64> = (0..30).map(|i| 150.0 * (0.01 * i as f64).exp()).collect();
        let deltas = sliding_window_delta(&f0, 5, 1);
        assert_eq!(deltas.len(), 30);
        for delta in deltas {
            assert_abs_diff_eq!(delta, 0.01, epsilon = 1e-9);
        }
    }

    #[test]
    fn sliding_window_respects_step() {
        let f0 = vec![200.0; 10];
        assert_eq!(sliding_window_delta(&f0, 5, 3).len(), 4);
    }

    #[test]
    fn sliding_window_needs_two_values() {
        assert!(sliding_window_delta(&[180.0], 5, 1).is_empty());
        assert!(sliding_window_delta(&[], 5, 1).is_empty());
    }

    #[test]
    fn zero_half_width_gives_no_slopes() {
        assert!(sliding_window_delta(&[180.0, 190.0, 200.0], 0, 1).is_empty());
    }

    #[test]
    fn peaks_handle_plateaus_and_edges() {
        assert_eq!(find_peaks(&[3.0, 1.0, 2.0, 2.0, 2.0, 1.0, 5.0]), vec![3]);
        assert_eq!(find_peaks(&[0.0, 1.0, 1.0, 2.0]), Vec::<usize>::new());
        assert_eq!(find_valleys(&[2.0, 1.0, 2.0, 0.0, 2.0]), vec![1, 3]);
    }

    #[test]
    fn collapse_keeps_most_extreme_of_each_run() {
        let extrema = vec![
            Extremum { index: 1, value: 1.0, kind: ExtremumKind::Max },
            Extremum { index: 3, value: 2.0, kind: ExtremumKind::Max },
            Extremum { index: 5, value: -1.0, kind: ExtremumKind::Min },
            Extremum { index: 7, value: -3.0, kind: ExtremumKind::Min },
            Extremum { index: 9, value: -2.0, kind: ExtremumKind::Min },
        ];
        let kept = collapse_runs(&extrema);
        assert_eq!(kept.len(), 2);
        assert_eq!((kept[0].index, kept[1].index), (3, 7));
        assert_abs_diff_eq!(connect_extrema(&kept)[0], -5.0 / 4.0);
    }

    #[test]
    fn same_type_neighbours_are_never_connected() {
        let extrema = vec![
            Extremum { index: 0, value: 1.0, kind: ExtremumKind::Max },
            Extremum { index: 2, value: 2.0, kind: ExtremumKind::Max },
            Extremum { index: 4, value: 0.0, kind: ExtremumKind::Min },
        ];
        let slopes = connect_extrema(&extrema);
        assert_eq!(slopes, vec![-1.0]);
    }

    #[test]
    fn baseline_filter_drops_shallow_turns() {
        // Zig-zag around ln(200) with one shallow wobble near the top.
        let f0 = [200.0, 240.0, 200.0, 160.0, 230.0, 228.0, 232.0, 200.0, 170.0, 200.0];
        let slopes = extrema_delta(&f0, ExtremaFilter::Baseline);
        assert!(!slopes.is_empty());
        for pair in slopes.windows(2) {
            assert!(pair[0].signum() != pair[1].signum(), "slopes must alternate");
        }
    }

    #[test]
    fn change_threshold_skips_first_and_small_changes() {
        let log_f0 = [0.0, 1.0, 0.0, 1.01, 0.0, 1.5, 0.0];
        let extrema = filtered_extrema(&log_f0, ExtremaFilter::MinChange(0.02));
        let maxima: Vec<usize> = extrema
            .iter()
            .filter(|e| e.kind == ExtremumKind::Max)
            .map(|e| e.index)
            .collect();
        assert_eq!(maxima, vec![5]);
    }
}
