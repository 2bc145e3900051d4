use aus::spectrum;
use aus::WindowType;
use ndarray::{Array2, ArrayView1, Axis};
use tracing::warn;

use super::regression::index_slope;
use crate::config::{seconds_to_samples, AnalysisConfig};
use crate::types::{PitchTrack, Waveform};

const LOG_EPSILON: f64 = 1e-10;

/// Per-voiced-frame spectral tilt plus the data-quality observations made on the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TiltOutcome {
    pub tilts: Vec<f64>,
    /// Spectrogram frames minus F0 frames before alignment.
    pub frame_difference: isize,
    /// Voiced frames dropped because their log spectrum was not finite.
    pub nonfinite_frames: usize,
}

/// F0 values stretched or cut to a spectrogram's frame count.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedF0 {
    pub values: Vec<f64>,
    pub difference: isize,
}

/// Magnitude STFT with frames along axis 0 and frequency bins along axis 1.
pub fn magnitude_spectrogram(waveform: &Waveform, window: usize, hop: usize) -> Array2<f64> {
    if waveform.samples.len() < window || window == 0 || hop == 0 {
        return Array2::zeros((0, 0));
    }
    let audio = waveform.to_f64();
    let stft = spectrum::rstft(&audio, window, hop, WindowType::Hanning);
    let (magnitude, _phase) = spectrum::complex_to_polar_rstft(&stft);
    array_from_frames(&magnitude)
}

fn array_from_frames(frames: &[Vec<f64>]) -> Array2<f64> {
    let rows = frames.len();
    let cols = frames.first().map_or(0, Vec::len);
    let mut matrix = Array2::zeros((rows, cols));
    for (mut row, frame) in matrix.outer_iter_mut().zip(frames) {
        for (cell, &value) in row.iter_mut().zip(frame) {
            *cell = value;
        }
    }
    matrix
}

/// Zero-pad or truncate `f0` to `frame_count` frames.
pub fn align_f0(f0: &[f64], frame_count: usize) -> AlignedF0 {
    let mut values: Vec<f64> = f0.iter().take(frame_count).copied().collect();
    values.resize(frame_count, 0.0);
    AlignedF0 {
        values,
        difference: frame_count as isize - f0.len() as isize,
    }
}

/// Slope of a linear fit to `20 * ln(|X| + eps)` over bin index.
///
/// `None` when the log spectrum has non-finite values.
pub fn frame_tilt(frame: ArrayView1<'_, f64>) -> Option<f64> {
    let log_magnitude: Vec<f64> = frame
        .iter()
        .map(|&m| 20.0 * (m + LOG_EPSILON).ln())
        .collect();
    if log_magnitude.iter().any(|v| !v.is_finite()) {
        return None;
    }
    index_slope(&log_magnitude)
}

/// Tilt of every spectrogram frame whose aligned F0 is voiced.
pub fn tilt_from_magnitude(
    magnitude: &Array2<f64>,
    f0: &[f64],
    voicing_threshold: f64,
    mismatch_tolerance: usize,
) -> TiltOutcome {
    let frame_count = magnitude.len_of(Axis(0));
    let aligned = align_f0(f0, frame_count);
    if aligned.difference.unsigned_abs() > mismatch_tolerance {
        warn!(
            "truncation/padding applied to F0 frames: {} frames",
            aligned.difference
        );
    }

    let mut outcome = TiltOutcome {
        frame_difference: aligned.difference,
        ..TiltOutcome::default()
    };
    for (frame, &f0_value) in magnitude.outer_iter().zip(aligned.values.iter()) {
        if f0_value <= voicing_threshold {
            continue;
        }
        match frame_tilt(frame) {
            Some(tilt) => outcome.tilts.push(tilt),
            None => outcome.nonfinite_frames += 1,
        }
    }
    if outcome.nonfinite_frames > 0 {
        warn!(
            "non-finite log magnitude in {} voiced frames",
            outcome.nonfinite_frames
        );
    }
    outcome
}

/// Spectral tilt over the voiced frames of `waveform`.
pub fn extract_spectral_tilt(
    waveform: &Waveform,
    track: &PitchTrack,
    config: &AnalysisConfig,
) -> TiltOutcome {
    let window = seconds_to_samples(config.window_secs, waveform.sample_rate).max(1);
    let hop = seconds_to_samples(config.hop_secs, waveform.sample_rate).max(1);
    let magnitude = magnitude_spectrogram(waveform, window, hop);
    tilt_from_magnitude(
        &magnitude,
        &track.f0_values(),
        config.voicing_threshold_hz,
        config.frame_mismatch_tolerance,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;

    fn sloped_spectrogram(frames: usize, bins: usize) -> Array2<f64> {
        Array2::from_shape_fn((frames, bins), |(_, bin)| (-(bin as f64) / 20.0).exp())
    }

    #[test]
    fn pads_short_f0_and_excludes_padded_frames() {
        let magnitude = sloped_spectrogram(104, 16);
        let f0 = vec![150.0; 100];
        let outcome = tilt_from_magnitude(&magnitude, &f0, 100.0, 50);
        assert_eq!(outcome.frame_difference, 4);
        assert_eq!(outcome.tilts.len(), 100);

        let aligned = align_f0(&f0, 104);
        assert_eq!(aligned.values.len(), 104);
        assert!(aligned.values[100..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn truncates_long_f0() {
        let aligned = align_f0(&[120.0, 130.0, 140.0], 2);
        assert_eq!(aligned.values, vec![120.0, 130.0]);
        assert_eq!(aligned.difference, -1);
    }

    #[test]
    fn tilt_matches_log_magnitude_slope() {
        // 20 * ln(exp(-bin / 20)) == -bin, so the slope is -1.
        let frame = Array1::from_iter((0..32).map(|bin| (-(bin as f64) / 20.0).exp()));
        assert_abs_diff_eq!(frame_tilt(frame.view()).unwrap(), -1.0, epsilon = 1e-6);
    }

    #[test]
    fn nonfinite_frames_are_counted_not_returned() {
        let mut magnitude = sloped_spectrogram(3, 8);
        magnitude[[1, 4]] = f64::NAN;
        let outcome = tilt_from_magnitude(&magnitude, &[200.0, 200.0, 200.0], 100.0, 50);
        assert_eq!(outcome.tilts.len(), 2);
        assert_eq!(outcome.nonfinite_frames, 1);
    }

    #[test]
    fn unvoiced_frames_are_skipped() {
        let magnitude = sloped_spectrogram(4, 8);
        let outcome = tilt_from_magnitude(&magnitude, &[0.0, 150.0, 100.0, 180.0], 100.0, 50);
        assert_eq!(outcome.tilts.len(), 2);
    }
}
