mod common;

use anyhow::Result;
use approx::assert_abs_diff_eq;
use ndarray::Axis;
use prosodyzer::aggregate::Aggregator;
use prosodyzer::config::AnalysisConfig;
use prosodyzer::features::delta::{extrema_delta, ExtremaFilter};
use prosodyzer::features::pitch::{voiced_f0, PitchTracker, PyinTracker};
use prosodyzer::features::spectral_tilt::magnitude_spectrogram;
use prosodyzer::features::FeatureExtractor;
use prosodyzer::types::{FeatureKind, PitchTrack, SyllableBounds, Waveform};

struct SyntheticTracker(Vec<f64>);

impl PitchTracker for SyntheticTracker {
    fn track(&self, _waveform: &Waveform) -> Result<PitchTrack> {
        Ok(PitchTrack::from_f0(&self.0, 0.01))
    }
}

#[test]
fn voiced_f0_keeps_frames_strictly_above_threshold_in_order() {
    let track = PitchTrack::from_f0(&[0.0, 180.0, 100.0, 99.0, 101.0, 250.0, 0.0], 0.01);
    assert_eq!(voiced_f0(&track, 100.0), vec![180.0, 101.0, 250.0]);
}

#[test]
fn constant_pitch_has_zero_spread_end_to_end() {
    let extractor = FeatureExtractor::new(
        SyntheticTracker(vec![150.0; 10]),
        AnalysisConfig::default(),
    );
    let outcome = extractor
        .extract(&common::tone(150.0, 0.1, 16_000), None)
        .unwrap();
    let f0 = outcome.series(FeatureKind::F0).unwrap();
    assert_eq!(f0.values, vec![150.0; 10]);

    let record = Aggregator::new().aggregate_clip(&outcome.series);
    assert_abs_diff_eq!(record.get("f0_std").unwrap(), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(record.get("f0_log_std").unwrap(), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(record.get("f0_delta_mean").unwrap(), 0.0, epsilon = 1e-12);
}

#[test]
fn syllables_follow_the_pitch_track() {
    let mut f0 = vec![0.0; 20];
    f0.extend(vec![200.0; 20]);
    let extractor = FeatureExtractor::new(SyntheticTracker(f0), AnalysisConfig::default());
    let bounds = SyllableBounds {
        durations: vec![0.2, 0.2],
        bounds: vec![0.0, 0.2, 0.4],
    };
    let outcome = extractor
        .extract(&common::tone(200.0, 0.4, 16_000), Some(&bounds))
        .unwrap();
    assert_eq!(
        outcome.series(FeatureKind::SyllableDurations).unwrap().values,
        vec![0.2]
    );
}

#[test]
fn extrema_slopes_alternate_in_sign() {
    let f0: Vec<f64> = (0..200)
        .map(|i| {
            let t = i as f64 / 100.0;
            200.0 * (0.2 * (2.0 * std::f64::consts::PI * 3.0 * t).sin()
                + 0.05 * (2.0 * std::f64::consts::PI * 11.0 * t).sin())
            .exp()
        })
        .collect();
    for filter in [ExtremaFilter::Baseline, ExtremaFilter::MinChange(0.02)] {
        let slopes = extrema_delta(&f0, filter);
        assert!(!slopes.is_empty());
        for pair in slopes.windows(2) {
            assert!(
                pair[0].signum() != pair[1].signum(),
                "adjacent extrema of the same type were connected"
            );
        }
    }
}

fn pseudo_noise(seconds: f32, sample_rate: u32) -> Waveform {
    let mut state: u32 = 0x2545_f491;
    let total = (sample_rate as f32 * seconds) as usize;
    let samples = (0..total)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 8) as f32 / (1u32 << 24) as f32 - 0.5
        })
        .collect();
    Waveform::new(samples, sample_rate)
}

#[test]
fn pyin_tracks_steady_tones_across_lengths() {
    let tracker = PyinTracker::from_config(&AnalysisConfig::default());
    for freq in [120.0, 200.0, 300.0] {
        for seconds in [0.6, 1.0] {
            let track = tracker
                .track(&common::tone(freq, seconds, 16_000))
                .unwrap();
            assert!(!track.is_empty());

            let mut voiced = voiced_f0(&track, 100.0);
            assert!(
                voiced.len() > track.len() / 2,
                "most frames of a {freq} Hz tone should be voiced"
            );
            voiced.sort_by(f64::total_cmp);
            let median = voiced[voiced.len() / 2];
            assert!(
                (median - freq as f64).abs() < freq as f64 * 0.1,
                "expected F0 near {freq} Hz, got {median}"
            );
        }
    }
}

#[test]
fn pyin_handles_noise_and_silence() {
    let tracker = PyinTracker::from_config(&AnalysisConfig::default());
    assert!(tracker.track(&pseudo_noise(2.0, 16_000)).is_ok());
    let silence = Waveform::new(vec![0.0; 16_000], 16_000);
    let track = tracker.track(&silence).unwrap();
    assert!(voiced_f0(&track, 100.0).is_empty());
}

#[test]
fn pitch_frames_share_the_spectrogram_grid() {
    let config = AnalysisConfig::default();
    let waveform = common::tone(200.0, 2.0, 16_000);
    let track = PyinTracker::from_config(&config).track(&waveform).unwrap();
    let magnitude = magnitude_spectrogram(&waveform, 480, 160);
    let spectrogram_frames = magnitude.len_of(Axis(0));
    assert!(
        spectrogram_frames.abs_diff(track.len()) <= 1,
        "pitch frames {} vs spectrogram frames {}",
        track.len(),
        spectrogram_frames
    );
    assert_abs_diff_eq!(track.frames[1].time - track.frames[0].time, 0.01, epsilon = 1e-12);

    let outcome = FeatureExtractor::new(PyinTracker::from_config(&config), config.clone())
        .extract(&waveform, None)
        .unwrap();
    assert!(outcome.frame_difference.unsigned_abs() <= 1);
    let tilts = outcome.series(FeatureKind::SpectralTilt).unwrap();
    assert!(tilts.values.len() + 2 >= outcome.voiced_frames);
}
