pub mod delta;
pub mod pitch;
pub mod regression;
pub mod spectral_tilt;
pub mod syllables;

use anyhow::Result;

use crate::config::AnalysisConfig;
use crate::types::{FeatureKind, FeatureSeries, PitchTrack, SyllableBounds, Waveform};

use delta::ExtremaFilter;
use pitch::{voiced_f0, PitchTracker};

/// Everything extracted from one clip.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub series: Vec<FeatureSeries>,
    /// Spectrogram frames minus pitch frames before alignment.
    pub frame_difference: isize,
    pub nonfinite_frames: usize,
    pub voiced_frames: usize,
}

impl ExtractionOutcome {
    pub fn series(&self, kind: FeatureKind) -> Option<&FeatureSeries> {
        self.series.iter().find(|series| series.kind == kind)
    }
}

/// Runs the prosodic extractors over an analysis-rate waveform.
pub struct FeatureExtractor<T: PitchTracker> {
    tracker: T,
    config: AnalysisConfig,
}

impl<T: PitchTracker> FeatureExtractor<T> {
    pub fn new(tracker: T, config: AnalysisConfig) -> Self {
        Self { tracker, config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Track pitch, then derive every feature series from the same track.
    ///
    /// `syllables` of `None` leaves the syllable series empty.
    pub fn extract(
        &self,
        waveform: &Waveform,
        syllables: Option<&SyllableBounds>,
    ) -> Result<ExtractionOutcome> {
        let track = self.tracker.track(waveform)?;
        Ok(self.extract_with_track(waveform, &track, syllables))
    }

    pub fn extract_with_track(
        &self,
        waveform: &Waveform,
        track: &PitchTrack,
        syllables: Option<&SyllableBounds>,
    ) -> ExtractionOutcome {
        let threshold = self.config.voicing_threshold_hz;
        let f0 = voiced_f0(track, threshold);
        let f0_delta = delta::sliding_window_delta(
            &f0,
            self.config.delta_half_width,
            self.config.delta_step,
        );
        let tilt = spectral_tilt::extract_spectral_tilt(waveform, track, &self.config);
        let syllable_durations = syllables
            .map(|bounds| syllables::voiced_syllable_durations(bounds, track, threshold))
            .unwrap_or_default();

        let mut series = vec![
            FeatureSeries::new(FeatureKind::F0, f0.clone()),
            FeatureSeries::new(FeatureKind::F0Delta, f0_delta),
            FeatureSeries::new(FeatureKind::SpectralTilt, tilt.tilts),
            FeatureSeries::new(FeatureKind::SyllableDurations, syllable_durations),
        ];
        if self.config.extrema_deltas {
            series.push(FeatureSeries::new(
                FeatureKind::F0DeltaThrLine,
                delta::extrema_delta(&f0, ExtremaFilter::Baseline),
            ));
            series.push(FeatureSeries::new(
                FeatureKind::F0DeltaThrChange,
                delta::extrema_delta(
                    &f0,
                    ExtremaFilter::MinChange(self.config.extrema_change_threshold),
                ),
            ));
        }

        ExtractionOutcome {
            series,
            frame_difference: tilt.frame_difference,
            nonfinite_frames: tilt.nonfinite_frames,
            voiced_frames: f0.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTracker(PitchTrack);

    impl PitchTracker for FixedTracker {
        fn track(&self, _waveform: &Waveform) -> Result<PitchTrack> {
            Ok(self.0.clone())
        }
    }

    fn tone(seconds: f64) -> Waveform {
        let rate = 16_000;
        let samples = (0..(seconds * rate as f64) as usize)
            .map(|i| (2.0 * std::f32::consts::PI * 200.0 * i as f32 / rate as f32).sin() * 0.5)
            .collect();
        Waveform::new(samples, rate)
    }

    #[test]
    fn extracts_core_series_in_order() {
        let track = PitchTrack::from_f0(&[200.0; 50], 0.01);
        let extractor = FeatureExtractor::new(FixedTracker(track), AnalysisConfig::default());
        let outcome = extractor.extract(&tone(0.5), None).unwrap();
        let kinds: Vec<FeatureKind> = outcome.series.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, FeatureKind::CORE.to_vec());
        assert_eq!(outcome.voiced_frames, 50);
        assert!(outcome.series(FeatureKind::SyllableDurations).unwrap().is_empty());
        assert!(!outcome.series(FeatureKind::SpectralTilt).unwrap().is_empty());
    }

    #[test]
    fn extrema_series_follow_config() {
        let config = AnalysisConfig {
            extrema_deltas: true,
            ..AnalysisConfig::default()
        };
        let track = PitchTrack::from_f0(&[0.0; 10], 0.01);
        let extractor = FeatureExtractor::new(FixedTracker(track), config);
        let outcome = extractor.extract(&tone(0.1), None).unwrap();
        assert_eq!(outcome.series.len(), 6);
        assert!(outcome.series.iter().all(FeatureSeries::is_empty));
    }
}
