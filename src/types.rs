//! Core types for the prosody analysis pipeline

use serde::{Deserialize, Serialize};

/// Decoded mono audio (f32 samples in [-1.0, 1.0])
#[derive(Debug, Clone)]
pub struct Waveform {
    pub samples: Vec<f32>,
    /// Sample rate in Hz (16 kHz once resampled for analysis)
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn to_f64(&self) -> Vec<f64> {
        self.samples.iter().map(|&s| s as f64).collect()
    }
}

/// One pitch-tracker frame. Unvoiced frames carry `f0 == 0.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchFrame {
    pub time: f64, // seconds
    pub f0: f64,   // Hz
}

/// Per-frame F0 produced by a pitch tracker over one waveform
#[derive(Debug, Clone, Default)]
pub struct PitchTrack {
    pub frames: Vec<PitchFrame>,
}

impl PitchTrack {
    pub fn new(frames: Vec<PitchFrame>) -> Self {
        Self { frames }
    }

    /// Build a track from raw F0 values spaced `hop` seconds apart.
    pub fn from_f0(values: &[f64], hop: f64) -> Self {
        let frames = values
            .iter()
            .enumerate()
            .map(|(idx, &f0)| PitchFrame {
                time: idx as f64 * hop,
                f0,
            })
            .collect();
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn f0_values(&self) -> Vec<f64> {
        self.frames.iter().map(|frame| frame.f0).collect()
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.frames.iter().map(|frame| frame.time).collect()
    }

    /// True where the frame's F0 is above `threshold`.
    pub fn voiced_mask(&self, threshold: f64) -> Vec<bool> {
        self.frames.iter().map(|frame| frame.f0 > threshold).collect()
    }
}

/// The feature series the extractors produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    F0,
    F0Delta,
    SpectralTilt,
    SyllableDurations,
    #[serde(rename = "f0_delta_thrline")]
    F0DeltaThrLine,
    #[serde(rename = "f0_delta_thrchange")]
    F0DeltaThrChange,
}

impl FeatureKind {
    /// Series aggregated for every clip, in column order.
    pub const CORE: [FeatureKind; 4] = [
        FeatureKind::F0,
        FeatureKind::F0Delta,
        FeatureKind::SpectralTilt,
        FeatureKind::SyllableDurations,
    ];

    pub const ALL: [FeatureKind; 6] = [
        FeatureKind::F0,
        FeatureKind::F0Delta,
        FeatureKind::SpectralTilt,
        FeatureKind::SyllableDurations,
        FeatureKind::F0DeltaThrLine,
        FeatureKind::F0DeltaThrChange,
    ];

    /// Prefix used for stat column names.
    pub fn name(self) -> &'static str {
        match self {
            FeatureKind::F0 => "f0",
            FeatureKind::F0Delta => "f0_delta",
            FeatureKind::SpectralTilt => "spectral_tilt",
            FeatureKind::SyllableDurations => "syllable_durations",
            FeatureKind::F0DeltaThrLine => "f0_delta_thrline",
            FeatureKind::F0DeltaThrChange => "f0_delta_thrchange",
        }
    }

    /// Strictly positive series that get `_log_*` statistics.
    pub fn is_log_domain(self) -> bool {
        matches!(self, FeatureKind::F0 | FeatureKind::SyllableDurations)
    }

    /// Slope series that get `_abs_log_*` statistics.
    pub fn is_delta(self) -> bool {
        matches!(
            self,
            FeatureKind::F0Delta | FeatureKind::F0DeltaThrLine | FeatureKind::F0DeltaThrChange
        )
    }
}

/// A named numeric series for one phrase (or a pooled clip)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSeries {
    pub kind: FeatureKind,
    pub values: Vec<f64>,
}

impl FeatureSeries {
    pub fn new(kind: FeatureKind, values: Vec<f64>) -> Self {
        Self { kind, values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Syllable segmentation for a single clip, computed outside this crate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyllableBounds {
    pub durations: Vec<f64>,
    /// Boundary timestamps in seconds; syllable `j` spans `[bounds[j], bounds[j + 1])`.
    pub bounds: Vec<f64>,
}

/// Flat, insertion-ordered mapping from stat name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatRecord {
    entries: Vec<(String, f64)>,
}

impl StatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; overwriting keeps the original position.
    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        let key = key.into();
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| *value)
    }

    pub fn extend(&mut self, other: StatRecord) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_record_overwrite_keeps_position() {
        let mut record = StatRecord::new();
        record.insert("a", 1.0);
        record.insert("b", 2.0);
        record.insert("a", 3.0);
        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(record.get("a"), Some(3.0));
    }

    #[test]
    fn voiced_mask_uses_strict_threshold() {
        let track = PitchTrack::from_f0(&[0.0, 100.0, 100.5, 220.0], 0.01);
        assert_eq!(track.voiced_mask(100.0), vec![false, false, true, true]);
    }

    #[test]
    fn feature_kind_serializes_with_column_prefix() {
        let json = serde_json::to_string(&FeatureKind::F0DeltaThrLine).unwrap();
        assert_eq!(json, "\"f0_delta_thrline\"");
        let kind: FeatureKind = serde_json::from_str("\"syllable_durations\"").unwrap();
        assert_eq!(kind, FeatureKind::SyllableDurations);
    }
}
