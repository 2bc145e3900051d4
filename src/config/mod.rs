use std::fs;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

use crate::features::pitch::PyinGeometry;

/// Whole samples in `secs` at `sample_rate`, rounded to nearest.
pub fn seconds_to_samples(secs: f64, sample_rate: u32) -> usize {
    (secs * sample_rate as f64).round().max(0.0) as usize
}

/// Analysis parameters shared by every pipeline stage.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Audio is resampled to this rate before pitch tracking and STFT.
    pub target_sample_rate: u32,
    /// Frames with F0 at or below this value are unvoiced.
    pub voicing_threshold_hz: f64,
    pub pitch_floor_hz: f64,
    pub pitch_ceiling_hz: f64,
    pub window_secs: f64,
    pub hop_secs: f64,
    /// Frame-count difference between F0 and spectrogram that triggers a warning.
    pub frame_mismatch_tolerance: usize,
    pub delta_half_width: usize,
    pub delta_step: usize,
    pub extrema_change_threshold: f64,
    /// Also emit `f0_delta_thrline` and `f0_delta_thrchange` series.
    pub extrema_deltas: bool,
    pub condition_dirs: Vec<String>,
    pub tier_name: String,
    pub verification_threshold: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            voicing_threshold_hz: 100.0,
            pitch_floor_hz: 75.0,
            pitch_ceiling_hz: 500.0,
            window_secs: 0.03,
            hop_secs: 0.01,
            frame_mismatch_tolerance: 50,
            delta_half_width: 5,
            delta_step: 1,
            extrema_change_threshold: 0.02,
            extrema_deltas: false,
            condition_dirs: vec![
                "original".to_string(),
                "denoised".to_string(),
                "enhanced".to_string(),
            ],
            tier_name: "Phrases".to_string(),
            verification_threshold: 0.25,
        }
    }
}

impl AnalysisConfig {
    /// Defaults, or the JSON file at `path` layered over them.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let data = fs::read_to_string(p)
                    .with_context(|| format!("failed to read config file {:?}", p))?;
                Self::from_json(&data).with_context(|| format!("invalid config file {:?}", p))?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).context("failed to parse config JSON")?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.target_sample_rate > 0,
            "target_sample_rate must be positive"
        );
        ensure!(
            self.window_secs > 0.0 && self.hop_secs > 0.0,
            "window_secs and hop_secs must be positive"
        );
        PyinGeometry::new(
            self.target_sample_rate,
            self.pitch_floor_hz,
            self.pitch_ceiling_hz,
            self.window_secs,
            self.hop_secs,
        )
        .context("pitch tracking parameters are unusable")?;
        ensure!(self.delta_step > 0, "delta_step must be at least 1");
        ensure!(
            self.extrema_change_threshold >= 0.0,
            "extrema_change_threshold must be non-negative"
        );
        ensure!(!self.tier_name.is_empty(), "tier_name must not be empty");
        Ok(())
    }
}
