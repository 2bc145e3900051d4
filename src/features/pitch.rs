use std::panic::{catch_unwind, AssertUnwindSafe};

use anyhow::{anyhow, ensure, Result};
use pyin::{Framing, PYINExecutor};

use crate::config::{seconds_to_samples, AnalysisConfig};
use crate::types::{PitchFrame, PitchTrack, Waveform};

/// Candidate F0 resolution in semitones.
const PITCH_RESOLUTION: f64 = 0.1;
/// Fastest pitch movement the pYIN transition model allows, in octaves per second.
const MAX_TRANSITION_RATE: f64 = 35.92;

/// Source of per-frame F0 for a waveform.
///
/// The production tracker wraps pYIN; tests substitute synthetic tracks.
pub trait PitchTracker {
    fn track(&self, waveform: &Waveform) -> Result<PitchTrack>;
}

/// Sample-domain framing for pYIN at one sample rate.
///
/// Frames use the spectrogram's window and hop so pitch frame `k` covers the
/// same samples as spectrogram frame `k`. The YIN lag range is capped at one
/// period of the pitch floor so no candidate can fall below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyinGeometry {
    pub sample_rate: u32,
    pub frame_length: usize,
    pub win_length: usize,
    pub hop_length: usize,
}

impl PyinGeometry {
    pub fn new(
        sample_rate: u32,
        floor_hz: f64,
        ceiling_hz: f64,
        frame_secs: f64,
        hop_secs: f64,
    ) -> Result<Self> {
        ensure!(sample_rate > 0, "sample rate must be positive");
        ensure!(
            floor_hz > 0.0 && floor_hz < ceiling_hz,
            "pitch range must satisfy 0 < floor < ceiling (got {}..{})",
            floor_hz,
            ceiling_hz
        );
        let rate = sample_rate as f64;
        ensure!(
            ceiling_hz <= rate / 2.0,
            "pitch ceiling {} Hz is above the Nyquist frequency of {} Hz audio",
            ceiling_hz,
            sample_rate
        );

        let frame_length = seconds_to_samples(frame_secs, sample_rate);
        let hop_length = seconds_to_samples(hop_secs, sample_rate);
        ensure!(hop_length > 0, "hop of {} s is shorter than one sample", hop_secs);

        let longest_lag = (rate / floor_hz).floor() as usize;
        let win_length = (frame_length / 2).max(frame_length.saturating_sub(longest_lag));
        ensure!(
            win_length > 0,
            "analysis window of {} s is shorter than two samples",
            frame_secs
        );
        let shortest_lag = ((rate / ceiling_hz).floor() as usize).max(1);
        let max_lag = (frame_length - win_length).saturating_sub(1);
        ensure!(
            max_lag >= shortest_lag + 2,
            "analysis window of {} s cannot hold pitch periods of {}..{} Hz",
            frame_secs,
            floor_hz,
            ceiling_hz
        );

        let bins_per_semitone = (1.0 / PITCH_RESOLUTION).ceil() as usize;
        let pitch_bins =
            (12.0 * bins_per_semitone as f64 * (ceiling_hz / floor_hz).log2()).floor() as usize + 1;
        let semitones_per_hop = (MAX_TRANSITION_RATE * 12.0 * hop_length as f64 / rate).round() as usize;
        let transition_width = semitones_per_hop * bins_per_semitone + 1;
        ensure!(
            pitch_bins >= transition_width.max(2),
            "pitch range {}..{} Hz is too narrow for a {} s hop",
            floor_hz,
            ceiling_hz,
            hop_secs
        );

        Ok(Self {
            sample_rate,
            frame_length,
            win_length,
            hop_length,
        })
    }

    /// Centre of frame `index` in seconds.
    pub fn frame_centre(&self, index: usize) -> f64 {
        (index * self.hop_length) as f64 / self.sample_rate as f64
            + self.frame_length as f64 / (2.0 * self.sample_rate as f64)
    }
}

/// pYIN pitch tracker restricted to a speech F0 range.
#[derive(Debug, Clone)]
pub struct PyinTracker {
    pub floor_hz: f64,
    pub ceiling_hz: f64,
    pub frame_secs: f64,
    pub hop_secs: f64,
}

impl PyinTracker {
    pub fn new(floor_hz: f64, ceiling_hz: f64, frame_secs: f64, hop_secs: f64) -> Self {
        Self {
            floor_hz,
            ceiling_hz,
            frame_secs,
            hop_secs,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.pitch_floor_hz,
            config.pitch_ceiling_hz,
            config.window_secs,
            config.hop_secs,
        )
    }

    pub fn geometry(&self, sample_rate: u32) -> Result<PyinGeometry> {
        PyinGeometry::new(
            sample_rate,
            self.floor_hz,
            self.ceiling_hz,
            self.frame_secs,
            self.hop_secs,
        )
    }
}

impl PitchTracker for PyinTracker {
    fn track(&self, waveform: &Waveform) -> Result<PitchTrack> {
        let geometry = self.geometry(waveform.sample_rate)?;
        if waveform.samples.len() < geometry.frame_length {
            return Ok(PitchTrack::default());
        }
        let audio = waveform.to_f64();
        let (floor_hz, ceiling_hz) = (self.floor_hz, self.ceiling_hz);

        // pyin reports internal failures by panicking; keep them inside this clip.
        let (_timestamps, pitches, voiced_flags, _probabilities) =
            catch_unwind(AssertUnwindSafe(|| {
                let mut executor = PYINExecutor::<f64>::new(
                    floor_hz,
                    ceiling_hz,
                    geometry.sample_rate,
                    geometry.frame_length,
                    Some(geometry.win_length),
                    Some(geometry.hop_length),
                    Some(PITCH_RESOLUTION),
                );
                executor.pyin(&audio, f64::NAN, Framing::<f64>::Valid)
            }))
            .map_err(|_| anyhow!("pYIN failed on {} samples", audio.len()))?;

        let frames = pitches
            .iter()
            .zip(voiced_flags.iter())
            .enumerate()
            .map(|(index, (&pitch, &voiced))| PitchFrame {
                time: geometry.frame_centre(index),
                f0: if voiced && pitch.is_finite() && pitch > 0.0 {
                    pitch
                } else {
                    0.0
                },
            })
            .collect();
        Ok(PitchTrack::new(frames))
    }
}

/// Voiced-only F0 values (`f0 > threshold`) in their original order.
pub fn voiced_f0(track: &PitchTrack, threshold: f64) -> Vec<f64> {
    track
        .frames
        .iter()
        .filter(|frame| frame.f0 > threshold)
        .map(|frame| frame.f0)
        .collect()
}
