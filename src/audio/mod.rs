pub mod decoder;
pub mod encoder;
pub mod resample;
pub mod slicer;

use std::path::Path;

use anyhow::{Context, Result};

use crate::types::Waveform;

/// Decode `path` to mono and resample it to `target_rate` for analysis.
pub fn load_for_analysis(path: &Path, target_rate: u32) -> Result<Waveform> {
    let decoded = decoder::decode_audio(path)?;
    resample::resample_waveform(&decoded, target_rate)
        .with_context(|| format!("failed to resample {}", path.display()))
}
