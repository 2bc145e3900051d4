use crate::types::Waveform;
use anyhow::{Context, Result};
use std::path::Path;

/// Write a waveform as 16-bit mono PCM WAV.
pub fn encode_audio<P: AsRef<Path>>(audio: &Waveform, path: P) -> Result<()> {
    let path = path.as_ref();

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

    for &sample in &audio.samples {
        let scaled = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(scaled)
            .with_context(|| format!("Failed to write sample to {}", path.display()))?;
    }
    writer
        .finalize()
        .with_context(|| format!("Failed to finalize WAV file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::encode_audio;
    use crate::types::Waveform;

    #[test]
    fn writes_mono_pcm_with_source_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let audio = Waveform::new(vec![0.0, 0.5, -0.5, 2.0], 22_050);
        encode_audio(&audio, &path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 22_050);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 16383, -16383, i16::MAX]);
    }
}
