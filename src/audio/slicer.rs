use crate::types::Waveform;

/// A phrase span in whole milliseconds, `[start_ms, end_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MillisSpan {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl MillisSpan {
    /// Truncates fractional milliseconds, the way the annotation times are read.
    pub fn from_secs(start: f64, end: f64) -> Self {
        Self {
            start_ms: (start.max(0.0) * 1000.0) as u64,
            end_ms: (end.max(0.0) * 1000.0) as u64,
        }
    }
}

/// Cut the samples covering `span`, clamped to the available audio.
pub fn slice_millis(audio: &Waveform, span: MillisSpan) -> Waveform {
    let rate = audio.sample_rate as u64;
    let total = audio.samples.len();
    let start = ((span.start_ms * rate / 1000) as usize).min(total);
    let end = ((span.end_ms * rate / 1000) as usize).clamp(start, total);
    Waveform::new(audio.samples[start..end].to_vec(), audio.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_at_millisecond_resolution() {
        let audio = Waveform::new((0..3000).map(|i| i as f32).collect(), 1000);
        let clip = slice_millis(&audio, MillisSpan::from_secs(1.5, 3.0));
        assert_eq!(clip.samples.len(), 1500);
        assert_eq!(clip.samples[0], 1500.0);
    }

    #[test]
    fn clamps_to_available_audio() {
        let audio = Waveform::new(vec![0.0; 1000], 1000);
        let clip = slice_millis(&audio, MillisSpan::from_secs(0.5, 2.0));
        assert_eq!(clip.samples.len(), 500);

        let past_end = slice_millis(&audio, MillisSpan::from_secs(1.5, 2.0));
        assert!(past_end.samples.is_empty());
    }
}
