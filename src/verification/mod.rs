//! Same-speaker scoring for pairs of clips.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use aus::analysis;
use aus::analysis::mel::MelFilterbank;
use aus::spectrum;
use aus::WindowType;
use ndarray::Array1;
use serde::Serialize;
use tracing::{info, warn};

use crate::audio::load_for_analysis;
use crate::types::Waveform;

const WINDOW_MS: usize = 25;
const HOP_MS: usize = 10;
const MEL_BANDS: usize = 40;
const MFCC_COUNT: usize = 20;
const MIN_FREQ: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verification {
    pub score: f32,
    pub same_speaker: bool,
}

/// Decides whether two recordings share a speaker.
pub trait SpeakerVerifier {
    fn verify(&self, a: &Path, b: &Path) -> Result<Verification>;
}

/// Mean MFCC vector of a clip, without the energy coefficient.
pub fn mfcc_embedding(waveform: &Waveform) -> Result<Array1<f32>> {
    let rate = waveform.sample_rate;
    let fft_size = ((rate as usize * WINDOW_MS) / 1000).max(1);
    let hop_size = ((rate as usize * HOP_MS) / 1000).max(1);
    ensure!(
        waveform.samples.len() >= fft_size,
        "clip too short for an embedding: {} samples",
        waveform.samples.len()
    );

    let stft = spectrum::rstft(&waveform.to_f64(), fft_size, hop_size, WindowType::Hanning);
    let (magnitude, _) = spectrum::complex_to_polar_rstft(&stft);
    let power = analysis::make_power_spectrogram(&magnitude);
    let freqs = spectrum::rfftfreq(fft_size, rate);
    let filterbank = MelFilterbank::new(MIN_FREQ, rate as f64 / 2.0, MEL_BANDS, &freqs, true);
    let mel = analysis::mel::make_mel_spectrogram(&power, &filterbank);
    let mfcc = analysis::mel::mfcc_spectrogram(&mel, MFCC_COUNT, None);
    ensure!(!mfcc.is_empty(), "no MFCC frames");

    let mut sums = vec![0.0_f64; MFCC_COUNT.saturating_sub(1)];
    for frame in &mfcc {
        for (sum, value) in sums.iter_mut().zip(frame.iter().skip(1)) {
            *sum += value;
        }
    }
    let frames = mfcc.len() as f64;
    Ok(sums.into_iter().map(|s| (s / frames) as f32).collect())
}

pub fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
    let norm = a.dot(a).sqrt() * b.dot(b).sqrt();
    if norm <= f32::EPSILON {
        return 0.0;
    }
    a.dot(b) / norm
}

/// Cosine similarity of mean-MFCC embeddings against a fixed threshold.
pub struct MfccVerifier {
    threshold: f32,
    sample_rate: u32,
    cache: RefCell<HashMap<PathBuf, Array1<f32>>>,
}

impl MfccVerifier {
    pub fn new(threshold: f32, sample_rate: u32) -> Self {
        Self {
            threshold,
            sample_rate,
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn embedding(&self, path: &Path) -> Result<Array1<f32>> {
        if let Some(found) = self.cache.borrow().get(path) {
            return Ok(found.clone());
        }
        let waveform = load_for_analysis(path, self.sample_rate)?;
        let embedding = mfcc_embedding(&waveform)
            .with_context(|| format!("Failed to embed {}", path.display()))?;
        self.cache
            .borrow_mut()
            .insert(path.to_path_buf(), embedding.clone());
        Ok(embedding)
    }
}

impl SpeakerVerifier for MfccVerifier {
    fn verify(&self, a: &Path, b: &Path) -> Result<Verification> {
        let score = cosine_similarity(&self.embedding(a)?, &self.embedding(b)?);
        Ok(Verification {
            score,
            same_speaker: score >= self.threshold,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonKind {
    InternalBase,
    InternalValidation,
    CrossBaseValidation,
}

impl ComparisonKind {
    pub fn label(self) -> &'static str {
        match self {
            ComparisonKind::InternalBase => "internal_base",
            ComparisonKind::InternalValidation => "internal_validation",
            ComparisonKind::CrossBaseValidation => "cross_base_validation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairJob {
    pub file1: PathBuf,
    pub file2: PathBuf,
    pub comparison: ComparisonKind,
}

fn combinations(files: &[PathBuf], comparison: ComparisonKind) -> impl Iterator<Item = PairJob> + '_ {
    files.iter().enumerate().flat_map(move |(i, first)| {
        files[i + 1..].iter().map(move |second| PairJob {
            file1: first.clone(),
            file2: second.clone(),
            comparison,
        })
    })
}

/// Every pair within `base`, every pair within `validation`, then every
/// base clip against every validation clip.
pub fn plan_pairs(base: &[PathBuf], validation: &[PathBuf]) -> Vec<PairJob> {
    let cross = base.iter().flat_map(|first| {
        validation.iter().map(move |second| PairJob {
            file1: first.clone(),
            file2: second.clone(),
            comparison: ComparisonKind::CrossBaseValidation,
        })
    });
    combinations(base, ComparisonKind::InternalBase)
        .chain(combinations(validation, ComparisonKind::InternalValidation))
        .chain(cross)
        .collect()
}

/// Audio files (`wav`, `mp3`, `flac`) directly inside `dir`, sorted.
pub fn audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        let is_audio = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| matches!(ext.as_str(), "wav" | "mp3" | "flac"));
        if path.is_file() && is_audio {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationRow {
    pub file1: String,
    pub file2: String,
    pub score: f32,
    pub prediction: bool,
    pub comparison_type: &'static str,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Scored rows plus the pairs that could not be scored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationRun {
    pub rows: Vec<VerificationRow>,
    pub failed: usize,
}

/// Score every pair; a pair whose audio cannot be embedded is logged, counted and skipped.
pub fn run_pairs<V: SpeakerVerifier>(verifier: &V, pairs: &[PairJob]) -> VerificationRun {
    let mut run = VerificationRun {
        rows: Vec::with_capacity(pairs.len()),
        failed: 0,
    };
    for (done, pair) in pairs.iter().enumerate() {
        match verifier.verify(&pair.file1, &pair.file2) {
            Ok(result) => run.rows.push(VerificationRow {
                file1: file_name(&pair.file1),
                file2: file_name(&pair.file2),
                score: result.score,
                prediction: result.same_speaker,
                comparison_type: pair.comparison.label(),
            }),
            Err(err) => {
                warn!(
                    file1 = %pair.file1.display(),
                    file2 = %pair.file2.display(),
                    error = %err,
                    "verification failed, skipping pair"
                );
                run.failed += 1;
            }
        }
        if (done + 1) % 50 == 0 || done + 1 == pairs.len() {
            info!("Verifying pairs: {}/{}", done + 1, pairs.len());
        }
    }
    run
}

/// Write `file1,file2,score,prediction,comparison_type` rows.
pub fn write_results(path: &Path, rows: &[VerificationRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    struct NameVerifier;

    impl SpeakerVerifier for NameVerifier {
        fn verify(&self, a: &Path, b: &Path) -> Result<Verification> {
            let same = a.file_name().map(|n| n.len()) == b.file_name().map(|n| n.len());
            Ok(Verification {
                score: if same { 0.9 } else { 0.1 },
                same_speaker: same,
            })
        }
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn cosine_of_parallel_and_orthogonal_vectors() {
        assert_abs_diff_eq!(cosine_similarity(&array![1.0, 2.0], &array![2.0, 4.0]), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(cosine_similarity(&array![1.0, 0.0], &array![0.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&array![0.0, 0.0], &array![1.0, 1.0]), 0.0);
    }

    #[test]
    fn pairs_cover_internal_and_cross_comparisons() {
        let base = paths(&["a.wav", "b.wav", "c.wav"]);
        let validation = paths(&["x.mp3", "y.mp3"]);
        let pairs = plan_pairs(&base, &validation);
        let count = |kind: ComparisonKind| pairs.iter().filter(|p| p.comparison == kind).count();
        assert_eq!(count(ComparisonKind::InternalBase), 3);
        assert_eq!(count(ComparisonKind::InternalValidation), 1);
        assert_eq!(count(ComparisonKind::CrossBaseValidation), 6);
        assert_eq!(pairs[0].file1, PathBuf::from("a.wav"));
        assert_eq!(pairs[0].file2, PathBuf::from("b.wav"));
    }

    #[test]
    fn results_are_written_with_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verification.csv");
        let pairs = plan_pairs(&paths(&["dir/a.wav", "dir/b.wav"]), &paths(&["v/long.mp3"]));
        let run = run_pairs(&NameVerifier, &pairs);
        assert_eq!(run.failed, 0);
        write_results(&path, &run.rows).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "file1,file2,score,prediction,comparison_type");
        assert_eq!(lines[1], "a.wav,b.wav,0.9,true,internal_base");
        assert_eq!(lines[2], "a.wav,long.mp3,0.1,false,cross_base_validation");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn unreadable_pairs_are_skipped_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.wav");
        let broken = dir.path().join("broken.wav");
        let rate = 16_000;
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&good, spec).unwrap();
        for i in 0..rate {
            let t = i as f32 / rate as f32;
            let sample = 0.4 * (2.0 * std::f32::consts::PI * 200.0 * t).sin();
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
        fs::write(&broken, b"not audio").unwrap();

        let pairs = vec![
            PairJob {
                file1: good.clone(),
                file2: good.clone(),
                comparison: ComparisonKind::InternalBase,
            },
            PairJob {
                file1: good.clone(),
                file2: broken,
                comparison: ComparisonKind::CrossBaseValidation,
            },
        ];
        let run = run_pairs(&MfccVerifier::new(0.25, rate), &pairs);
        assert_eq!(run.failed, 1);
        assert_eq!(run.rows.len(), 1);
        assert!(run.rows[0].prediction);
    }

    #[test]
    fn identical_clips_score_one() {
        let rate = 16_000;
        let samples: Vec<f32> = (0..rate)
            .map(|i| {
                let t = i as f32 / rate as f32;
                0.4 * (2.0 * std::f32::consts::PI * 180.0 * t).sin()
                    + 0.2 * (2.0 * std::f32::consts::PI * 540.0 * t).sin()
            })
            .collect();
        let waveform = Waveform::new(samples, rate);
        let a = mfcc_embedding(&waveform).unwrap();
        let b = mfcc_embedding(&waveform).unwrap();
        assert_eq!(a.len(), MFCC_COUNT - 1);
        assert_abs_diff_eq!(cosine_similarity(&a, &b), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn short_clips_are_rejected() {
        assert!(mfcc_embedding(&Waveform::new(vec![0.0; 10], 16_000)).is_err());
    }
}
