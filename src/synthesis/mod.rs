//! Drive an external voice-cloning TTS engine over every pairing of
//! reference recording and text.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

/// One synthesis request: speak `text_path` in the voice of `reference`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisJob {
    pub reference: PathBuf,
    pub text_path: PathBuf,
    pub output: PathBuf,
}

/// A TTS engine that can clone the voice of a reference recording.
pub trait Synthesizer {
    fn synthesize(&self, text: &str, speaker_wav: &Path, output: &Path) -> Result<()>;
}

/// Files in `dir` with the given extension, sorted by name.
pub fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        let matches = path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension));
        if path.is_file() && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Pair every reference `*.wav` with every `*.txt`.
///
/// Outputs are named `xtts_{audio}_{text}.wav`.
pub fn plan_jobs(reference_dir: &Path, texts_dir: &Path, output_dir: &Path) -> Result<Vec<SynthesisJob>> {
    let references = files_with_extension(reference_dir, "wav")?;
    let texts = files_with_extension(texts_dir, "txt")?;
    let mut jobs = Vec::with_capacity(references.len() * texts.len());
    for reference in &references {
        for text_path in &texts {
            let output = output_dir.join(format!("xtts_{}_{}.wav", stem(reference), stem(text_path)));
            jobs.push(SynthesisJob {
                reference: reference.clone(),
                text_path: text_path.clone(),
                output,
            });
        }
    }
    Ok(jobs)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisSummary {
    pub planned: usize,
    pub synthesized: usize,
    pub existing: usize,
}

/// Run `jobs` in order. Existing outputs are kept unless `overwrite` is set.
pub fn run_jobs<S: Synthesizer>(synthesizer: &S, jobs: &[SynthesisJob], overwrite: bool) -> Result<SynthesisSummary> {
    let mut summary = SynthesisSummary {
        planned: jobs.len(),
        ..SynthesisSummary::default()
    };
    for (done, job) in jobs.iter().enumerate() {
        if !overwrite && job.output.exists() {
            summary.existing += 1;
            continue;
        }
        if let Some(parent) = job.output.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let text = fs::read_to_string(&job.text_path)
            .with_context(|| format!("Failed to read {}", job.text_path.display()))?;
        synthesizer
            .synthesize(&text, &job.reference, &job.output)
            .with_context(|| format!("Synthesis failed for {}", job.output.display()))?;
        summary.synthesized += 1;
        info!(
            reference = %stem(&job.reference),
            text = %stem(&job.text_path),
            "Synthesizing: {}/{}",
            done + 1,
            jobs.len()
        );
    }
    Ok(summary)
}

/// Runs an external program once per job.
///
/// Arguments may contain `{text}`, `{speaker_wav}`, `{output}` and
/// `{language}` placeholders.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    pub program: String,
    pub args: Vec<String>,
    pub language: String,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            language: "en".to_string(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn render_args(&self, text: &str, speaker_wav: &Path, output: &Path) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{text}", text)
                    .replace("{speaker_wav}", &speaker_wav.to_string_lossy())
                    .replace("{output}", &output.to_string_lossy())
                    .replace("{language}", &self.language)
            })
            .collect()
    }
}

impl Synthesizer for CommandSynthesizer {
    fn synthesize(&self, text: &str, speaker_wav: &Path, output: &Path) -> Result<()> {
        let args = self.render_args(text.trim(), speaker_wav, output);
        let result = Command::new(&self.program)
            .args(&args)
            .output()
            .with_context(|| format!("Failed to launch {}", self.program))?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            warn!(program = %self.program, stderr = %stderr.trim(), "synthesis command failed");
            bail!("{} exited with {}", self.program, result.status);
        }
        if !output.exists() {
            bail!("{} did not write {}", self.program, output.display());
        }
        Ok(())
    }
}
