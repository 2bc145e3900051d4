use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "prosodyzer",
    version,
    about = "Prosodic feature pipeline for infant- and adult-directed speech"
)]
pub struct Cli {
    /// JSON file overriding the default analysis parameters.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Cut annotated recordings into phrase clips.
    Segment(SegmentArgs),
    /// Extract feature series from phrase clips into a feature store.
    Extract(ExtractArgs),
    /// Aggregate a feature store into references.csv and syntheses.csv.
    Aggregate(AggregateArgs),
    /// Min-max scale every stat column of a table.
    Normalize(NormalizeArgs),
    /// Per-group kernel density curves for one stat column.
    Density(DensityArgs),
    /// Two-cluster Gaussian mixture of the stat tables, reported by register.
    Cluster(ClusterArgs),
    /// Synthesize every reference/text pairing with an external TTS command.
    Synthesize(SynthesizeArgs),
    /// Score same-speaker similarity for pairs of clips.
    Verify(VerifyArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SegmentArgs {
    /// Directory searched recursively for `*.auto.TextGrid` files.
    #[arg(long)]
    pub textgrids: PathBuf,
    /// Audio root mirroring the annotation directory layout.
    #[arg(long)]
    pub audio: PathBuf,
    /// Output root for phrase clips.
    #[arg(long)]
    pub output: PathBuf,
    /// Annotation tier holding phrases (defaults to the configured tier).
    #[arg(long)]
    pub tier: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Phrase root containing `references/` and `syntheses/`.
    #[arg(long)]
    pub phrases: PathBuf,
    /// Where to write the feature store (JSON).
    #[arg(long)]
    pub store: PathBuf,
    /// Syllable segmentation JSON keyed by clip stem.
    #[arg(long)]
    pub syllables: Option<PathBuf>,
    /// Also emit the extrema-based delta series.
    #[arg(long)]
    pub extrema_deltas: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AggregateArgs {
    /// Feature store written by `extract`.
    #[arg(long)]
    pub store: PathBuf,
    /// Directory receiving the stat tables.
    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct NormalizeArgs {
    /// Stat table to scale.
    pub input: PathBuf,
    /// Destination for the scaled table.
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct DensityArgs {
    /// Stat table to read.
    #[arg(long)]
    pub table: PathBuf,
    /// Stat column, e.g. `f0_log_std`.
    #[arg(long)]
    pub column: String,
    /// Destination CSV (`group,x,density`).
    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    /// Reference stat table.
    #[arg(long)]
    pub references: PathBuf,
    /// Synthesis stat table.
    #[arg(long)]
    pub syntheses: PathBuf,
    /// Directory receiving `clustering_results.txt` and `clustering_results.csv`.
    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct SynthesizeArgs {
    /// Reference recordings (`*.wav`) whose voices are cloned.
    #[arg(long)]
    pub references: PathBuf,
    /// Texts (`*.txt`) to speak.
    #[arg(long)]
    pub texts: PathBuf,
    /// Output directory for `xtts_{audio}_{text}.wav` files.
    #[arg(long)]
    pub output: PathBuf,
    /// Language passed through the `{language}` placeholder.
    #[arg(long, default_value = "en")]
    pub language: String,
    /// Re-synthesize outputs that already exist.
    #[arg(long)]
    pub overwrite: bool,
    /// TTS program to run for each job.
    #[arg(long)]
    pub program: String,
    /// Program arguments; `{text}`, `{speaker_wav}`, `{output}` and `{language}` are filled in.
    #[arg(last = true)]
    pub args: Vec<String>,
}

impl SynthesizeArgs {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.args.iter().any(|arg| arg.contains("{output}")),
            "synthesis arguments must include an {{output}} placeholder"
        );
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Clips compared with each other and with the validation set.
    #[arg(long)]
    pub base: PathBuf,
    /// Validation clips of other speakers.
    #[arg(long)]
    pub validation: PathBuf,
    /// Destination CSV.
    #[arg(long)]
    pub output: PathBuf,
    /// Similarity at or above which two clips count as the same speaker.
    #[arg(long)]
    pub threshold: Option<f32>,
}
