use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use prosodyzer::cli::{
    AggregateArgs, Cli, ClusterArgs, Command, DensityArgs, ExtractArgs, NormalizeArgs, SegmentArgs,
    SynthesizeArgs, VerifyArgs,
};
use prosodyzer::config::AnalysisConfig;
use prosodyzer::export::StatTable;
use prosodyzer::features::pitch::PyinTracker;
use prosodyzer::features::syllables::SyllableStore;
use prosodyzer::features::FeatureExtractor;
use prosodyzer::report::{cluster, density, normalize_table};
use prosodyzer::synthesis::{plan_jobs, run_jobs, CommandSynthesizer};
use prosodyzer::verification::{audio_files, plan_pairs, run_pairs, write_results, MfccVerifier};
use prosodyzer::{pipeline, segmentation};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = pipeline::load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Segment(args) => handle_segment(&args, &config),
        Command::Extract(args) => handle_extract(&args, config),
        Command::Aggregate(args) => handle_aggregate(&args),
        Command::Normalize(args) => handle_normalize(&args),
        Command::Density(args) => handle_density(&args),
        Command::Cluster(args) => handle_cluster(&args),
        Command::Synthesize(args) => handle_synthesize(&args),
        Command::Verify(args) => handle_verify(&args, &config),
    }
}

fn handle_segment(args: &SegmentArgs, config: &AnalysisConfig) -> Result<()> {
    let tier = args.tier.as_deref().unwrap_or(&config.tier_name);
    let summary =
        segmentation::segment_directory(&args.textgrids, &args.audio, &args.output, tier)?;
    println!(
        "Segmented {} of {} recordings into {} phrases ({} skipped)",
        summary.segmented,
        summary.annotations,
        summary.phrases,
        summary.skipped()
    );
    Ok(())
}

fn handle_extract(args: &ExtractArgs, mut config: AnalysisConfig) -> Result<()> {
    config.extrema_deltas |= args.extrema_deltas;
    let syllables = args
        .syllables
        .as_deref()
        .map(SyllableStore::load)
        .transpose()?;
    let extractor = FeatureExtractor::new(PyinTracker::from_config(&config), config);
    let (store, summary) =
        pipeline::extract_corpus(&args.phrases, &extractor, syllables.as_ref())?;
    store
        .save(&args.store)
        .context("Failed to save feature store")?;

    println!("Processed {} clips into {} series", summary.files, summary.records);
    println!(
        "Unreadable: {}, missing syllable data: {}, frame mismatches: {}, non-finite frames: {}",
        summary.unreadable,
        summary.missing_syllables,
        summary.frame_mismatches,
        summary.nonfinite_frames
    );
    println!("Feature store: {}", args.store.display());
    Ok(())
}

fn handle_aggregate(args: &AggregateArgs) -> Result<()> {
    let (written, summary) = pipeline::aggregate_to_csv(&args.store, &args.output)?;
    for path in &written {
        println!("Wrote {}", path.display());
    }
    println!("Empty data count: {}", summary.skipped_entries);
    Ok(())
}

fn handle_normalize(args: &NormalizeArgs) -> Result<()> {
    let table = StatTable::read_csv(&args.input)?;
    normalize_table(&table).write_csv(&args.output)?;
    println!("Normalized {} rows into {}", table.len(), args.output.display());
    Ok(())
}

fn handle_density(args: &DensityArgs) -> Result<()> {
    let table = StatTable::read_csv(&args.table)?;
    let curves = density::group_densities(&table, &args.column);
    density::write_density_csv(&args.output, &curves)?;
    println!(
        "Wrote {} density curves for {} to {}",
        curves.len(),
        args.column,
        args.output.display()
    );
    Ok(())
}

fn handle_cluster(args: &ClusterArgs) -> Result<()> {
    let mut reports = Vec::new();
    for (dataset, path) in [("Syntheses", &args.syntheses), ("References", &args.references)] {
        let table = StatTable::read_csv(path)?;
        for condition in cluster::CLUSTER_CONDITIONS {
            let report = cluster::cluster_table(&table, dataset, condition, &cluster::CLUSTER_FEATURES)
                .with_context(|| format!("Failed to cluster {dataset} ({condition})"))?;
            reports.extend(report);
        }
    }

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let text_path = args.output.join("clustering_results.txt");
    let csv_path = args.output.join("clustering_results.csv");
    cluster::write_text(&text_path, &reports)?;
    cluster::write_composition_csv(&csv_path, &reports)?;
    println!(
        "Clustered {} tables into {} and {}",
        reports.len(),
        text_path.display(),
        csv_path.display()
    );
    Ok(())
}

fn handle_synthesize(args: &SynthesizeArgs) -> Result<()> {
    args.validate()?;
    let jobs = plan_jobs(&args.references, &args.texts, &args.output)?;
    let synthesizer = CommandSynthesizer::new(args.program.clone(), args.args.clone())
        .with_language(args.language.clone());
    let summary = run_jobs(&synthesizer, &jobs, args.overwrite)?;
    println!(
        "Synthesized {} of {} jobs ({} already present)",
        summary.synthesized, summary.planned, summary.existing
    );
    Ok(())
}

fn handle_verify(args: &VerifyArgs, config: &AnalysisConfig) -> Result<()> {
    let base = audio_files(&args.base)?;
    let validation = audio_files(&args.validation)?;
    let pairs = plan_pairs(&base, &validation);
    let threshold = args.threshold.unwrap_or(config.verification_threshold);
    let verifier = MfccVerifier::new(threshold, config.target_sample_rate);
    let run = run_pairs(&verifier, &pairs);
    write_results(&args.output, &run.rows)?;
    let matches = run.rows.iter().filter(|row| row.prediction).count();
    println!(
        "Scored {} pairs ({} predicted same speaker, {} failed) into {}",
        run.rows.len(),
        matches,
        run.failed,
        args.output.display()
    );
    Ok(())
}
