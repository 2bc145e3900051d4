//! Batch stages: extract features from phrase clips, then aggregate them
//! into per-clip stat tables.
//!
//! Phrase clips live under `<phrase_root>/<references|syntheses>/<condition>/`.
//! Extraction persists a [`FeatureStore`]; aggregation reads it back and
//! writes `references.csv` and `syntheses.csv`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::aggregate::Aggregator;
use crate::audio::load_for_analysis;
use crate::config::AnalysisConfig;
use crate::export::{ClipKey, FeatureRecord, FeatureStore, StatTable};
use crate::features::pitch::PitchTracker;
use crate::features::syllables::SyllableStore;
use crate::features::FeatureExtractor;
use crate::metadata::{FileMetadata, Source};
use crate::synthesis::files_with_extension;

pub const REFERENCES_TABLE: &str = "references.csv";
pub const SYNTHESES_TABLE: &str = "syntheses.csv";

/// Counters reported at the end of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub files: usize,
    pub records: usize,
    /// Clips whose audio could not be decoded.
    pub unreadable: usize,
    /// Clips with no entry in the syllable data.
    pub missing_syllables: usize,
    /// Clips whose F0 and spectrogram frame counts differed beyond tolerance.
    pub frame_mismatches: usize,
    pub nonfinite_frames: usize,
    /// Phrase entries the aggregator skipped as empty or degenerate.
    pub skipped_entries: usize,
}

/// Extract every feature series from every phrase clip under `phrase_root`.
pub fn extract_corpus<T: PitchTracker>(
    phrase_root: &Path,
    extractor: &FeatureExtractor<T>,
    syllables: Option<&SyllableStore>,
) -> Result<(FeatureStore, BatchSummary)> {
    let config = extractor.config();
    let mut store = FeatureStore::new();
    let mut summary = BatchSummary::default();

    for source in [Source::Reference, Source::Synthesis] {
        for condition in &config.condition_dirs {
            let dir = phrase_root.join(source.dir_name()).join(condition);
            if !dir.is_dir() {
                debug!(dir = %dir.display(), "no clips for condition");
                continue;
            }
            let files = files_with_extension(&dir, "wav")?;
            for (done, path) in files.iter().enumerate() {
                extract_clip(path, source, condition, extractor, syllables, &mut store, &mut summary);
                info!(
                    "Processing {} - {}: {}/{}",
                    source.dir_name(),
                    condition,
                    done + 1,
                    files.len()
                );
            }
        }
    }
    summary.records = store.len();
    Ok((store, summary))
}

fn extract_clip<T: PitchTracker>(
    path: &Path,
    source: Source,
    condition: &str,
    extractor: &FeatureExtractor<T>,
    syllables: Option<&SyllableStore>,
    store: &mut FeatureStore,
    summary: &mut BatchSummary,
) {
    let config = extractor.config();
    summary.files += 1;
    let meta = FileMetadata::parse(&path.to_string_lossy());

    let waveform = match load_for_analysis(path, config.target_sample_rate) {
        Ok(waveform) => waveform,
        Err(err) => {
            warn!(file = %path.display(), error = %err, "unreadable audio, skipping");
            summary.unreadable += 1;
            return;
        }
    };

    let bounds = syllables.and_then(|data| {
        let found = data.get(&meta.stem);
        if found.is_none() {
            warn!(file = %meta.stem, "no syllable data, syllable durations left empty");
            summary.missing_syllables += 1;
        }
        found
    });

    let outcome = match extractor.extract(&waveform, bounds) {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(file = %path.display(), error = %err, "pitch tracking failed, skipping");
            summary.unreadable += 1;
            return;
        }
    };
    if outcome.frame_difference.unsigned_abs() > config.frame_mismatch_tolerance {
        summary.frame_mismatches += 1;
    }
    summary.nonfinite_frames += outcome.nonfinite_frames;

    let clip = ClipKey {
        source,
        condition: condition.to_string(),
        base_file: meta.base_file.clone(),
        clip_name: meta.clip_name.clone(),
    };
    let phrase = meta.phrase.clone().unwrap_or_else(|| meta.stem.clone());
    for series in outcome.series {
        store.insert(FeatureRecord {
            clip: clip.clone(),
            phrase: phrase.clone(),
            series,
        });
    }
}

/// Stat tables for references and syntheses, one row per clip.
pub fn aggregate_store(store: &FeatureStore) -> (StatTable, StatTable, usize) {
    let mut aggregator = Aggregator::new();
    let mut references = StatTable::new();
    let mut syntheses = StatTable::new();

    let clips = store.by_clip();
    for (done, (clip, records)) in clips.iter().enumerate() {
        let record = aggregator.aggregate_clip(records.iter().map(|r| &r.series));
        match clip.source {
            Source::Reference => references.push(clip.clip_name.clone(), record),
            Source::Synthesis => syntheses.push(clip.clip_name.clone(), record),
        }
        debug!(clip = %clip.clip_name, "aggregated {}/{}", done + 1, clips.len());
    }
    (references, syntheses, aggregator.skipped())
}

/// Aggregate a saved feature store and write both tables to `output_dir`.
pub fn aggregate_to_csv(store_path: &Path, output_dir: &Path) -> Result<(Vec<PathBuf>, BatchSummary)> {
    let store = FeatureStore::load(store_path)?;
    let (references, syntheses, skipped) = aggregate_store(&store);

    let reference_path = output_dir.join(REFERENCES_TABLE);
    let synthesis_path = output_dir.join(SYNTHESES_TABLE);
    references
        .write_csv(&reference_path)
        .context("Failed to write reference table")?;
    syntheses
        .write_csv(&synthesis_path)
        .context("Failed to write synthesis table")?;
    info!(
        references = references.len(),
        syntheses = syntheses.len(),
        skipped,
        "aggregation finished"
    );

    let summary = BatchSummary {
        files: references.len() + syntheses.len(),
        records: store.len(),
        skipped_entries: skipped,
        ..BatchSummary::default()
    };
    Ok((vec![reference_path, synthesis_path], summary))
}

/// Load the analysis configuration used by every stage.
pub fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    AnalysisConfig::load(path).context("Failed to load analysis configuration")
}
