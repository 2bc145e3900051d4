//! Cut annotated recordings into phrase clips.
//!
//! Annotation files (`*.auto.TextGrid`) are searched recursively. The audio
//! for `<dir>/<base>.auto.TextGrid` is `<audio_root>/<dir>/<base>.wav`, and
//! its phrases are written to
//! `<output_root>/<references|syntheses>/<category>/<base>_phrase_<n>.wav`
//! with `n` counting from 1.

pub mod textgrid;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::audio::decoder::decode_audio;
use crate::audio::encoder::encode_audio;
use crate::audio::slicer::{slice_millis, MillisSpan};
use crate::metadata::Source;
use crate::types::Waveform;

pub use textgrid::{parse_textgrid, Interval};

const TEXTGRID_SUFFIX: &str = ".auto.TextGrid";

/// Millisecond spans of each interval, in order.
pub fn phrase_spans(intervals: &[Interval]) -> Vec<MillisSpan> {
    intervals
        .iter()
        .map(|interval| MillisSpan::from_secs(interval.xmin, interval.xmax))
        .collect()
}

/// Write one clip per interval as `<base_name>_phrase_<n>.wav`.
pub fn export_phrases(
    audio: &Waveform,
    intervals: &[Interval],
    output_dir: &Path,
    base_name: &str,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    phrase_spans(intervals)
        .into_iter()
        .enumerate()
        .map(|(idx, span)| {
            let path = output_dir.join(format!("{base_name}_phrase_{}.wav", idx + 1));
            encode_audio(&slice_millis(audio, span), &path)?;
            Ok(path)
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentationSummary {
    pub annotations: usize,
    pub segmented: usize,
    pub phrases: usize,
    pub skipped_without_phrases: usize,
    pub skipped_without_audio: usize,
    pub skipped_without_source: usize,
}

impl SegmentationSummary {
    pub fn skipped(&self) -> usize {
        self.skipped_without_phrases + self.skipped_without_audio + self.skipped_without_source
    }
}

/// Segment every annotated recording under `textgrid_root`.
pub fn segment_directory(
    textgrid_root: &Path,
    audio_root: &Path,
    output_root: &Path,
    tier: &str,
) -> Result<SegmentationSummary> {
    let annotations = find_textgrids(textgrid_root)?;
    let mut summary = SegmentationSummary {
        annotations: annotations.len(),
        ..SegmentationSummary::default()
    };
    info!(
        root = %textgrid_root.display(),
        files = annotations.len(),
        "segmenting annotated recordings"
    );

    for (done, annotation) in annotations.iter().enumerate() {
        let content = fs::read_to_string(annotation)
            .with_context(|| format!("Failed to read {}", annotation.display()))?;
        let intervals = parse_textgrid(&content, tier);
        if intervals.is_empty() {
            info!(file = %annotation.display(), tier, "no phrases, skipping");
            summary.skipped_without_phrases += 1;
            continue;
        }

        let base_name = annotation_base_name(annotation);
        let relative_dir = annotation
            .parent()
            .and_then(|dir| dir.strip_prefix(textgrid_root).ok())
            .unwrap_or_else(|| Path::new(""));
        let audio_path = audio_root.join(relative_dir).join(format!("{base_name}.wav"));
        if !audio_path.is_file() {
            warn!(audio = %audio_path.display(), "matching audio not found, skipping");
            summary.skipped_without_audio += 1;
            continue;
        }

        let Some(source) = Source::from_path(annotation) else {
            warn!(file = %annotation.display(), "not under references or syntheses, skipping");
            summary.skipped_without_source += 1;
            continue;
        };
        let category = annotation
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let output_dir = output_root.join(source.dir_name()).join(&category);

        let audio = decode_audio(&audio_path)?;
        let written = export_phrases(&audio, &intervals, &output_dir, &base_name)?;
        summary.segmented += 1;
        summary.phrases += written.len();
        info!(
            "Segmenting {}: {}/{} ({} phrases)",
            category,
            done + 1,
            annotations.len(),
            written.len()
        );
    }
    Ok(summary)
}

fn annotation_base_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(TEXTGRID_SUFFIX)
        .map(str::to_string)
        .unwrap_or(name)
}

/// All `*.auto.TextGrid` files under `root`, sorted by path.
pub fn find_textgrids(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries =
            fs::read_dir(&dir).with_context(|| format!("Failed to list {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().ends_with(TEXTGRID_SUFFIX))
            {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}
