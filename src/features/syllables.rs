use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::{PitchTrack, SyllableBounds};

/// Syllable durations whose interval contains at least one voiced pitch frame.
///
/// Syllable `j` spans `[bounds[j], bounds[j + 1])`; a syllable without a closing
/// bound is ignored. Unvoiced syllables are dropped, not zeroed.
pub fn voiced_syllable_durations(
    syllables: &SyllableBounds,
    track: &PitchTrack,
    voicing_threshold: f64,
) -> Vec<f64> {
    syllables
        .durations
        .iter()
        .enumerate()
        .filter_map(|(j, &duration)| {
            let start = *syllables.bounds.get(j)?;
            let end = *syllables.bounds.get(j + 1)?;
            let voiced = track
                .frames
                .iter()
                .any(|frame| frame.time >= start && frame.time < end && frame.f0 > voicing_threshold);
            voiced.then_some(duration)
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(f64),
    Many(Vec<f64>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<f64> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SyllableEntry {
    syllable_durations: OneOrMany,
    bounds_t: OneOrMany,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoreFile {
    Wrapped {
        #[serde(rename = "SYLDURS")]
        syldurs: HashMap<String, SyllableEntry>,
    },
    Plain(HashMap<String, SyllableEntry>),
}

/// Externally computed syllable segmentations keyed by file stem.
#[derive(Debug, Clone, Default)]
pub struct SyllableStore {
    entries: HashMap<String, SyllableBounds>,
}

impl SyllableStore {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read syllable data {:?}", path))?;
        Self::from_json(&data).with_context(|| format!("invalid syllable data in {:?}", path))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: StoreFile =
            serde_json::from_str(raw).context("failed to parse syllable JSON")?;
        let raw_entries = match parsed {
            StoreFile::Wrapped { syldurs } => syldurs,
            StoreFile::Plain(entries) => entries,
        };
        let entries = raw_entries
            .into_iter()
            .map(|(stem, entry)| {
                (
                    stem,
                    SyllableBounds {
                        durations: entry.syllable_durations.into_vec(),
                        bounds: entry.bounds_t.into_vec(),
                    },
                )
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn insert(&mut self, stem: impl Into<String>, bounds: SyllableBounds) {
        self.entries.insert(stem.into(), bounds);
    }

    pub fn get(&self, stem: &str) -> Option<&SyllableBounds> {
        self.entries.get(stem)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
