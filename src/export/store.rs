use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::metadata::Source;
use crate::types::FeatureSeries;

/// Identifies the clip a phrase was cut from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipKey {
    pub source: Source,
    /// Condition sub-directory (`original`, `denoised`, `enhanced`).
    pub condition: String,
    pub base_file: String,
    pub clip_name: String,
}

/// One feature series of one phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub clip: ClipKey,
    pub phrase: String,
    pub series: FeatureSeries,
}

impl FeatureRecord {
    /// `{category}/{sub_category}/{base_file}/{phrase}`.
    pub fn path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.clip.source.dir_name(),
            self.clip.condition,
            self.clip.base_file,
            self.phrase
        )
    }
}

/// Flat collection of extracted series, persisted between the extraction
/// and aggregation passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureStore {
    records: Vec<FeatureRecord>,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record; a second record for the same phrase and feature replaces the first.
    pub fn insert(&mut self, record: FeatureRecord) {
        let existing = self.records.iter_mut().find(|r| {
            r.clip == record.clip && r.phrase == record.phrase && r.series.kind == record.series.kind
        });
        match existing {
            Some(slot) => {
                warn!(path = %record.path(), feature = record.series.kind.name(), "duplicate phrase entry replaced");
                *slot = record;
            }
            None => self.records.push(record),
        }
    }

    pub fn records(&self) -> &[FeatureRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records grouped by clip, clips in first-seen order.
    pub fn by_clip(&self) -> Vec<(&ClipKey, Vec<&FeatureRecord>)> {
        let mut groups: Vec<(&ClipKey, Vec<&FeatureRecord>)> = Vec::new();
        for record in &self.records {
            match groups.iter_mut().find(|(clip, _)| **clip == record.clip) {
                Some((_, members)) => members.push(record),
                None => groups.push((&record.clip, vec![record])),
            }
        }
        groups
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create feature store {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .with_context(|| format!("Failed to write feature store {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open feature store {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse feature store {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeatureKind;

    fn clip(base: &str) -> ClipKey {
        ClipKey {
            source: Source::Synthesis,
            condition: "enhanced".to_string(),
            base_file: base.to_string(),
            clip_name: format!("xtts_{base}.wav"),
        }
    }

    fn record(base: &str, phrase: &str, values: &[f64]) -> FeatureRecord {
        FeatureRecord {
            clip: clip(base),
            phrase: phrase.to_string(),
            series: FeatureSeries::new(FeatureKind::F0, values.to_vec()),
        }
    }

    #[test]
    fn path_joins_category_condition_file_and_phrase() {
        let record = record("IDS_Baby 1", "phrase_2", &[]);
        assert_eq!(record.path(), "syntheses/enhanced/IDS_Baby 1/phrase_2");
    }

    #[test]
    fn duplicates_replace_in_place() {
        let mut store = FeatureStore::new();
        store.insert(record("a", "phrase_1", &[1.0]));
        store.insert(record("b", "phrase_1", &[2.0]));
        store.insert(record("a", "phrase_1", &[3.0]));
        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[0].series.values, vec![3.0]);
    }

    #[test]
    fn groups_by_clip_in_first_seen_order() {
        let mut store = FeatureStore::new();
        store.insert(record("b", "phrase_1", &[1.0]));
        store.insert(record("a", "phrase_1", &[1.0]));
        store.insert(record("b", "phrase_2", &[1.0]));
        let groups = store.by_clip();
        let names: Vec<&str> = groups.iter().map(|(c, _)| c.base_file.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.json");
        let mut store = FeatureStore::new();
        store.insert(record("a", "phrase_1", &[150.0, 151.5]));
        store.save(&path).unwrap();
        assert_eq!(FeatureStore::load(&path).unwrap(), store);
    }
}
