//! Clip- and phrase-level summary statistics.
//!
//! Clip-level stats pool every non-skipped phrase series of a clip and
//! describe the pooled series once. Phrase-level stats describe each phrase
//! on its own and report the mean of every stat across the clip's phrases.

pub mod stats;

use tracing::debug;

use crate::types::{FeatureKind, FeatureSeries, StatRecord};

pub use stats::{describe, percentile, Level, Summary};

/// Accumulates the skip counter across a batch of clips.
#[derive(Debug, Default)]
pub struct Aggregator {
    skipped: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phrase entries skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Empty series, and delta series of the form `[0, 0, x]`, carry no data.
    pub fn is_skipped(series: &FeatureSeries) -> bool {
        let values = &series.values;
        if values.is_empty() {
            return true;
        }
        series.kind.is_delta() && values.len() == 3 && values[0] == 0.0 && values[1] == 0.0
    }

    /// One merged record for a clip from the series of all its phrases.
    ///
    /// Clip-level keys come first, followed by the `_phrase` keys. Kinds are
    /// emitted in [`FeatureKind::ALL`] order, restricted to those present.
    pub fn aggregate_clip<'a, I>(&mut self, phrase_series: I) -> StatRecord
    where
        I: IntoIterator<Item = &'a FeatureSeries>,
    {
        let phrase_series: Vec<&FeatureSeries> = phrase_series.into_iter().collect();
        let kinds: Vec<FeatureKind> = FeatureKind::ALL
            .into_iter()
            .filter(|kind| phrase_series.iter().any(|series| series.kind == *kind))
            .collect();

        let mut kept: Vec<(FeatureKind, Vec<&FeatureSeries>)> = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let mut usable = Vec::new();
            for series in phrase_series.iter().filter(|series| series.kind == kind) {
                if Self::is_skipped(series) {
                    self.skipped += 1;
                    debug!(feature = kind.name(), "skipping empty phrase entry");
                } else {
                    usable.push(*series);
                }
            }
            kept.push((kind, usable));
        }

        let mut record = StatRecord::new();
        for (kind, usable) in &kept {
            let pooled: Vec<f64> = usable
                .iter()
                .flat_map(|series| series.values.iter().copied())
                .collect();
            record.extend(describe(&pooled, *kind, Level::Clip));
        }
        for (kind, usable) in &kept {
            record.extend(average_phrase_stats(usable, *kind));
        }
        record
    }
}

fn average_phrase_stats(phrases: &[&FeatureSeries], kind: FeatureKind) -> StatRecord {
    let mut totals = describe(&[], kind, Level::Phrase);
    if phrases.is_empty() {
        return totals;
    }
    for series in phrases {
        for (key, value) in describe(&series.values, kind, Level::Phrase).iter() {
            let running = totals.get(key).unwrap_or(0.0);
            totals.insert(key, running + value);
        }
    }
    let count = phrases.len() as f64;
    let mut averaged = StatRecord::new();
    for (key, total) in totals.iter() {
        averaged.insert(key, total / count);
    }
    averaged
}
