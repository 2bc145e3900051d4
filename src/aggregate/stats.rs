use tracing::warn;

use crate::types::{FeatureKind, StatRecord};

const ABS_LOG_EPSILON: f64 = 1e-10;

/// Whether stats describe a whole clip or a single phrase (`_phrase` suffix).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Clip,
    Phrase,
}

impl Level {
    fn suffix(self) -> &'static str {
        match self {
            Level::Clip => "",
            Level::Phrase => "_phrase",
        }
    }
}

/// Summary of one series: mean, population std and the 5th/95th percentiles.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Summary {
    pub mean: f64,
    pub std: f64,
    pub min5: f64,
    pub max95: f64,
}

impl Summary {
    /// All zeros for an empty series.
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self {
            mean: mean(values),
            std: population_std(values),
            min5: percentile_sorted(&sorted, 5.0),
            max95: percentile_sorted(&sorted, 95.0),
        }
    }

    pub fn range(&self) -> f64 {
        self.max95 - self.min5
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Linear interpolation between closest ranks over an ascending slice.
pub fn percentile_sorted(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = (pct / 100.0).clamp(0.0, 1.0) * (len - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = (lower + 1).min(len - 1);
            let weight = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

pub fn percentile(values: &[f64], pct: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, pct)
}

fn insert_summary(record: &mut StatRecord, prefix: &str, labels: [&str; 5], summary: Summary, suffix: &str) {
    let [mean_label, std_label, range_label, min_label, max_label] = labels;
    record.insert(format!("{prefix}_{mean_label}{suffix}"), summary.mean);
    record.insert(format!("{prefix}_{std_label}{suffix}"), summary.std);
    record.insert(format!("{prefix}_{range_label}{suffix}"), summary.range());
    record.insert(format!("{prefix}_{min_label}{suffix}"), summary.min5);
    record.insert(format!("{prefix}_{max_label}{suffix}"), summary.max95);
}

/// Stat record for one series of `kind`.
///
/// Always emits `{name}_mean/std/range/min5/max95`; F0 and syllable series add
/// `_log_*` stats over `ln(x)`, delta series add `_abs_log_*` stats over
/// `ln(|x| + 1e-10)`.
pub fn describe(values: &[f64], kind: FeatureKind, level: Level) -> StatRecord {
    let name = kind.name();
    let suffix = level.suffix();
    let mut record = StatRecord::new();

    insert_summary(
        &mut record,
        name,
        ["mean", "std", "range", "min5", "max95"],
        Summary::of(values),
        suffix,
    );

    if kind.is_log_domain() {
        let positive: Vec<f64> = values.iter().copied().filter(|&v| v > 0.0).collect();
        if positive.len() != values.len() {
            warn!(
                feature = name,
                dropped = values.len() - positive.len(),
                "non-positive values excluded from log statistics"
            );
        }
        let logs: Vec<f64> = positive.iter().map(|v| v.ln()).collect();
        insert_summary(
            &mut record,
            name,
            ["log_mean", "log_std", "log_range", "log_min5", "log_max95"],
            Summary::of(&logs),
            suffix,
        );
    }

    if kind.is_delta() {
        let logs: Vec<f64> = values
            .iter()
            .map(|v| (v.abs() + ABS_LOG_EPSILON).ln())
            .collect();
        insert_summary(
            &mut record,
            name,
            [
                "abs_log_mean",
                "abs_log_std",
                "abs_log_range",
                "abs_log_min_5",
                "abs_log_max_95",
            ],
            Summary::of(&logs),
            suffix,
        );
    }

    record
}
