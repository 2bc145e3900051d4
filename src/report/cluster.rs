//! Two-component Gaussian mixture clustering of clip stat tables, reported
//! as the IDS/ADS make-up of each cluster.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::GaussianMixtureModel;
use ndarray::{Array2, Axis};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::{info, warn};

use crate::aggregate::stats::{mean, population_std};
use crate::export::StatTable;
use crate::metadata::{FileMetadata, Register};

pub const CLUSTER_COUNT: usize = 2;

/// Stat columns the clustering runs on, clip level then phrase level.
pub const CLUSTER_FEATURES: [&str; 16] = [
    "f0_log_std",
    "f0_log_mean",
    "f0_delta_abs_log_std",
    "f0_delta_abs_log_mean",
    "spectral_tilt_std",
    "spectral_tilt_mean",
    "syllable_durations_log_std",
    "syllable_durations_log_mean",
    "f0_log_std_phrase",
    "f0_log_mean_phrase",
    "f0_delta_abs_log_std_phrase",
    "f0_delta_abs_log_mean_phrase",
    "spectral_tilt_std_phrase",
    "spectral_tilt_mean_phrase",
    "syllable_durations_log_std_phrase",
    "syllable_durations_log_mean_phrase",
];

/// Conditions clustered separately; denoised clips are left out.
pub const CLUSTER_CONDITIONS: [&str; 2] = ["enhanced", "original"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub r: f64,
    /// Two-sided p-value of `r` under the t distribution with `n - 2` degrees of freedom.
    pub p: f64,
}

/// Register counts of one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterComposition {
    /// 1-based cluster number.
    pub cluster: usize,
    pub files: usize,
    pub ids: usize,
    pub ads: usize,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterReport {
    pub dataset: String,
    pub condition: String,
    pub total: usize,
    pub clusters: Vec<ClusterComposition>,
    /// Correlation of the first two feature columns over every clustered file.
    pub correlation: Option<Correlation>,
}

#[derive(Debug, Serialize)]
struct CompositionRow<'a> {
    dataset: &'a str,
    condition: &'a str,
    cluster: usize,
    files: usize,
    ids: usize,
    ads: usize,
    ids_pct_cluster: f64,
    ads_pct_cluster: f64,
    ids_pct_total: f64,
    ads_pct_total: f64,
}

/// File names and feature matrix for rows holding a finite value in every column.
pub fn feature_matrix(table: &StatTable, columns: &[&str]) -> Result<(Vec<String>, Array2<f64>)> {
    let available = table.columns();
    for column in columns {
        if !available.iter().any(|c| c == column) {
            bail!("stat table has no column {column:?}");
        }
    }

    let mut names = Vec::new();
    let mut values = Vec::new();
    for row in table.rows() {
        let cells: Option<Vec<f64>> = columns
            .iter()
            .map(|column| row.record.get(column).filter(|v| v.is_finite()))
            .collect();
        match cells {
            Some(cells) => {
                names.push(row.file_name.clone());
                values.extend(cells);
            }
            None => warn!(file = %row.file_name, "missing or non-finite features, not clustered"),
        }
    }
    let matrix = Array2::from_shape_vec((names.len(), columns.len()), values)
        .context("feature matrix shape")?;
    Ok((names, matrix))
}

/// Zero mean, unit population variance per column; constant columns become 0.
pub fn standardize(matrix: &Array2<f64>) -> Array2<f64> {
    let mut scaled = matrix.clone();
    for mut column in scaled.axis_iter_mut(Axis(1)) {
        let values: Vec<f64> = column.to_vec();
        let m = mean(&values);
        let std = population_std(&values);
        let scale = if std > 0.0 { std } else { 1.0 };
        column.mapv_inplace(|v| (v - m) / scale);
    }
    scaled
}

/// Pearson correlation with its two-sided p-value; `None` below three points.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<Correlation> {
    let n = x.len().min(y.len());
    if n < 3 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let (mx, my) = (mean(x), mean(y));
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let df = (n - 2) as f64;
    let p = if r.abs() >= 1.0 {
        0.0
    } else {
        let t = r * (df / (1.0 - r * r)).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df).ok()?;
        (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0)
    };
    Some(Correlation { r, p })
}

/// Fit the mixture to the standardized rows and return one label per row.
pub fn fit_labels(standardized: &Array2<f64>) -> Result<Vec<usize>> {
    ensure!(
        standardized.nrows() >= CLUSTER_COUNT,
        "need at least {} rows to cluster, got {}",
        CLUSTER_COUNT,
        standardized.nrows()
    );
    let dataset = DatasetBase::from(standardized.clone());
    let model = GaussianMixtureModel::<f64>::params(CLUSTER_COUNT)
        .n_runs(5)
        .tolerance(1e-4)
        .fit(&dataset)
        .context("Gaussian mixture fit failed")?;
    Ok(model.predict(standardized).to_vec())
}

/// Cluster the rows of `table` whose file name carries `condition`.
///
/// `None` when no row matches.
pub fn cluster_table(
    table: &StatTable,
    dataset: &str,
    condition: &str,
    columns: &[&str],
) -> Result<Option<ClusterReport>> {
    let mut subset = StatTable::new();
    for row in table.rows() {
        if row.file_name.contains(condition) && !row.file_name.contains("denoised") {
            subset.push(row.file_name.clone(), row.record.clone());
        }
    }
    if subset.is_empty() {
        return Ok(None);
    }

    let (names, matrix) = feature_matrix(&subset, columns)?;
    let standardized = standardize(&matrix);
    let labels = fit_labels(&standardized)?;

    let mut clusters: Vec<ClusterComposition> = (0..CLUSTER_COUNT)
        .map(|index| ClusterComposition {
            cluster: index + 1,
            files: 0,
            ids: 0,
            ads: 0,
        })
        .collect();
    for (name, &label) in names.iter().zip(&labels) {
        let Some(entry) = clusters.get_mut(label) else {
            continue;
        };
        entry.files += 1;
        match FileMetadata::parse(name).register {
            Some(Register::Ids) => entry.ids += 1,
            Some(Register::Ads) => entry.ads += 1,
            None => {}
        }
    }

    let correlation = match columns {
        [first, second, ..] => {
            let x: Vec<f64> = matrix.column(0).to_vec();
            let y: Vec<f64> = matrix.column(1).to_vec();
            let found = pearson(&x, &y);
            if found.is_none() {
                warn!(dataset, condition, first, second, "correlation not applicable");
            }
            found
        }
        _ => None,
    };

    info!(dataset, condition, files = names.len(), "clustered");
    Ok(Some(ClusterReport {
        dataset: dataset.to_string(),
        condition: condition.to_string(),
        total: names.len(),
        clusters,
        correlation,
    }))
}

/// Human-readable cluster make-up, one block per report.
pub fn render_text(reports: &[ClusterReport]) -> String {
    let mut out = String::new();
    for report in reports {
        let _ = writeln!(out, "\n{} ({}) Clusters:", report.dataset, report.condition);
        for cluster in &report.clusters {
            let _ = writeln!(out, "Cluster {}:\n{}", cluster.cluster, "-".repeat(10));
            let _ = writeln!(out, "\nCounts in Cluster {}:", cluster.cluster);
            let _ = writeln!(
                out,
                "  IDS files: {} ({:.2}% of cluster, {:.2}% of total)",
                cluster.ids,
                percent(cluster.ids, cluster.files),
                percent(cluster.ids, report.total)
            );
            let _ = writeln!(
                out,
                "  ADS files: {} ({:.2}% of cluster, {:.2}% of total)",
                cluster.ads,
                percent(cluster.ads, cluster.files),
                percent(cluster.ads, report.total)
            );
            match report.correlation {
                Some(c) => {
                    let _ = writeln!(out, "  Pearson r: {:.2}, p-value: {:.4}", c.r, c.p);
                }
                None => {
                    let _ = writeln!(out, "  Pearson correlation not applicable (insufficient data).");
                }
            }
        }
    }
    out
}

pub fn write_text(path: &Path, reports: &[ClusterReport]) -> Result<()> {
    fs::write(path, render_text(reports))
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// One CSV row per cluster with counts and percentages.
pub fn write_composition_csv(path: &Path, reports: &[ClusterReport]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for report in reports {
        for cluster in &report.clusters {
            writer.serialize(CompositionRow {
                dataset: &report.dataset,
                condition: &report.condition,
                cluster: cluster.cluster,
                files: cluster.files,
                ids: cluster.ids,
                ads: cluster.ads,
                ids_pct_cluster: percent(cluster.ids, cluster.files),
                ads_pct_cluster: percent(cluster.ads, cluster.files),
                ids_pct_total: percent(cluster.ids, report.total),
                ads_pct_total: percent(cluster.ads, report.total),
            })?;
        }
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StatRecord;
    use approx::assert_abs_diff_eq;

    const COLUMNS: [&str; 3] = ["f0_log_std", "f0_log_mean", "spectral_tilt_mean"];

    fn separated_table() -> StatTable {
        let mut table = StatTable::new();
        for i in 0..12 {
            let jitter = |k: usize| ((i * k) % 7) as f64 * 0.05;
            for (register, centre) in [("IDS", 3.0), ("ADS", -3.0)] {
                let mut record = StatRecord::new();
                record.insert(COLUMNS[0], centre + jitter(3));
                record.insert(COLUMNS[1], centre * 0.5 + jitter(5));
                record.insert(COLUMNS[2], -centre + jitter(2));
                table.push(format!("{register}_enhanced_Baby {i}.wav"), record);
            }
        }
        table
    }

    #[test]
    fn standardize_centres_and_scales_columns() {
        let matrix = ndarray::array![[1.0, 5.0], [3.0, 5.0]];
        let scaled = standardize(&matrix);
        assert_abs_diff_eq!(scaled[[0, 0]], -1.0);
        assert_abs_diff_eq!(scaled[[1, 0]], 1.0);
        assert_eq!(scaled[[0, 1]], 0.0);
    }

    #[test]
    fn pearson_of_linear_data() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let up: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        let perfect = pearson(&x, &up).unwrap();
        assert_abs_diff_eq!(perfect.r, 1.0, epsilon = 1e-12);
        assert!(perfect.p < 1e-6);

        // r = 0.8 over five points: t = 2.3094 with 3 df, p ~ 0.1041.
        let noisy = pearson(&x, &[1.0, 3.0, 2.0, 5.0, 4.0]).unwrap();
        assert_abs_diff_eq!(noisy.r, 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(noisy.p, 0.1041, epsilon = 1e-3);
        assert!(pearson(&[1.0, 2.0], &[2.0, 1.0]).is_none());
    }

    #[test]
    fn separated_registers_land_in_separate_clusters() {
        let report = cluster_table(&separated_table(), "References", "enhanced", &COLUMNS)
            .unwrap()
            .unwrap();
        assert_eq!(report.total, 24);
        assert_eq!(report.clusters.len(), CLUSTER_COUNT);
        for cluster in &report.clusters {
            assert_eq!(cluster.files, 12);
            assert!(
                (cluster.ids == 12 && cluster.ads == 0) || (cluster.ids == 0 && cluster.ads == 12),
                "mixed cluster: {cluster:?}"
            );
        }
        assert!(report.correlation.is_some());
    }

    #[test]
    fn unmatched_condition_yields_no_report() {
        assert!(cluster_table(&separated_table(), "References", "original", &COLUMNS)
            .unwrap()
            .is_none());
    }

    #[test]
    fn missing_column_is_an_error() {
        let err = cluster_table(&separated_table(), "References", "enhanced", &["f0_mean"]);
        assert!(err.is_err());
    }

    #[test]
    fn text_and_csv_carry_percentages() {
        let report = ClusterReport {
            dataset: "Syntheses".to_string(),
            condition: "original".to_string(),
            total: 4,
            clusters: vec![
                ClusterComposition { cluster: 1, files: 3, ids: 2, ads: 1 },
                ClusterComposition { cluster: 2, files: 1, ids: 0, ads: 1 },
            ],
            correlation: None,
        };
        let text = render_text(std::slice::from_ref(&report));
        assert!(text.contains("Syntheses (original) Clusters:"));
        assert!(text.contains("  IDS files: 2 (66.67% of cluster, 50.00% of total)"));
        assert!(text.contains("Pearson correlation not applicable"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clusters.csv");
        write_composition_csv(&path, &[report]).unwrap();
        let csv = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "dataset,condition,cluster,files,ids,ads,ids_pct_cluster,ads_pct_cluster,ids_pct_total,ads_pct_total"
        );
        assert!(lines[2].starts_with("Syntheses,original,2,1,0,1,0.0,100.0,0.0,25.0"));
    }
}
