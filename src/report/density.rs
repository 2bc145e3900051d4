use std::collections::HashMap;
use std::f64::consts::PI;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::aggregate::stats::mean;
use crate::export::StatTable;
use crate::metadata::FileMetadata;

pub const GRID_POINTS: usize = 200;

/// A sampled density estimate for one metadata group.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityCurve {
    pub group: String,
    pub x: Vec<f64>,
    pub density: Vec<f64>,
}

/// Scott's rule: `n^(-1/5)` times the sample standard deviation.
pub fn scott_bandwidth(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    let bandwidth = (n as f64).powf(-0.2) * variance.sqrt();
    (bandwidth > 0.0 && bandwidth.is_finite()).then_some(bandwidth)
}

/// Evenly spaced points from `low` to `high` inclusive.
pub fn linspace(low: f64, high: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![low],
        _ => {
            let step = (high - low) / (points - 1) as f64;
            (0..points).map(|i| low + step * i as f64).collect()
        }
    }
}

/// Gaussian kernel density of `values` evaluated at `grid`.
pub fn gaussian_kde(values: &[f64], bandwidth: f64, grid: &[f64]) -> Vec<f64> {
    let norm = 1.0 / (values.len() as f64 * bandwidth * (2.0 * PI).sqrt());
    grid.iter()
        .map(|&x| {
            values
                .iter()
                .map(|&v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm
        })
        .collect()
}

/// One density curve per file-name group for `column`, groups in first-seen order.
///
/// All curves share a grid spanning the column's finite range. Groups with
/// fewer than two values, or no spread, are left out.
pub fn group_densities(table: &StatTable, column: &str) -> Vec<DensityCurve> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<f64>> = HashMap::new();
    for (file_name, value) in table.column(column) {
        if !value.is_finite() {
            continue;
        }
        let label = FileMetadata::parse(file_name).group_label();
        if !groups.contains_key(&label) {
            order.push(label.clone());
        }
        groups.entry(label).or_default().push(value);
    }

    let all: Vec<f64> = groups.values().flatten().copied().collect();
    if all.is_empty() {
        return Vec::new();
    }
    let low = all.iter().copied().fold(f64::INFINITY, f64::min);
    let high = all.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let grid = linspace(low, high, GRID_POINTS);

    order
        .into_iter()
        .filter_map(|group| {
            let values = groups.get(&group)?;
            let Some(bandwidth) = scott_bandwidth(values) else {
                warn!(group = %group, column, values = values.len(), "not enough spread for a density curve");
                return None;
            };
            Some(DensityCurve {
                density: gaussian_kde(values, bandwidth, &grid),
                x: grid.clone(),
                group,
            })
        })
        .collect()
}

/// Write curves as `group,x,density` rows.
pub fn write_density_csv(path: &Path, curves: &[DensityCurve]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(["group", "x", "density"])?;
    for curve in curves {
        for (x, density) in curve.x.iter().zip(&curve.density) {
            writer.write_record([curve.group.clone(), x.to_string(), density.to_string()])?;
        }
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
