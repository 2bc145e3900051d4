use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::types::StatRecord;

pub const FILE_NAME_COLUMN: &str = "file_name";

#[derive(Debug, Clone, PartialEq)]
pub struct StatRow {
    pub file_name: String,
    pub record: StatRecord,
}

/// Row-per-file table of aggregated statistics.
///
/// Columns are `file_name` followed by the union of every row's keys in the
/// order they were first seen. Rows lacking a column get an empty cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatTable {
    rows: Vec<StatRow>,
}

impl StatTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, file_name: impl Into<String>, record: StatRecord) {
        self.rows.push(StatRow {
            file_name: file_name.into(),
            record,
        });
    }

    pub fn rows(&self) -> &[StatRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Stat columns, excluding `file_name`.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in &self.rows {
            for key in row.record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.to_string());
                }
            }
        }
        columns
    }

    /// Values of one column, skipping rows without it.
    pub fn column(&self, name: &str) -> Vec<(&str, f64)> {
        self.rows
            .iter()
            .filter_map(|row| row.record.get(name).map(|v| (row.file_name.as_str(), v)))
            .collect()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        let columns = self.columns();
        let mut header = Vec::with_capacity(columns.len() + 1);
        header.push(FILE_NAME_COLUMN.to_string());
        header.extend(columns.iter().cloned());
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut cells = Vec::with_capacity(header.len());
            cells.push(row.file_name.clone());
            cells.extend(
                columns
                    .iter()
                    .map(|column| row.record.get(column).map(|v| v.to_string()).unwrap_or_default()),
            );
            writer.write_record(&cells)?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Read a table written by [`StatTable::write_csv`].
    ///
    /// Empty and non-numeric cells are left out of the row's record.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let headers = reader.headers()?.clone();
        if headers.get(0) != Some(FILE_NAME_COLUMN) {
            bail!(
                "{} does not start with a {} column",
                path.display(),
                FILE_NAME_COLUMN
            );
        }

        let mut table = Self::new();
        for (line, result) in reader.records().enumerate() {
            let row = result.with_context(|| format!("Bad row {} in {}", line + 2, path.display()))?;
            let mut record = StatRecord::new();
            for (name, cell) in headers.iter().zip(row.iter()).skip(1) {
                if let Ok(value) = cell.trim().parse::<f64>() {
                    record.insert(name, value);
                }
            }
            table.push(row.get(0).unwrap_or_default(), record);
        }
        Ok(table)
    }
}
