use crate::export::StatTable;
use crate::types::StatRecord;

/// Min-max scale every stat column into `[0, 1]`.
///
/// A column holding a single distinct value maps to 0. Missing cells stay missing.
pub fn normalize_table(table: &StatTable) -> StatTable {
    let bounds: Vec<(String, f64, f64)> = table
        .columns()
        .into_iter()
        .map(|column| {
            let (low, high) = table
                .column(&column)
                .into_iter()
                .map(|(_, value)| value)
                .filter(|value| value.is_finite())
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                });
            (column, low, high)
        })
        .collect();

    let mut normalized = StatTable::new();
    for row in table.rows() {
        let mut record = StatRecord::new();
        for (column, low, high) in &bounds {
            if let Some(value) = row.record.get(column) {
                record.insert(column.as_str(), scale(value, *low, *high));
            }
        }
        normalized.push(row.file_name.clone(), record);
    }
    normalized
}

fn scale(value: f64, low: f64, high: f64) -> f64 {
    let span = high - low;
    if !value.is_finite() || !span.is_finite() || span <= 0.0 {
        return 0.0;
    }
    (value - low) / span
}
