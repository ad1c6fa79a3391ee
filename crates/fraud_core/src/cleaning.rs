//! Deduplication, completeness filtering and type correction
//!
//! These steps run before any enrichment. Incomplete rows are dropped rather
//! than imputed; the number dropped is logged for every call.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, instrument, warn};

use crate::errors::{CoreError, Result};
use crate::table::{Table, Value};

/// Accepted timestamp layouts, tried in order
const TIMESTAMP_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Remove rows that are identical across all columns, keeping first occurrences
#[instrument(skip(table), fields(rows = table.len()))]
pub fn remove_duplicates(table: Table) -> Table {
    let before = table.len();
    let mut seen: HashSet<Vec<Value>> = HashSet::with_capacity(before);
    let table = table.filter_rows(|row| seen.insert(row.to_vec()));

    let removed = before - table.len();
    if removed > 0 {
        info!("Removed {} duplicate rows", removed);
    }
    table
}

/// Remove every row with a missing value in any of `required_columns`
#[instrument(skip(table, required_columns), fields(rows = table.len()))]
pub fn drop_incomplete(table: Table, required_columns: &[&str]) -> Result<Table> {
    let indices = required_columns
        .iter()
        .map(|name| table.column_index(name))
        .collect::<Result<Vec<_>>>()?;

    let before = table.len();
    let table = table.filter_rows(|row| indices.iter().all(|&i| !row[i].is_null()));

    let dropped = before - table.len();
    if dropped > 0 {
        warn!(
            "Dropped {} incomplete rows ({:.3}% of input)",
            dropped,
            dropped as f64 / before.max(1) as f64 * 100.0
        );
    }
    Ok(table)
}

/// Parse a timestamp in any of the accepted layouts; a bare date means midnight
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    TIMESTAMP_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Convert each named column to timestamps
///
/// Null cells stay null. Any text that cannot be parsed fails the whole call
/// with the offending row indices.
#[instrument(skip(table, timestamp_columns))]
pub fn normalize_timestamps(mut table: Table, timestamp_columns: &[&str]) -> Result<Table> {
    for &column in timestamp_columns {
        let mut bad_rows = Vec::new();
        table = table.map_column(column, |row, value| match value {
            Value::Null | Value::Timestamp(_) => value.clone(),
            Value::Text(text) => match parse_timestamp(text) {
                Some(ts) => Value::Timestamp(ts),
                None => {
                    bad_rows.push(row);
                    Value::Null
                }
            },
            Value::Int(_) | Value::Float(_) => {
                bad_rows.push(row);
                Value::Null
            }
        })?;

        if !bad_rows.is_empty() {
            return Err(CoreError::parse(column, bad_rows));
        }
    }
    Ok(table)
}

/// Convert each named column to integers where possible, floats otherwise
#[instrument(skip(table, numeric_columns))]
pub fn coerce_numeric(mut table: Table, numeric_columns: &[&str]) -> Result<Table> {
    for &column in numeric_columns {
        let mut bad_rows = Vec::new();
        table = table.map_column(column, |row, value| match value {
            Value::Text(text) => {
                if let Ok(v) = text.parse::<i64>() {
                    Value::Int(v)
                } else if let Some(v) = text.parse::<f64>().ok().filter(|v| v.is_finite()) {
                    Value::Float(v)
                } else {
                    bad_rows.push(row);
                    Value::Null
                }
            }
            Value::Timestamp(_) => {
                bad_rows.push(row);
                Value::Null
            }
            other => other.clone(),
        })?;

        if !bad_rows.is_empty() {
            return Err(CoreError::parse(column, bad_rows));
        }
    }
    Ok(table)
}

/// Label counts for a table, keyed by the rendered label value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassDistribution {
    pub counts: BTreeMap<String, usize>,
    pub total: usize,
}

impl ClassDistribution {
    pub fn percentage(&self, label: &str) -> f64 {
        match self.counts.get(label) {
            Some(&n) if self.total > 0 => n as f64 / self.total as f64 * 100.0,
            _ => 0.0,
        }
    }
}

/// Count rows per label value
pub fn class_distribution(table: &Table, label_column: &str) -> Result<ClassDistribution> {
    let mut counts = BTreeMap::new();
    for value in table.column_values(label_column)? {
        *counts.entry(value.render()).or_insert(0) += 1;
    }
    Ok(ClassDistribution {
        counts,
        total: table.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(rows: Vec<Vec<&str>>) -> Table {
        let columns = vec!["user_id".into(), "device_id".into(), "purchase_time".into()];
        let rows = rows
            .into_iter()
            .map(|r| {
                r.into_iter()
                    .map(|c| if c.is_empty() { Value::Null } else { Value::from(c) })
                    .collect()
            })
            .collect();
        Table::from_rows(columns, rows).unwrap()
    }

    #[test]
    fn test_duplicate_pair_collapses() {
        let table = raw(vec![
            vec!["1", "A", "2015-01-01 00:00:00"],
            vec!["2", "B", "2015-01-02 00:00:00"],
            vec!["1", "A", "2015-01-01 00:00:00"],
        ]);
        let deduped = remove_duplicates(table);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped.rows()[0][0], Value::from("1"));
        assert_eq!(deduped.rows()[1][0], Value::from("2"));
    }

    #[test]
    fn test_drop_incomplete_removes_missing_device() {
        let table = raw(vec![
            vec!["1", "A", "2015-01-01 00:00:00"],
            vec!["2", "", "2015-01-02 00:00:00"],
        ]);
        let kept = drop_incomplete(table, &["user_id", "device_id"]).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.rows()[0][1], Value::from("A"));
    }

    #[test]
    fn test_drop_incomplete_unknown_column() {
        let table = raw(vec![vec!["1", "A", "x"]]);
        let err = drop_incomplete(table, &["email"]).unwrap_err();
        assert!(matches!(err, CoreError::MissingColumn(ref c) if c == "email"));
    }

    #[test]
    fn test_normalize_timestamps_lists_bad_rows() {
        let table = raw(vec![
            vec!["1", "A", "2015-01-01 10:00:00"],
            vec!["2", "B", "not a time"],
            vec!["3", "C", "2015-01-03T08:30:00"],
            vec!["4", "D", "yesterday"],
        ]);
        match normalize_timestamps(table, &["purchase_time"]) {
            Err(CoreError::Parse { column, rows }) => {
                assert_eq!(column, "purchase_time");
                assert_eq!(rows, vec![1, 3]);
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_timestamps_parses_layouts() {
        let table = raw(vec![
            vec!["1", "A", "2015-02-24 22:55:49"],
            vec!["2", "B", "2015-02-24"],
        ]);
        let table = normalize_timestamps(table, &["purchase_time"]).unwrap();
        let first = table.rows()[0][2].as_timestamp().unwrap();
        assert_eq!(first.format("%H:%M:%S").to_string(), "22:55:49");
        assert!(table.rows()[1][2].as_timestamp().is_some());
    }

    #[test]
    fn test_coerce_numeric() {
        let table = Table::from_rows(
            vec!["age".into(), "value".into()],
            vec![
                vec![Value::from("39"), Value::from("34.5")],
                vec![Value::Null, Value::from("12")],
            ],
        )
        .unwrap();
        let table = coerce_numeric(table, &["age", "value"]).unwrap();
        assert_eq!(table.rows()[0][0], Value::Int(39));
        assert_eq!(table.rows()[0][1], Value::Float(34.5));
        assert!(table.rows()[1][0].is_null());

        let bad = Table::from_rows(vec!["age".into()], vec![vec![Value::from("old")]]).unwrap();
        assert!(matches!(coerce_numeric(bad, &["age"]), Err(CoreError::Parse { .. })));
    }

    #[test]
    fn test_class_distribution() {
        let table = Table::from_rows(
            vec!["class".into()],
            vec![vec![Value::Int(0)], vec![Value::Int(0)], vec![Value::Int(0)], vec![Value::Int(1)]],
        )
        .unwrap();
        let dist = class_distribution(&table, "class").unwrap();
        assert_eq!(dist.counts["0"], 3);
        assert_eq!(dist.counts["1"], 1);
        assert!((dist.percentage("1") - 25.0).abs() < 1e-9);
    }
}
