//! Model-ready numeric matrix extracted from a transformed table

use serde::Serialize;

use crate::errors::{CoreError, Result};
use crate::table::{Table, Value};

/// Dense feature rows, their column names, and binary labels (1 = fraud)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
}

fn label_of(value: &Value) -> Option<u8> {
    match value {
        Value::Int(0) => Some(0),
        Value::Int(1) => Some(1),
        Value::Float(v) if *v == 0.0 => Some(0),
        Value::Float(v) if *v == 1.0 => Some(1),
        Value::Text(s) => match s.trim() {
            "0" => Some(0),
            "1" => Some(1),
            _ => None,
        },
        _ => None,
    }
}

/// Read a 0/1 label column
pub fn labels_from_table(table: &Table, label_column: &str) -> Result<Vec<u8>> {
    let mut labels = Vec::with_capacity(table.len());
    let mut bad_rows = Vec::new();
    for (row, value) in table.column_values(label_column)?.enumerate() {
        match label_of(value) {
            Some(label) => labels.push(label),
            None => bad_rows.push(row),
        }
    }
    if bad_rows.is_empty() {
        Ok(labels)
    } else {
        Err(CoreError::parse(label_column, bad_rows))
    }
}

impl FeatureMatrix {
    /// Take every column except the label and `excluded` as a feature, in table order
    ///
    /// All feature cells must be numeric and every label must be 0 or 1.
    pub fn from_table(table: &Table, label_column: &str, excluded: &[&str]) -> Result<Self> {
        let label_idx = table.column_index(label_column)?;
        let labels = labels_from_table(table, label_column)?;
        for name in excluded {
            table.column_index(name)?;
        }

        let feature_idx: Vec<usize> = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(i, name)| *i != label_idx && !excluded.contains(&name.as_str()))
            .map(|(i, _)| i)
            .collect();
        let columns: Vec<String> = feature_idx
            .iter()
            .map(|&i| table.columns()[i].clone())
            .collect();

        let mut rows = Vec::with_capacity(table.len());
        for (row_idx, row) in table.rows().iter().enumerate() {
            let mut features = Vec::with_capacity(feature_idx.len());
            for (&i, name) in feature_idx.iter().zip(&columns) {
                match row[i].as_f64() {
                    Some(v) => features.push(v),
                    None => return Err(CoreError::parse(name.clone(), vec![row_idx])),
                }
            }
            rows.push(features);
        }

        Ok(Self {
            columns,
            rows,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_table_excludes_identifiers() {
        let table = Table::from_rows(
            vec!["user_id".into(), "age".into(), "class".into(), "browser_IE".into()],
            vec![
                vec![Value::from("u1"), Value::Float(0.5), Value::Int(0), Value::Int(1)],
                vec![Value::from("u2"), Value::Float(-0.5), Value::Int(1), Value::Int(0)],
            ],
        )
        .unwrap();
        let matrix = FeatureMatrix::from_table(&table, "class", &["user_id"]).unwrap();
        assert_eq!(matrix.columns, vec!["age", "browser_IE"]);
        assert_eq!(matrix.rows, vec![vec![0.5, 1.0], vec![-0.5, 0.0]]);
        assert_eq!(matrix.labels, vec![0, 1]);
    }

    #[test]
    fn test_non_numeric_feature_rejected() {
        let table = Table::from_rows(
            vec!["sex".into(), "class".into()],
            vec![vec![Value::from("M"), Value::Int(0)]],
        )
        .unwrap();
        let err = FeatureMatrix::from_table(&table, "class", &[]).unwrap_err();
        assert!(matches!(err, CoreError::Parse { ref column, .. } if column == "sex"));
    }

    #[test]
    fn test_bad_label_rejected() {
        let table = Table::from_rows(
            vec!["x".into(), "class".into()],
            vec![vec![Value::Int(1), Value::Int(2)]],
        )
        .unwrap();
        assert!(FeatureMatrix::from_table(&table, "class", &[]).is_err());
    }
}
