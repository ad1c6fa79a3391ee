//! Standardization and one-hot encoding
//!
//! Each transform has an unfitted form that only knows which columns to touch
//! and a fitted form that carries the learned statistics. Fitting reads a table
//! and returns a new value; applying never changes the fitted state, so the
//! statistics learned on one table can be reused on any other without leakage.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

use crate::errors::{CoreError, Result};
use crate::table::{Table, Value};

fn numeric_cells(table: &Table, column: &str) -> Result<Vec<f64>> {
    let mut values = Vec::with_capacity(table.len());
    let mut bad_rows = Vec::new();
    for (row, value) in table.column_values(column)?.enumerate() {
        match value.as_f64() {
            Some(v) => values.push(v),
            None => bad_rows.push(row),
        }
    }
    if bad_rows.is_empty() {
        Ok(values)
    } else {
        Err(CoreError::parse(column, bad_rows))
    }
}

fn check_columns(expected: &[String], requested: &[&str]) -> Result<()> {
    if expected.iter().map(String::as_str).eq(requested.iter().copied()) {
        Ok(())
    } else {
        Err(CoreError::ColumnMismatch {
            expected: expected.to_vec(),
            actual: requested.iter().map(|s| s.to_string()).collect(),
        })
    }
}

/// Z-score scaling of numeric columns
#[derive(Debug, Clone, Default)]
pub struct StandardScaler;

/// Per-column mean and population standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    pub columns: Vec<String>,
    pub means: Vec<f64>,
    pub std_devs: Vec<f64>,
}

impl StandardScaler {
    /// Learn mean and standard deviation for each column
    pub fn fit(table: &Table, columns: &[&str]) -> Result<FittedScaler> {
        let mut means = Vec::with_capacity(columns.len());
        let mut std_devs = Vec::with_capacity(columns.len());

        for &column in columns {
            let values = numeric_cells(table, column)?;
            let n = values.len() as f64;
            let (mean, std) = if values.is_empty() {
                (0.0, 0.0)
            } else {
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
                (mean, var.sqrt())
            };
            debug!("Scaler {}: mean={:.4}, std={:.4}", column, mean, std);
            means.push(mean);
            std_devs.push(std);
        }

        Ok(FittedScaler {
            columns: columns.iter().map(|s| s.to_string()).collect(),
            means,
            std_devs,
        })
    }
}

impl FittedScaler {
    /// Scale the fitted columns; a constant column becomes all zeros
    pub fn apply(&self, mut table: Table) -> Result<Table> {
        for (i, column) in self.columns.iter().enumerate() {
            let values = numeric_cells(&table, column)?;
            let (mean, std) = (self.means[i], self.std_devs[i]);
            let scaled = values
                .into_iter()
                .map(|v| {
                    if std > 0.0 {
                        Value::Float((v - mean) / std)
                    } else {
                        Value::Float(0.0)
                    }
                })
                .collect();
            table = table.with_column(column, scaled)?;
        }
        Ok(table)
    }
}

/// Drop-first one-hot encoding of categorical columns
#[derive(Debug, Clone, Default)]
pub struct OneHotEncoder;

/// Indicator levels kept for one column (reference level excluded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedColumn {
    pub column: String,
    pub reference: Option<String>,
    pub levels: Vec<String>,
}

impl EncodedColumn {
    pub fn indicator_names(&self) -> impl Iterator<Item = String> + '_ {
        self.levels
            .iter()
            .map(move |level| format!("{}_{}", self.column, level))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FittedEncoder {
    pub columns: Vec<EncodedColumn>,
}

impl OneHotEncoder {
    /// Enumerate the sorted observed levels per column and drop the first
    pub fn fit(table: &Table, columns: &[&str]) -> Result<FittedEncoder> {
        let mut encoded = Vec::with_capacity(columns.len());
        for &column in columns {
            let levels: BTreeSet<String> = table
                .column_values(column)?
                .filter(|v| !v.is_null())
                .map(Value::render)
                .collect();
            let mut levels = levels.into_iter();
            let reference = levels.next();
            let levels: Vec<String> = levels.collect();
            debug!(
                "Encoder {}: reference={:?}, {} indicator columns",
                column,
                reference,
                levels.len()
            );
            encoded.push(EncodedColumn {
                column: column.to_string(),
                reference,
                levels,
            });
        }
        Ok(FittedEncoder { columns: encoded })
    }
}

impl FittedEncoder {
    /// Replace each fitted column with its indicator columns
    ///
    /// Levels unseen at fit time (and nulls) produce all-zero indicators, and
    /// every fitted level gets a column even if absent from `table`, so the
    /// output schema depends only on the fitted state.
    pub fn apply(&self, mut table: Table) -> Result<Table> {
        for encoded in &self.columns {
            let rendered: Vec<Option<String>> = table
                .column_values(&encoded.column)?
                .map(|v| if v.is_null() { None } else { Some(v.render()) })
                .collect();

            table = table.drop_column(&encoded.column)?;
            for (level, name) in encoded.levels.iter().zip(encoded.indicator_names()) {
                let indicator = rendered
                    .iter()
                    .map(|v| Value::Int(i64::from(v.as_deref() == Some(level.as_str()))))
                    .collect();
                table = table.with_column(&name, indicator)?;
            }
        }
        Ok(table)
    }

    /// Names of every indicator column, in output order
    pub fn output_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(EncodedColumn::indicator_names)
            .collect()
    }
}

/// Holder for at most one fitted scaler and one fitted encoder
///
/// `fit = true` replaces the stored state; `fit = false` reuses it. A holder
/// belongs to one pipeline run and is not shared.
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    scaler: Option<FittedScaler>,
    encoder: Option<FittedEncoder>,
}

impl Transformer {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(skip(self, table, numeric_columns), fields(rows = table.len()))]
    pub fn scale(&mut self, table: Table, numeric_columns: &[&str], fit: bool) -> Result<Table> {
        if fit {
            self.scaler = Some(StandardScaler::fit(&table, numeric_columns)?);
        }
        let scaler = self.scaler.as_ref().ok_or_else(|| {
            CoreError::Configuration("scale called with fit=false before the scaler was fitted".into())
        })?;
        check_columns(&scaler.columns, numeric_columns)?;
        scaler.apply(table)
    }

    #[instrument(skip(self, table, categorical_columns), fields(rows = table.len()))]
    pub fn encode(&mut self, table: Table, categorical_columns: &[&str], fit: bool) -> Result<Table> {
        if fit {
            self.encoder = Some(OneHotEncoder::fit(&table, categorical_columns)?);
        }
        let encoder = self.encoder.as_ref().ok_or_else(|| {
            CoreError::Configuration("encode called with fit=false before the encoder was fitted".into())
        })?;
        let fitted: Vec<String> = encoder.columns.iter().map(|c| c.column.clone()).collect();
        check_columns(&fitted, categorical_columns)?;
        encoder.apply(table)
    }

    pub fn scaler(&self) -> Option<&FittedScaler> {
        self.scaler.as_ref()
    }

    pub fn encoder(&self) -> Option<&FittedEncoder> {
        self.encoder.as_ref()
    }
}
