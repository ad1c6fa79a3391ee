//! Error types for the fraud feature pipeline

use thiserror::Error;

/// Errors raised by the cleaning, geolocation and transform stages
#[derive(Error, Debug)]
pub enum CoreError {
    /// One or more cells could not be parsed into the expected type
    #[error("parse error in column '{column}' at rows {rows:?}")]
    Parse { column: String, rows: Vec<usize> },

    /// A required auxiliary input or setting is missing or invalid
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An expected column is absent from the table
    #[error("schema error: missing column '{0}'")]
    MissingColumn(String),

    /// Two tables or a table and a fitted state disagree on their columns
    #[error("schema error: expected columns {expected:?}, got {actual:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// A row does not have one cell per column
    #[error("row {row} has {actual} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// CSV reader/writer failure
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn parse(column: impl Into<String>, rows: Vec<usize>) -> Self {
        Self::Parse {
            column: column.into(),
            rows,
        }
    }

    /// True for the schema family (missing column or column mismatch)
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::MissingColumn(_) | Self::ColumnMismatch { .. })
    }
}

/// Result type for core pipeline operations
pub type Result<T> = std::result::Result<T, CoreError>;
