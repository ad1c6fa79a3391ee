//! Delimited-text input and output for tables
//!
//! Every cell is read as text (blank cells become `Value::Null`); typing is
//! left to the cleaning stage. Output is written to a temporary file in the
//! destination directory and renamed into place once complete.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::{CoreError, Result};
use crate::table::{Table, Value};

/// Read a CSV file with a header row
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let table = read_csv_from(file)?;
    info!(
        "Read {} rows x {} columns from {}",
        table.len(),
        table.columns().len(),
        path.display()
    );
    Ok(table)
}

/// Read CSV text with a header row from any reader
pub fn read_csv_from<R: Read>(reader: R) -> Result<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut table = Table::new(columns);

    for record in rdr.records() {
        let record = record?;
        let row = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    Value::Null
                } else {
                    Value::Text(field.to_string())
                }
            })
            .collect();
        table.push_row(row)?;
    }

    Ok(table)
}

/// Serialize a table as CSV with a header row and no index column
pub fn write_csv_to<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(table.columns())?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(Value::render))?;
    }
    wtr.flush()?;
    Ok(())
}

/// A table rendered as CSV and not yet moved into place
///
/// Nothing touches the destination until `commit`; dropping a staged table
/// leaves any existing file as it was.
#[derive(Debug, Clone)]
pub struct StagedCsv {
    path: PathBuf,
    bytes: Vec<u8>,
    digest: String,
}

impl StagedCsv {
    /// BLAKE3 digest (hex) of the bytes `commit` will write
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write to a temporary file beside the destination and rename it over
    /// the destination; returns the digest
    pub fn commit(self) -> Result<String> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(&self.bytes)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| CoreError::Io(e.error))?;

        debug!("Wrote {} bytes to {}", self.bytes.len(), self.path.display());
        Ok(self.digest)
    }
}

/// Render a table for `path` without writing anything yet
pub fn stage_csv<P: AsRef<Path>>(table: &Table, path: P) -> Result<StagedCsv> {
    let mut bytes = Vec::new();
    write_csv_to(table, &mut bytes)?;
    let digest = hex::encode(blake3::hash(&bytes).as_bytes());
    Ok(StagedCsv {
        path: path.as_ref().to_path_buf(),
        bytes,
        digest,
    })
}

/// Write a table atomically and return the BLAKE3 digest of the bytes written
pub fn write_csv_atomic<P: AsRef<Path>>(table: &Table, path: P) -> Result<String> {
    stage_csv(table, path)?.commit()
}
