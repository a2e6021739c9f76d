//! Generic delimited table used for sample sheets and metadata

use std::collections::HashMap;
use std::path::Path;

use crate::error::{AnalysisError, Result};

/// A header plus rows of string cells
#[derive(Debug, Clone, Default)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    index: HashMap<String, usize>,
}

impl Table {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let mut index = HashMap::with_capacity(header.len());
        for (i, name) in header.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(AnalysisError::InvalidInput {
                    reason: format!("Duplicate column '{}' in table header", name),
                });
            }
        }
        for (r, row) in rows.iter().enumerate() {
            if row.len() != header.len() {
                return Err(AnalysisError::InvalidInput {
                    reason: format!(
                        "Row {} has {} columns, expected {}",
                        r + 1,
                        row.len(),
                        header.len()
                    ),
                });
            }
        }
        Ok(Self { header, rows, index })
    }

    /// Read a tab- or comma-delimited file with a header line
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = super::csv::reader_for(path)?;
        let header: Vec<String> = reader
            .headers()?
            .iter()
            .map(|s| s.trim().to_string())
            .collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            rows.push(record.iter().map(|s| s.trim().to_string()).collect());
        }
        log::debug!("Read {} rows x {} columns from {}", rows.len(), header.len(), path.display());
        Self::new(header, rows)
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Cell value by row index and column name
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = *self.index.get(column)?;
        self.rows.get(row).map(|r| r[col].as_str())
    }

    /// Cell value that must exist
    pub fn require(&self, row: usize, column: &str) -> Result<&str> {
        self.get(row, column).ok_or_else(|| AnalysisError::InvalidInput {
            reason: format!("Column '{}' missing (row {})", column, row + 1),
        })
    }
}
