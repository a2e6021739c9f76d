//! Sample records: identifiers, QC metrics and covariates

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::io::Table;

/// Per-sample QC metrics; missing values are NaN
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QcMetrics {
    pub total_counts: f64,
    pub total_sj_counts: f64,
    pub mito_fraction: f64,
    pub intergenic_fraction: f64,
    pub ribo_fraction: f64,
}

impl Default for QcMetrics {
    fn default() -> Self {
        Self {
            total_counts: f64::NAN,
            total_sj_counts: f64::NAN,
            mito_fraction: f64::NAN,
            intergenic_fraction: f64::NAN,
            ribo_fraction: f64::NAN,
        }
    }
}

/// One sequencing library with its study identifiers and covariates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub study: String,
    pub patient: String,
    pub sample: String,
    pub library: String,
    pub tissue: String,
    pub smoking_type: String,
    pub smoking_status: String,
    pub qc: QcMetrics,
}

const REQUIRED_FIELDS: [&str; 7] = [
    "study",
    "patient",
    "sample",
    "library",
    "tissue",
    "smoking_type",
    "smoking_status",
];

/// Ordered collection of samples, unique by library
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleTable {
    records: Vec<SampleRecord>,
}

impl SampleTable {
    /// Create a table, rejecting duplicate libraries
    pub fn new(records: Vec<SampleRecord>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(records.len());
        for r in &records {
            if !seen.insert(r.library.as_str()) {
                return Err(AnalysisError::InvalidSampleTable {
                    reason: format!("Duplicate library '{}'", r.library),
                });
            }
        }
        Ok(Self { records })
    }

    /// Join a sample sheet with a metadata table on `library`
    ///
    /// Inner join in sheet order. Each field is taken from the sheet when the
    /// sheet has that column, otherwise from the metadata. Duplicate libraries
    /// keep their first record. An optional `intergenic_fraction` column seeds
    /// the QC metric of the same name.
    pub fn join(sheet: &Table, metadata: &Table) -> Result<Self> {
        for table in [sheet, metadata] {
            if !table.has_column("library") {
                return Err(AnalysisError::InvalidSampleTable {
                    reason: "both sample sheet and metadata need a 'library' column".to_string(),
                });
            }
        }
        for field in REQUIRED_FIELDS {
            if !sheet.has_column(field) && !metadata.has_column(field) {
                return Err(AnalysisError::InvalidSampleTable {
                    reason: format!("column '{}' found in neither sample sheet nor metadata", field),
                });
            }
        }

        let mut meta_rows: HashMap<&str, usize> = HashMap::new();
        for row in 0..metadata.n_rows() {
            meta_rows.entry(metadata.require(row, "library")?).or_insert(row);
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut records = Vec::new();
        let mut n_unmatched = 0usize;
        let mut n_duplicate = 0usize;

        for row in 0..sheet.n_rows() {
            let library = sheet.require(row, "library")?;
            let Some(&meta_row) = meta_rows.get(library) else {
                n_unmatched += 1;
                continue;
            };
            if !seen.insert(library.to_string()) {
                n_duplicate += 1;
                continue;
            }

            let field = |name: &str| -> Result<String> {
                sheet
                    .get(row, name)
                    .or_else(|| metadata.get(meta_row, name))
                    .map(|s| s.to_string())
                    .ok_or_else(|| AnalysisError::InvalidSampleTable {
                        reason: format!("missing '{}' for library '{}'", name, library),
                    })
            };

            let intergenic_fraction = field("intergenic_fraction")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(f64::NAN);

            records.push(SampleRecord {
                study: field("study")?,
                patient: field("patient")?,
                sample: field("sample")?,
                library: library.to_string(),
                tissue: field("tissue")?,
                smoking_type: field("smoking_type")?,
                smoking_status: field("smoking_status")?,
                qc: QcMetrics {
                    intergenic_fraction,
                    ..QcMetrics::default()
                },
            });
        }

        if n_unmatched > 0 {
            log::warn!("{} sample sheet rows had no metadata match and were dropped", n_unmatched);
        }
        if n_duplicate > 0 {
            log::warn!("{} duplicate libraries dropped (first record kept)", n_duplicate);
        }
        if records.is_empty() {
            return Err(AnalysisError::EmptyData {
                reason: "No samples left after joining sample sheet and metadata".to_string(),
            });
        }

        Self::new(records)
    }

    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Library identifiers in table order
    pub fn libraries(&self) -> Vec<String> {
        self.records.iter().map(|r| r.library.clone()).collect()
    }

    pub fn get(&self, library: &str) -> Option<&SampleRecord> {
        self.records.iter().find(|r| r.library == library)
    }

    /// Smoking type per sample, in table order
    pub fn smoking_types(&self) -> Vec<String> {
        self.records.iter().map(|r| r.smoking_type.clone()).collect()
    }

    /// Distinct (study, tissue) pairs in order of first appearance
    pub fn cohort_keys(&self) -> Vec<(String, String)> {
        let mut keys: Vec<(String, String)> = Vec::new();
        for r in &self.records {
            let key = (r.study.clone(), r.tissue.clone());
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Samples of one cohort, in table order
    pub fn subset_cohort(&self, study: &str, tissue: &str) -> Self {
        self.filter(|r| r.study == study && r.tissue == tissue)
    }

    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&SampleRecord) -> bool,
    {
        Self {
            records: self.records.iter().filter(|r| predicate(r)).cloned().collect(),
        }
    }

    /// Attach QC metrics, one per record in table order
    pub fn with_qc(self, qc: Vec<QcMetrics>) -> Result<Self> {
        if qc.len() != self.records.len() {
            return Err(AnalysisError::DimensionMismatch {
                expected: format!("{} QC rows", self.records.len()),
                got: format!("{} QC rows", qc.len()),
            });
        }
        let records = self
            .records
            .into_iter()
            .zip(qc)
            .map(|(mut r, m)| {
                r.qc = m;
                r
            })
            .collect();
        Ok(Self { records })
    }
}
