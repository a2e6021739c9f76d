//! Cell-type enrichment scores attached to bulk cohorts
//!
//! Scores come from an external xCell run; this module only loads them and
//! checks that they cover the cohort's libraries.

use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView1};

use crate::data::Cohort;
use crate::error::{AnalysisError, Result};
use crate::io::{read_matrix, LabelledMatrix};

/// Cell types x samples score table aligned to one cohort
#[derive(Debug, Clone, PartialEq)]
pub struct CellTypeScores {
    pub cell_types: Vec<String>,
    pub samples: Vec<String>,
    pub scores: Array2<f64>,
}

impl CellTypeScores {
    pub fn cell_type(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        let i = self.cell_types.iter().position(|c| c == name)?;
        Some(self.scores.row(i))
    }
}

/// Source of per-sample cell-type scores
pub trait Deconvolution {
    fn scores(&self, cohort: &Cohort) -> Result<CellTypeScores>;
}

/// xCell output read from disk
#[derive(Debug, Clone)]
pub struct PrecomputedXcell {
    table: LabelledMatrix,
    source: PathBuf,
}

impl PrecomputedXcell {
    pub fn new(table: LabelledMatrix) -> Self {
        Self {
            table,
            source: PathBuf::from("<memory>"),
        }
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let table = read_matrix(path)?;
        log::info!(
            "Loaded {} cell types for {} samples from {}",
            table.row_ids.len(),
            table.col_ids.len(),
            path.display()
        );
        Ok(Self {
            table,
            source: path.to_path_buf(),
        })
    }

    /// Columns for `libraries`, in that order
    pub fn align(&self, libraries: &[String]) -> Result<CellTypeScores> {
        let mut columns = Vec::with_capacity(libraries.len());
        let mut missing = Vec::new();
        for lib in libraries {
            match self.table.col_ids.iter().position(|c| c == lib) {
                Some(j) => columns.push(j),
                None => missing.push(lib.as_str()),
            }
        }
        if !missing.is_empty() {
            return Err(AnalysisError::AlignmentMismatch {
                what: format!("xCell scores ({})", self.source.display()),
                detail: format!("no column for libraries {}", missing.join(", ")),
            });
        }
        let scores = self.table.values.select(ndarray::Axis(1), &columns);
        Ok(CellTypeScores {
            cell_types: self.table.row_ids.clone(),
            samples: libraries.to_vec(),
            scores,
        })
    }
}

impl Deconvolution for PrecomputedXcell {
    fn scores(&self, cohort: &Cohort) -> Result<CellTypeScores> {
        self.align(cohort.counts().sample_ids())
    }
}
