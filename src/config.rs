//! JSON run configuration for the two pipelines
//!
//! Every parameter block has defaults, so a config file only needs the input
//! paths and whatever it wants to override.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::data::CohortParams;
use crate::de::Thresholds;
use crate::enrichment::GseaParams;
use crate::error::{AnalysisError, Result};
use crate::hvg::HvgParams;
use crate::linear_model::{ContrastSpec, EbayesParams};
use crate::pca::PcaParams;
use crate::qc::QcThresholds;
use crate::single_cell::{MarkerParams, ScoreParams};

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Mouse single-cell DE table reused as a signature source for bulk GSEA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouseSignatureConfig {
    /// Exported single-cell DE table
    pub de_table: PathBuf,
    /// Two-column `source` / `target` ortholog table
    pub orthologs: PathBuf,
    /// Only rows of this cluster are used
    #[serde(default = "default_mouse_cluster")]
    pub cluster: String,
    #[serde(default = "Thresholds::export")]
    pub thresholds: Thresholds,
}

fn default_mouse_cluster() -> String {
    crate::single_cell::ALL_CELLS.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkConfig {
    pub sample_sheet: PathBuf,
    pub metadata: PathBuf,
    pub gene_counts: PathBuf,
    pub junction_counts: PathBuf,
    pub annotation: PathBuf,
    pub output_dir: PathBuf,

    /// GMT files or one-column gene lists
    #[serde(default)]
    pub gene_sets: Vec<PathBuf>,
    #[serde(default)]
    pub mouse_signatures: Option<MouseSignatureConfig>,
    /// Precomputed xCell scores (cell types x libraries)
    #[serde(default)]
    pub xcell: Option<PathBuf>,

    #[serde(default)]
    pub qc: QcThresholds,
    #[serde(default)]
    pub cohort: CohortParams,
    #[serde(default)]
    pub hvg: HvgParams,
    #[serde(default)]
    pub pca: PcaParams,
    #[serde(default = "ContrastSpec::smoking_defaults")]
    pub contrasts: Vec<ContrastSpec>,
    #[serde(default)]
    pub ebayes: EbayesParams,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub gsea: GseaParams,
}

impl BulkConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.contrasts.is_empty() {
            return Err(AnalysisError::Config {
                reason: "at least one contrast is required".to_string(),
            });
        }
        if self.gsea.min_size > self.gsea.max_size {
            return Err(AnalysisError::Config {
                reason: format!(
                    "gsea.min_size {} exceeds gsea.max_size {}",
                    self.gsea.min_size, self.gsea.max_size
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.cohort.gene_min_prop) {
            return Err(AnalysisError::Config {
                reason: "cohort.gene_min_prop must lie in [0, 1]".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleCellConfig {
    /// Log-normalised genes x cells matrix
    pub expression: PathBuf,
    /// Cell table with `cell`, `cluster` and `group` columns
    pub cells: PathBuf,
    pub output_dir: PathBuf,

    /// Signatures to score per cell
    #[serde(default)]
    pub signatures: Vec<PathBuf>,
    /// Genes always annotated on volcano plots when significant
    #[serde(default)]
    pub highlight_genes: Vec<String>,
    #[serde(default = "default_top_n")]
    pub top_n_labels: usize,

    #[serde(default)]
    pub markers: MarkerParams,
    #[serde(default)]
    pub scoring: ScoreParams,
    #[serde(default = "Thresholds::plot")]
    pub plot_thresholds: Thresholds,
    #[serde(default = "Thresholds::export")]
    pub export_thresholds: Thresholds,
}

fn default_top_n() -> usize {
    10
}

impl SingleCellConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.markers.treatment == self.markers.control {
            return Err(AnalysisError::Config {
                reason: "treatment and control groups must differ".to_string(),
            });
        }
        if self.scoring.workers == 0 || self.scoring.n_bins == 0 {
            return Err(AnalysisError::Config {
                reason: "scoring.workers and scoring.n_bins must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_bulk_defaults_fill_missing_blocks() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "sample_sheet": "sheet.tsv",
                "metadata": "meta.tsv",
                "gene_counts": "genes.tsv",
                "junction_counts": "sj.tsv",
                "annotation": "genes_ann.tsv",
                "output_dir": "out",
                "cohort": {{ "gene_min_counts": 5 }}
            }}"#
        )
        .unwrap();
        let config = BulkConfig::load(file.path()).unwrap();
        assert_eq!(config.cohort.gene_min_counts, 5.0);
        assert_eq!(config.cohort.gene_min_samples, 3);
        assert_eq!(config.contrasts.len(), 3);
        assert_eq!(config.thresholds, Thresholds::default());
        assert!(config.mouse_signatures.is_none());
    }

    #[test]
    fn test_single_cell_thresholds_are_independent() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{ "expression": "x.tsv", "cells": "c.tsv", "output_dir": "out",
                 "export_thresholds": {{ "padj": 0.01 }} }}"#
        )
        .unwrap();
        let config = SingleCellConfig::load(file.path()).unwrap();
        assert_eq!(config.plot_thresholds, Thresholds::plot());
        assert_eq!(config.export_thresholds.padj, 0.01);
        assert_eq!(config.export_thresholds.log2fc, 1.0);
        assert_eq!(config.markers.treatment, "TCDD");
    }

    #[test]
    fn test_missing_required_path_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "cells": "c.tsv", "output_dir": "out" }}"#).unwrap();
        assert!(SingleCellConfig::load(file.path()).is_err());
    }
}
