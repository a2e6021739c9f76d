//! ahr_rnaseq: RNA-seq analysis of AHR signalling after smoking and TCDD exposure
//!
//! Two pipelines share the same statistics:
//!
//! - single-cell: per-cluster Wilcoxon markers for TCDD vs vehicle, signature
//!   scoring and volcano labelling;
//! - bulk: sample QC, per-(study, tissue) cohorts with TMM log-CPM, highly
//!   variable genes, PCA, limma-style moderated contrasts between smoking
//!   types, preranked GSEA and xCell side tables.
//!
//! # Example
//!
//! ```ignore
//! use ahr_rnaseq::prelude::*;
//!
//! let config = BulkConfig::load("bulk.json")?;
//! let report = ahr_rnaseq::pipeline::bulk::run(&config)?;
//! for cohort in &report.cohorts {
//!     for summary in &cohort.de {
//!         println!("{}", summary);
//!     }
//! }
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod de;
pub mod deconvolution;
pub mod enrichment;
pub mod error;
pub mod hvg;
pub mod io;
pub mod linear_model;
pub mod normalization;
pub mod orthology;
pub mod pca;
pub mod pipeline;
pub mod qc;
pub mod single_cell;
pub mod stats;
pub mod testing;
pub mod trend;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{BulkConfig, SingleCellConfig};
    pub use crate::data::{build_cohorts, Cohort, CohortParams, CountMatrix, GeneAnnotation, SampleTable};
    pub use crate::de::{call_for, label_volcano, DeCall, DeRecord, DeSummary, EnrichmentRecord, GeneSet, Thresholds};
    pub use crate::enrichment::{gsea, GseaParams, RankedList};
    pub use crate::error::{AnalysisError, Result};
    pub use crate::hvg::{select_hvg, HvgParams};
    pub use crate::io::{read_count_matrix, read_gene_sets, write_de_table, write_enrichment_table};
    pub use crate::linear_model::{differential_expression, ContrastSpec, EbayesParams};
    pub use crate::orthology::{translate, OrthologSource, OrthologTable};
    pub use crate::pca::{pca, PcaParams};
    pub use crate::qc::{compute_qc, filter_samples, QcThresholds};
    pub use crate::single_cell::{markers_by_cluster, score_signatures, MarkerParams, ScoreParams, SingleCellData};
}
