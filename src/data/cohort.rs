//! Immutable per-(study, tissue) cohort
//!
//! A cohort is assembled once by [`Cohort::build`]: samples are subset, genes
//! filtered and keyed by unique symbol, and TMM log-CPM computed. There is no
//! mutating API afterwards.

use std::collections::HashMap;

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::count_matrix::{first_difference, CountMatrix};
use super::gene::{GeneAnnotation, GeneRecord};
use super::sample::SampleTable;
use crate::error::{AnalysisError, Result};
use crate::normalization::{cpm, log_cpm, tmm_factors, TmmParams};

/// Parameters for cohort construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortParams {
    /// Minimum count for a sample to count as expressing a gene
    pub gene_min_counts: f64,
    /// Floor on the number of expressing samples
    pub gene_min_samples: usize,
    /// Fraction of the cohort's samples that must express a gene
    pub gene_min_prop: f64,
    /// Pseudocount added to CPM before log2
    pub prior_count: f64,
    /// Cohorts with fewer samples are skipped
    pub min_cohort_samples: usize,
    pub tmm: TmmParams,
}

impl Default for CohortParams {
    fn default() -> Self {
        Self {
            gene_min_counts: 10.0,
            gene_min_samples: 3,
            gene_min_prop: 0.2,
            prior_count: 1.0,
            min_cohort_samples: 2,
            tmm: TmmParams::default(),
        }
    }
}

/// Normalised expression of one (study, tissue) cohort
#[derive(Debug, Clone)]
pub struct Cohort {
    name: String,
    samples: SampleTable,
    counts: CountMatrix,
    genes: Vec<GeneRecord>,
    norm_factors: Vec<f64>,
    lib_sizes: Vec<f64>,
    log_cpm: Array2<f64>,
}

impl Cohort {
    /// Build a cohort from its samples and the full gene-level count matrix
    pub fn build(
        name: &str,
        samples: &SampleTable,
        counts: &CountMatrix,
        annotation: &GeneAnnotation,
        params: &CohortParams,
    ) -> Result<Self> {
        if samples.is_empty() {
            return Err(AnalysisError::EmptyData {
                reason: format!("cohort '{}' has no samples", name),
            });
        }

        let counts = counts.select_samples(&samples.libraries())?;

        let keep = counts.expressed_genes(
            params.gene_min_counts,
            params.gene_min_samples,
            params.gene_min_prop,
        );
        if keep.is_empty() {
            return Err(AnalysisError::EmptyData {
                reason: format!("cohort '{}' has no genes passing the expression filter", name),
            });
        }
        log::debug!(
            "{}: {} of {} genes pass the expression filter",
            name,
            keep.len(),
            counts.n_genes()
        );
        let filtered = counts.subset_genes(&keep)?;

        let raw_cpm = cpm(
            filtered.counts(),
            &filtered.library_sizes(),
            &vec![1.0; filtered.n_samples()],
        )?;
        let mean_cpm: Vec<f64> = raw_cpm.rows().into_iter().map(|r| r.mean().unwrap_or(0.0)).collect();
        let symbols: Vec<String> = filtered
            .gene_ids()
            .iter()
            .map(|id| annotation.symbol(id).to_string())
            .collect();

        let unique = resolve_duplicate_symbols(&symbols, &mean_cpm);
        if unique.len() < symbols.len() {
            log::debug!(
                "{}: {} rows dropped as duplicate symbols",
                name,
                symbols.len() - unique.len()
            );
        }

        let genes: Vec<GeneRecord> = unique
            .iter()
            .map(|&i| {
                let gene_id = &filtered.gene_ids()[i];
                GeneRecord {
                    gene_id: gene_id.clone(),
                    gene_name: symbols[i].clone(),
                    chromosome: annotation.chromosome(gene_id).to_string(),
                    mean_expression: mean_cpm[i],
                }
            })
            .collect();
        let counts = filtered
            .subset_genes(&unique)?
            .with_gene_ids(genes.iter().map(|g| g.gene_name.clone()).collect())?;

        let lib_sizes = counts.library_sizes();
        let norm_factors = tmm_factors(counts.counts(), &params.tmm)?;
        let log_cpm = log_cpm(counts.counts(), &lib_sizes, &norm_factors, params.prior_count)?;

        let cohort = Self {
            name: name.to_string(),
            samples: samples.clone(),
            counts,
            genes,
            norm_factors,
            lib_sizes,
            log_cpm,
        };
        cohort.check_invariants()?;
        log::info!(
            "Cohort {}: {} samples, {} genes",
            cohort.name,
            cohort.n_samples(),
            cohort.n_genes()
        );
        Ok(cohort)
    }

    fn check_invariants(&self) -> Result<()> {
        let libraries = self.samples.libraries();
        if let Some(detail) = first_difference(self.counts.sample_ids(), &libraries) {
            return Err(AnalysisError::AlignmentMismatch {
                what: format!("cohort '{}' count columns vs sample table", self.name),
                detail,
            });
        }
        let symbols: Vec<String> = self.genes.iter().map(|g| g.gene_name.clone()).collect();
        if let Some(detail) = first_difference(self.counts.gene_ids(), &symbols) {
            return Err(AnalysisError::AlignmentMismatch {
                what: format!("cohort '{}' expression rows vs gene records", self.name),
                detail,
            });
        }
        if self.log_cpm.dim() != (self.genes.len(), libraries.len()) {
            return Err(AnalysisError::DimensionMismatch {
                expected: format!("{} x {}", self.genes.len(), libraries.len()),
                got: format!("{} x {}", self.log_cpm.nrows(), self.log_cpm.ncols()),
            });
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn samples(&self) -> &SampleTable {
        &self.samples
    }

    pub fn counts(&self) -> &CountMatrix {
        &self.counts
    }

    pub fn genes(&self) -> &[GeneRecord] {
        &self.genes
    }

    /// Unique gene symbols, in row order
    pub fn symbols(&self) -> &[String] {
        self.counts.gene_ids()
    }

    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn norm_factors(&self) -> &[f64] {
        &self.norm_factors
    }

    pub fn lib_sizes(&self) -> &[f64] {
        &self.lib_sizes
    }

    /// log2-CPM matrix, genes x samples
    pub fn log_cpm(&self) -> ArrayView2<'_, f64> {
        self.log_cpm.view()
    }

    /// TMM-normalised CPM (recomputed from counts)
    pub fn cpm(&self) -> Result<Array2<f64>> {
        cpm(self.counts.counts(), &self.lib_sizes, &self.norm_factors)
    }

    /// log2-CPM row of a gene; `None` when the gene did not survive filtering
    pub fn expression(&self, symbol: &str) -> Option<ArrayView1<'_, f64>> {
        self.counts.gene_index(symbol).map(|i| self.log_cpm.row(i))
    }
}

/// Row indices to keep so each symbol appears once
///
/// Among rows sharing a symbol the one with the highest mean expression wins;
/// ties go to the earliest row. Kept rows stay in their original order.
pub fn resolve_duplicate_symbols(symbols: &[String], mean_expression: &[f64]) -> Vec<usize> {
    let mut best: HashMap<&str, usize> = HashMap::with_capacity(symbols.len());
    for (i, symbol) in symbols.iter().enumerate() {
        best.entry(symbol.as_str())
            .and_modify(|b| {
                if mean_expression[i] > mean_expression[*b] {
                    *b = i;
                }
            })
            .or_insert(i);
    }
    let mut keep: Vec<usize> = best.into_values().collect();
    keep.sort_unstable();
    keep
}

/// Build one cohort per (study, tissue) pair, in order of first appearance
///
/// Cohorts below `min_cohort_samples` are skipped with a warning.
pub fn build_cohorts(
    samples: &SampleTable,
    counts: &CountMatrix,
    annotation: &GeneAnnotation,
    params: &CohortParams,
) -> Result<Vec<Cohort>> {
    let mut cohorts = Vec::new();
    for (study, tissue) in samples.cohort_keys() {
        let subset = samples.subset_cohort(&study, &tissue);
        let name = format!("{}_{}", study, tissue);
        if subset.len() < params.min_cohort_samples {
            log::warn!(
                "Skipping cohort {}: {} samples (minimum {})",
                name,
                subset.len(),
                params.min_cohort_samples
            );
            continue;
        }
        cohorts.push(Cohort::build(&name, &subset, counts, annotation, params)?);
    }
    Ok(cohorts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{QcMetrics, SampleRecord};
    use ndarray::array;

    fn samples(libs: &[&str]) -> SampleTable {
        SampleTable::new(
            libs.iter()
                .map(|l| SampleRecord {
                    study: "S1".into(),
                    patient: format!("p{}", l),
                    sample: l.to_string(),
                    library: l.to_string(),
                    tissue: "airway".into(),
                    smoking_type: "control".into(),
                    smoking_status: "never".into(),
                    qc: QcMetrics::default(),
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_duplicates_keeps_highest_mean() {
        let symbols: Vec<String> = ["A", "B", "A", "C", "B"].iter().map(|s| s.to_string()).collect();
        let means = vec![5.0, 3.0, 9.0, 1.0, 3.0];
        assert_eq!(resolve_duplicate_symbols(&symbols, &means), vec![1, 2, 3]);
    }

    #[test]
    fn test_build_reorders_and_keys_by_symbol() {
        let counts = CountMatrix::new(
            array![
                [100.0, 120.0, 90.0],
                [20.0, 25.0, 30.0],
                [500.0, 450.0, 480.0],
                [0.0, 1.0, 0.0],
            ],
            vec!["E1".into(), "E2".into(), "E3".into(), "E4".into()],
            vec!["L3".into(), "L1".into(), "L2".into()],
        )
        .unwrap();
        let mut ann = GeneAnnotation::new();
        ann.insert("E1", "CYP1A1", "15");
        ann.insert("E2", "CYP1A1", "15");
        ann.insert("E3", "ACTB", "7");

        let params = CohortParams {
            gene_min_samples: 2,
            ..CohortParams::default()
        };
        let cohort = Cohort::build("S1_airway", &samples(&["L1", "L2", "L3"]), &counts, &ann, &params).unwrap();

        assert_eq!(cohort.counts().sample_ids(), &["L1", "L2", "L3"]);
        assert_eq!(cohort.symbols(), &["CYP1A1".to_string(), "ACTB".to_string()]);
        assert_eq!(cohort.genes()[0].gene_id, "E1");
        assert_eq!(cohort.log_cpm().dim(), (2, 3));
        assert!(cohort.expression("E4").is_none());
        assert!(cohort.expression("ACTB").is_some());
    }

    #[test]
    fn test_build_fails_on_missing_library() {
        let counts = CountMatrix::new(
            array![[10.0, 20.0]],
            vec!["E1".into()],
            vec!["L1".into(), "L2".into()],
        )
        .unwrap();
        let err = Cohort::build(
            "x",
            &samples(&["L1", "L9"]),
            &counts,
            &GeneAnnotation::new(),
            &CohortParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::AlignmentMismatch { .. }));
    }
}
