//! Principal component analysis of cohort samples
//!
//! Genes are centred (not scaled) and the samples x genes matrix is
//! decomposed with nalgebra's SVD, the same construction as `prcomp`.

use nalgebra::DMatrix;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcaParams {
    pub n_components: usize,
}

impl Default for PcaParams {
    fn default() -> Self {
        Self { n_components: 10 }
    }
}

#[derive(Debug, Clone)]
pub struct PcaResult {
    pub sample_ids: Vec<String>,
    pub gene_ids: Vec<String>,
    /// Samples x components
    pub scores: Array2<f64>,
    /// Genes x components
    pub loadings: Array2<f64>,
    pub singular_values: Vec<f64>,
    pub explained_variance_ratio: Vec<f64>,
}

impl PcaResult {
    pub fn n_components(&self) -> usize {
        self.singular_values.len()
    }

    pub fn component_names(&self) -> Vec<String> {
        (1..=self.n_components()).map(|k| format!("PC{}", k)).collect()
    }
}

/// PCA of a genes x samples expression matrix
pub fn pca(
    expr: ArrayView2<f64>,
    gene_ids: &[String],
    sample_ids: &[String],
    params: &PcaParams,
) -> Result<PcaResult> {
    let (n_genes, n_samples) = expr.dim();
    if gene_ids.len() != n_genes || sample_ids.len() != n_samples {
        return Err(AnalysisError::DimensionMismatch {
            expected: format!("{} genes x {} samples", n_genes, n_samples),
            got: format!("{} gene ids, {} sample ids", gene_ids.len(), sample_ids.len()),
        });
    }
    if n_genes < 2 || n_samples < 2 {
        return Err(AnalysisError::EmptyData {
            reason: format!("PCA needs at least 2 genes and 2 samples, got {} x {}", n_genes, n_samples),
        });
    }
    if expr.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::InvalidInput {
            reason: "PCA input contains non-finite values".to_string(),
        });
    }

    let centers: Vec<f64> = expr.rows().into_iter().map(|r| r.mean().unwrap_or(0.0)).collect();
    let x = DMatrix::from_fn(n_samples, n_genes, |s, g| expr[[g, s]] - centers[g]);

    let svd = x.svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => {
            return Err(AnalysisError::InvalidInput {
                reason: "SVD did not converge".to_string(),
            })
        }
    };

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));

    let total_ss: f64 = svd.singular_values.iter().map(|s| s * s).sum();
    // A centred matrix has rank at most n_samples - 1
    let k = params.n_components.max(1).min(n_samples - 1).min(n_genes);

    let mut scores = Array2::zeros((n_samples, k));
    let mut loadings = Array2::zeros((n_genes, k));
    let mut singular_values = Vec::with_capacity(k);
    let mut explained = Vec::with_capacity(k);

    for (c, &idx) in order.iter().take(k).enumerate() {
        let sv = svd.singular_values[idx];
        let lead = (0..n_genes)
            .max_by(|&a, &b| v_t[(idx, a)].abs().total_cmp(&v_t[(idx, b)].abs()))
            .unwrap_or(0);
        let sign = if v_t[(idx, lead)] < 0.0 { -1.0 } else { 1.0 };

        for g in 0..n_genes {
            loadings[[g, c]] = sign * v_t[(idx, g)];
        }
        for s in 0..n_samples {
            scores[[s, c]] = sign * u[(s, idx)] * sv;
        }
        singular_values.push(sv);
        explained.push(if total_ss > 0.0 { sv * sv / total_ss } else { 0.0 });
    }

    log::debug!(
        "PCA: {} components, PC1 explains {:.1}%",
        k,
        explained.first().copied().unwrap_or(0.0) * 100.0
    );

    Ok(PcaResult {
        sample_ids: sample_ids.to_vec(),
        gene_ids: gene_ids.to_vec(),
        scores,
        loadings,
        singular_values,
        explained_variance_ratio: explained,
    })
}
