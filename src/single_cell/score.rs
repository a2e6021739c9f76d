//! Per-cell signature scores against expression-matched control genes
//!
//! Genes are split into equal-frequency bins of average expression. For
//! every signature gene, control genes are drawn from its bin; a cell's
//! score is the mean of its signature genes minus the mean of the pooled
//! control genes.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::data::SingleCellData;
use crate::de::GeneSet;
use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreParams {
    pub n_bins: usize,
    pub n_ctrl: usize,
    pub seed: u64,
    /// Threads used for scoring cells
    pub workers: usize,
}

impl Default for ScoreParams {
    fn default() -> Self {
        Self {
            n_bins: 24,
            n_ctrl: 100,
            seed: 1,
            workers: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureScore {
    pub signature: String,
    /// One score per cell, in cell order
    pub scores: Vec<f64>,
    pub genes_used: Vec<String>,
    pub genes_missing: Vec<String>,
}

/// Equal-frequency bin of each gene by average expression, ties by gene order
pub fn expression_bins(means: &[f64], n_bins: usize) -> Vec<usize> {
    let n = means.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| means[a].total_cmp(&means[b]));
    let mut bins = vec![0; n];
    for (rank, &g) in order.iter().enumerate() {
        bins[g] = rank * n_bins / n.max(1);
    }
    bins
}

/// Score every cell for each signature
pub fn score_signatures(
    data: &SingleCellData,
    signatures: &[GeneSet],
    params: &ScoreParams,
) -> Result<Vec<SignatureScore>> {
    if params.n_bins == 0 || params.workers == 0 {
        return Err(AnalysisError::Config {
            reason: "n_bins and workers must be positive".to_string(),
        });
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(params.workers)
        .build()
        .map_err(|e| AnalysisError::Config {
            reason: format!("cannot build scoring thread pool: {}", e),
        })?;

    let bins = expression_bins(&data.gene_means(), params.n_bins);
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); params.n_bins];
    for (g, &b) in bins.iter().enumerate() {
        members[b].push(g);
    }

    signatures
        .iter()
        .enumerate()
        .map(|(k, signature)| {
            let mut used = Vec::new();
            let mut missing = Vec::new();
            for gene in signature.genes() {
                match data.gene_index(gene) {
                    Some(i) => used.push(i),
                    None => missing.push(gene.clone()),
                }
            }
            if !missing.is_empty() {
                log::warn!(
                    "Signature {}: {} of {} genes absent from the data",
                    signature.name(),
                    missing.len(),
                    signature.len()
                );
            }
            if used.is_empty() {
                log::warn!("Signature {}: no genes present, scores are NaN", signature.name());
                return Ok(SignatureScore {
                    signature: signature.name().to_string(),
                    scores: vec![f64::NAN; data.n_cells()],
                    genes_used: Vec::new(),
                    genes_missing: missing,
                });
            }

            let mut rng = StdRng::seed_from_u64(params.seed + k as u64);
            let mut controls = BTreeSet::new();
            for &g in &used {
                let pool_genes = &members[bins[g]];
                let amount = params.n_ctrl.min(pool_genes.len());
                for idx in rand::seq::index::sample(&mut rng, pool_genes.len(), amount).iter() {
                    controls.insert(pool_genes[idx]);
                }
            }
            let controls: Vec<usize> = controls.into_iter().collect();

            let expr = data.expr();
            let scores: Vec<f64> = pool.install(|| {
                (0..data.n_cells())
                    .into_par_iter()
                    .map(|c| {
                        let sig = used.iter().map(|&g| expr[[g, c]]).sum::<f64>() / used.len() as f64;
                        let ctrl = controls.iter().map(|&g| expr[[g, c]]).sum::<f64>() / controls.len() as f64;
                        sig - ctrl
                    })
                    .collect()
            });

            Ok(SignatureScore {
                signature: signature.name().to_string(),
                scores,
                genes_used: used.iter().map(|&g| data.genes()[g].clone()).collect(),
                genes_missing: missing,
            })
        })
        .collect()
}
