//! Preranked gene set enrichment with a per-size permutation null

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::de::{DeRecord, EnrichmentRecord, GeneSet};
use crate::error::{AnalysisError, Result};
use crate::testing::benjamini_hochberg;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GseaParams {
    pub min_size: usize,
    pub max_size: usize,
    pub n_perm: usize,
    pub seed: u64,
    /// Exponent applied to the ranking statistic when weighting hits
    pub gsea_param: f64,
}

impl Default for GseaParams {
    fn default() -> Self {
        Self {
            min_size: 10,
            max_size: 500,
            n_perm: 1000,
            seed: 42,
            gsea_param: 1.0,
        }
    }
}

/// Genes ordered by decreasing statistic
#[derive(Debug, Clone, PartialEq)]
pub struct RankedList {
    genes: Vec<String>,
    stats: Vec<f64>,
    index: HashMap<String, usize>,
}

impl RankedList {
    /// Rank (gene, statistic) pairs; non-finite statistics and repeated genes are dropped
    pub fn new(pairs: Vec<(String, f64)>) -> Result<Self> {
        let mut pairs: Vec<(String, f64)> = pairs.into_iter().filter(|(_, s)| s.is_finite()).collect();
        pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0)));

        let mut index = HashMap::with_capacity(pairs.len());
        let mut genes = Vec::with_capacity(pairs.len());
        let mut stats = Vec::with_capacity(pairs.len());
        for (gene, stat) in pairs {
            if index.contains_key(&gene) {
                continue;
            }
            index.insert(gene.clone(), genes.len());
            genes.push(gene);
            stats.push(stat);
        }
        if genes.is_empty() {
            return Err(AnalysisError::EmptyData {
                reason: "No finite statistics to rank".to_string(),
            });
        }
        Ok(Self { genes, stats, index })
    }

    /// Rank a DE table by log2 fold change
    pub fn from_records(records: &[DeRecord]) -> Result<Self> {
        Self::new(
            records
                .iter()
                .map(|r| (r.gene.clone(), r.log2_fold_change))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn stats(&self) -> &[f64] {
        &self.stats
    }

    /// Sorted positions of a set's members present in the list
    pub fn positions(&self, set: &GeneSet) -> Vec<usize> {
        let mut pos: Vec<usize> = set.genes().iter().filter_map(|g| self.index.get(g).copied()).collect();
        pos.sort_unstable();
        pos.dedup();
        pos
    }
}

/// Running-sum enrichment score for hits at sorted `positions`
///
/// Returns the score and the index (into `positions`) where it peaks.
pub fn enrichment_score(stats: &[f64], positions: &[usize], gsea_param: f64) -> (f64, usize) {
    let n = stats.len();
    let k = positions.len();
    if k == 0 || k >= n {
        return (0.0, 0);
    }
    let mut weights: Vec<f64> = positions.iter().map(|&p| stats[p].abs().powf(gsea_param)).collect();
    let mut norm: f64 = weights.iter().sum();
    if norm <= 0.0 {
        weights = vec![1.0; k];
        norm = k as f64;
    }
    let miss_step = 1.0 / (n - k) as f64;

    let mut cum = 0.0;
    let (mut top, mut top_at) = (f64::NEG_INFINITY, 0);
    let (mut bottom, mut bottom_at) = (f64::INFINITY, 0);
    for (i, (&p, &w)) in positions.iter().zip(weights.iter()).enumerate() {
        let misses = (p - i) as f64 * miss_step;
        let before = cum / norm - misses;
        cum += w;
        let after = cum / norm - misses;
        if after > top {
            top = after;
            top_at = i;
        }
        if before < bottom {
            bottom = before;
            bottom_at = i;
        }
    }
    if top.abs() > bottom.abs() {
        (top, top_at)
    } else {
        (bottom, bottom_at)
    }
}

/// Enrichment of every gene set within the size limits
///
/// Sets outside `[min_size, max_size]` after intersecting with the ranked
/// list are left out of the result. Records come back ordered by p-value.
pub fn gsea(
    ranked: &RankedList,
    sets: &[GeneSet],
    params: &GseaParams,
    contrast: &str,
    cohort: &str,
) -> Result<Vec<EnrichmentRecord>> {
    if params.n_perm == 0 {
        return Err(AnalysisError::Config {
            reason: "n_perm must be positive".to_string(),
        });
    }
    let n = ranked.len();
    let stats = ranked.stats();

    let mut tested: Vec<(&GeneSet, Vec<usize>)> = Vec::new();
    for set in sets {
        let pos = ranked.positions(set);
        if pos.len() < params.min_size || pos.len() > params.max_size || pos.len() >= n {
            log::debug!("{}: {} has {} ranked members, not tested", cohort, set.name(), pos.len());
            continue;
        }
        tested.push((set, pos));
    }
    if tested.is_empty() {
        log::warn!("{} {}: no gene set within size limits", cohort, contrast);
        return Ok(Vec::new());
    }

    let sizes: Vec<usize> = {
        let mut s: Vec<usize> = tested.iter().map(|(_, p)| p.len()).collect();
        s.sort_unstable();
        s.dedup();
        s
    };
    let nulls: BTreeMap<usize, Vec<f64>> = sizes
        .into_par_iter()
        .map(|size| {
            let mut rng = StdRng::seed_from_u64(params.seed + size as u64);
            let null: Vec<f64> = (0..params.n_perm)
                .map(|_| {
                    let mut pos = rand::seq::index::sample(&mut rng, n, size).into_vec();
                    pos.sort_unstable();
                    enrichment_score(stats, &pos, params.gsea_param).0
                })
                .collect();
            (size, null)
        })
        .collect();

    let mut records: Vec<EnrichmentRecord> = tested
        .iter()
        .map(|(set, pos)| {
            let (es, peak) = enrichment_score(stats, pos, params.gsea_param);
            let null = nulls.get(&pos.len()).map(Vec::as_slice).unwrap_or(&[]);
            let (pvalue, nes) = null_pvalue(es, null);
            let leading_edge = if es >= 0.0 {
                pos[..=peak].iter().map(|&p| ranked.genes()[p].clone()).collect()
            } else {
                pos[peak..].iter().rev().map(|&p| ranked.genes()[p].clone()).collect()
            };
            EnrichmentRecord {
                pathway: set.name().to_string(),
                es,
                nes,
                pvalue,
                padj: f64::NAN,
                size: pos.len(),
                leading_edge,
                contrast: contrast.to_string(),
                cohort: cohort.to_string(),
            }
        })
        .collect();

    let pvalues: Vec<f64> = records.iter().map(|r| r.pvalue).collect();
    for (r, q) in records.iter_mut().zip(benjamini_hochberg(&pvalues)) {
        r.padj = q;
    }
    records.sort_by(|a, b| a.pvalue.total_cmp(&b.pvalue).then_with(|| a.pathway.cmp(&b.pathway)));
    Ok(records)
}

/// P-value and normalised score against the same-sign part of the null
fn null_pvalue(es: f64, null: &[f64]) -> (f64, f64) {
    let same_sign: Vec<f64> = null
        .iter()
        .copied()
        .filter(|&v| if es >= 0.0 { v >= 0.0 } else { v < 0.0 })
        .collect();
    let extreme = same_sign
        .iter()
        .filter(|&&v| if es >= 0.0 { v >= es } else { v <= es })
        .count();
    let pvalue = (extreme as f64 + 1.0) / (same_sign.len() as f64 + 1.0);
    let mean_abs = same_sign.iter().map(|v| v.abs()).sum::<f64>() / same_sign.len() as f64;
    let nes = if mean_abs > 0.0 { es / mean_abs } else { f64::NAN };
    (pvalue, nes)
}
