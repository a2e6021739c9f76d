//! Threshold calls and volcano annotation
//!
//! Everything here is a pure function of the records and thresholds so the
//! same table can be relabelled for plotting and for export.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::record::{DeCall, DeRecord};

/// Adjusted p-value and absolute log2 fold change cutoffs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub padj: f64,
    pub log2fc: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            padj: 0.05,
            log2fc: 1.0,
        }
    }
}

impl Thresholds {
    pub fn new(padj: f64, log2fc: f64) -> Self {
        Self { padj, log2fc }
    }

    /// Cutoffs used to colour single-cell volcano plots
    pub fn plot() -> Self {
        Self::new(1e-10, 1.0)
    }

    /// Cutoffs used for the exported single-cell table
    pub fn export() -> Self {
        Self::new(1e-5, 1.0)
    }
}

/// Call a gene `up`, `dn` or `no`; NaN inputs are always `no`
pub fn call_for(padj: f64, log2fc: f64, thresholds: &Thresholds) -> DeCall {
    if padj.is_nan() || log2fc.is_nan() || padj >= thresholds.padj {
        DeCall::No
    } else if log2fc > thresholds.log2fc {
        DeCall::Up
    } else if log2fc < -thresholds.log2fc {
        DeCall::Down
    } else {
        DeCall::No
    }
}

/// Relabel records in place under new thresholds
pub fn relabel(records: &mut [DeRecord], thresholds: &Thresholds) {
    for r in records.iter_mut() {
        r.call = call_for(r.padj, r.log2_fold_change, thresholds);
    }
}

/// A record placed on volcano axes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolcanoPoint {
    pub gene: String,
    pub log2_fold_change: f64,
    pub neg_log10_padj: f64,
    pub call: DeCall,
    pub annotate: bool,
}

/// Place records on volcano axes and choose which genes get a text label
///
/// The `top_n` most significant genes of each direction are annotated,
/// plus every gene named in `highlight` that is present.
pub fn label_volcano(
    records: &[DeRecord],
    thresholds: &Thresholds,
    highlight: &[String],
    top_n: usize,
) -> Vec<VolcanoPoint> {
    let calls: Vec<DeCall> = records
        .iter()
        .map(|r| call_for(r.padj, r.log2_fold_change, thresholds))
        .collect();

    let mut annotate = vec![false; records.len()];
    for direction in [DeCall::Up, DeCall::Down] {
        let mut idx: Vec<usize> = (0..records.len()).filter(|&i| calls[i] == direction).collect();
        idx.sort_by(|&a, &b| {
            records[a]
                .padj
                .total_cmp(&records[b].padj)
                .then(records[b].log2_fold_change.abs().total_cmp(&records[a].log2_fold_change.abs()))
                .then(a.cmp(&b))
        });
        for &i in idx.iter().take(top_n) {
            annotate[i] = true;
        }
    }

    let highlight: HashSet<&str> = highlight.iter().map(|s| s.as_str()).collect();
    records
        .iter()
        .zip(calls)
        .zip(annotate)
        .map(|((r, call), top)| VolcanoPoint {
            gene: r.gene.clone(),
            log2_fold_change: r.log2_fold_change,
            neg_log10_padj: neg_log10(r.padj),
            call,
            annotate: top || highlight.contains(r.gene.as_str()),
        })
        .collect()
}

/// `-log10(p)` with zero floored at the smallest positive double
pub fn neg_log10(p: f64) -> f64 {
    if p.is_nan() {
        return f64::NAN;
    }
    -(p.max(f64::MIN_POSITIVE)).log10()
}
