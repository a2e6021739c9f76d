//! Highly variable gene selection from the mean-variance trend
//!
//! Variance of log expression is regressed on its mean with loess; a gene's
//! overdispersion is its variance over the trend value at its mean.

use ndarray::{ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::trend::{loess_fit, LoessParams};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HvgParams {
    pub span: f64,
    pub n_top: usize,
}

impl Default for HvgParams {
    fn default() -> Self {
        Self { span: 0.3, n_top: 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HvgRecord {
    pub gene: String,
    /// Row of the gene in the input matrix
    #[serde(skip)]
    pub index: usize,
    pub mean: f64,
    pub variance: f64,
    pub fitted_variance: f64,
    pub overdispersion: f64,
    pub rank: usize,
}

/// All genes ranked by overdispersion plus the size of the top selection
#[derive(Debug, Clone)]
pub struct HvgResult {
    ranked: Vec<HvgRecord>,
    n_top: usize,
}

impl HvgResult {
    /// Every gene, most overdispersed first
    pub fn ranked(&self) -> &[HvgRecord] {
        &self.ranked
    }

    pub fn top(&self) -> &[HvgRecord] {
        &self.ranked[..self.n_top]
    }

    /// Input row indices of the top genes, in rank order
    pub fn top_indices(&self) -> Vec<usize> {
        self.top().iter().map(|r| r.index).collect()
    }

    pub fn top_genes(&self) -> Vec<String> {
        self.top().iter().map(|r| r.gene.clone()).collect()
    }
}

/// Rank genes of a log-expression matrix (genes x samples) by overdispersion
pub fn select_hvg(expr: ArrayView2<f64>, genes: &[String], params: &HvgParams) -> Result<HvgResult> {
    let (n_genes, n_samples) = expr.dim();
    if genes.len() != n_genes {
        return Err(AnalysisError::DimensionMismatch {
            expected: format!("{} gene names", n_genes),
            got: format!("{} gene names", genes.len()),
        });
    }
    if n_genes < 5 {
        return Err(AnalysisError::TrendFitting {
            reason: format!("need at least 5 genes for the variance trend, got {}", n_genes),
        });
    }
    if n_samples < 2 {
        return Err(AnalysisError::EmptyData {
            reason: "variance needs at least 2 samples".to_string(),
        });
    }

    let means: Vec<f64> = expr
        .axis_iter(Axis(0))
        .map(|row| row.mean().unwrap_or(f64::NAN))
        .collect();
    let variances: Vec<f64> = expr.axis_iter(Axis(0)).map(|row| row.var(1.0)).collect();

    let loess = LoessParams {
        span: params.span,
        degree: 2,
    };
    let fitted = loess_fit(&means, &variances, None, &loess)?;

    let mut ranked: Vec<HvgRecord> = (0..n_genes)
        .map(|i| {
            let overdispersion = overdispersion(variances[i], fitted[i]);
            HvgRecord {
                gene: genes[i].clone(),
                index: i,
                mean: means[i],
                variance: variances[i],
                fitted_variance: fitted[i],
                overdispersion,
                rank: 0,
            }
        })
        .collect();
    // Stable sort keeps gene order among ties
    ranked.sort_by(|a, b| b.overdispersion.total_cmp(&a.overdispersion));
    for (r, rec) in ranked.iter_mut().enumerate() {
        rec.rank = r + 1;
    }

    let n_top = params.n_top.min(n_genes);
    log::debug!(
        "HVG: top {} of {} genes, cutoff overdispersion {:.3}",
        n_top,
        n_genes,
        ranked.get(n_top.saturating_sub(1)).map_or(f64::NAN, |r| r.overdispersion)
    );
    Ok(HvgResult { ranked, n_top })
}

/// Variance over the trend value; zero when either is not positive
fn overdispersion(variance: f64, fitted: f64) -> f64 {
    if variance > 0.0 && fitted.is_finite() && fitted > 0.0 {
        variance / fitted
    } else {
        0.0
    }
}
