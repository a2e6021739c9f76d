//! Trimmed mean of M-values (TMM) normalisation factors
//!
//! Follows edgeR's `calcNormFactors(method = "TMM")` defaults: the reference
//! library is the one whose upper-quartile proportion is closest to the mean,
//! M-values are trimmed 30% per tail, A-values 5% per tail, and the remaining
//! log-ratios are averaged with inverse-variance weights.

use ndarray::{ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::stats::{quantile_type7, rank_average};

/// Trimming and weighting parameters for TMM
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TmmParams {
    pub logratio_trim: f64,
    pub sum_trim: f64,
    pub do_weighting: bool,
    pub a_cutoff: f64,
}

impl Default for TmmParams {
    fn default() -> Self {
        Self {
            logratio_trim: 0.3,
            sum_trim: 0.05,
            do_weighting: true,
            a_cutoff: -1e10,
        }
    }
}

/// Compute TMM normalisation factors, scaled to a geometric mean of one
pub fn tmm_factors(counts: ArrayView2<f64>, params: &TmmParams) -> Result<Vec<f64>> {
    let (n_genes, n_samples) = counts.dim();
    if n_genes == 0 || n_samples == 0 {
        return Err(AnalysisError::EmptyData {
            reason: "Count matrix is empty".to_string(),
        });
    }
    if !(0.0..0.5).contains(&params.logratio_trim) || !(0.0..0.5).contains(&params.sum_trim) {
        return Err(AnalysisError::Config {
            reason: "TMM trim fractions must lie in [0, 0.5)".to_string(),
        });
    }

    let lib_sizes: Vec<f64> = counts.axis_iter(Axis(1)).map(|c| c.sum()).collect();
    if let Some(j) = lib_sizes.iter().position(|&l| l <= 0.0) {
        return Err(AnalysisError::InvalidCountMatrix {
            reason: format!("Sample {} has zero total counts", j),
        });
    }

    let ref_idx = reference_sample(counts, &lib_sizes);
    log::debug!("TMM reference sample index: {}", ref_idx);

    let factors: Vec<f64> = (0..n_samples)
        .map(|j| {
            tmm_factor(
                counts.column(j),
                counts.column(ref_idx),
                lib_sizes[j],
                lib_sizes[ref_idx],
                params,
            )
        })
        .collect();

    let log_mean = factors.iter().map(|f| f.ln()).sum::<f64>() / n_samples as f64;
    let center = log_mean.exp();
    Ok(factors.iter().map(|f| f / center).collect())
}

/// Library whose 75th percentile proportion is closest to the mean across libraries
fn reference_sample(counts: ArrayView2<f64>, lib_sizes: &[f64]) -> usize {
    let f75: Vec<f64> = counts
        .axis_iter(Axis(1))
        .zip(lib_sizes.iter())
        .map(|(col, &lib)| {
            let mut sorted = col.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            quantile_type7(&sorted, 0.75) / lib
        })
        .collect();
    let mean_f75 = f75.iter().sum::<f64>() / f75.len() as f64;

    f75.iter()
        .enumerate()
        .fold((0usize, f64::INFINITY), |(best, best_diff), (j, &f)| {
            let diff = (f - mean_f75).abs();
            if diff < best_diff {
                (j, diff)
            } else {
                (best, best_diff)
            }
        })
        .0
}

fn tmm_factor(
    obs: ArrayView1<f64>,
    reference: ArrayView1<f64>,
    n_obs: f64,
    n_ref: f64,
    params: &TmmParams,
) -> f64 {
    let mut log_r = Vec::new();
    let mut abs_e = Vec::new();
    let mut var = Vec::new();

    for (&o, &r) in obs.iter().zip(reference.iter()) {
        let lr = ((o / n_obs) / (r / n_ref)).log2();
        let ae = ((o / n_obs).log2() + (r / n_ref).log2()) / 2.0;
        if lr.is_finite() && ae.is_finite() && ae > params.a_cutoff {
            log_r.push(lr);
            abs_e.push(ae);
            var.push((n_obs - o) / n_obs / o + (n_ref - r) / n_ref / r);
        }
    }

    if log_r.is_empty() || log_r.iter().all(|v| v.abs() < 1e-6) {
        return 1.0;
    }

    let n = log_r.len() as f64;
    let lo_l = (n * params.logratio_trim).floor() + 1.0;
    let hi_l = n + 1.0 - lo_l;
    let lo_s = (n * params.sum_trim).floor() + 1.0;
    let hi_s = n + 1.0 - lo_s;

    let rank_r = rank_average(&log_r);
    let rank_e = rank_average(&abs_e);

    let mut num = 0.0;
    let mut den = 0.0;
    let mut n_kept = 0usize;
    for i in 0..log_r.len() {
        let keep = rank_r[i] >= lo_l && rank_r[i] <= hi_l && rank_e[i] >= lo_s && rank_e[i] <= hi_s;
        if !keep {
            continue;
        }
        n_kept += 1;
        if params.do_weighting {
            num += log_r[i] / var[i];
            den += 1.0 / var[i];
        } else {
            num += log_r[i];
            den += 1.0;
        }
    }

    let f = if n_kept == 0 || den <= 0.0 { 0.0 } else { num / den };
    if f.is_finite() {
        2f64.powf(f)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    #[test]
    fn test_identical_composition_gives_unit_factors() {
        // Sample 2 is sample 1 sequenced twice as deep
        let counts = Array2::from_shape_fn((50, 2), |(i, j)| ((i + 1) * 10 * (j + 1)) as f64);
        let factors = tmm_factors(counts.view(), &TmmParams::default()).unwrap();
        assert_relative_eq!(factors[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(factors[1], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_composition_shift_is_corrected() {
        // One highly expressed gene soaks up reads in sample 2
        let mut counts = Array2::from_shape_fn((200, 2), |(i, _)| (50 + i) as f64);
        counts[[0, 1]] = 40_000.0;
        let factors = tmm_factors(counts.view(), &TmmParams::default()).unwrap();
        // Effective library of sample 2 shrinks relative to its raw total
        assert!(factors[1] < 1.0);
        assert!(factors[1] < factors[0]);
        assert_relative_eq!(factors[0] * factors[1], 1.0, epsilon = 1e-9);
        let lib: Vec<f64> = counts.axis_iter(Axis(1)).map(|c| c.sum()).collect();
        assert_relative_eq!(lib[0] * factors[0], lib[1] * factors[1], max_relative = 1e-3);
    }

    #[test]
    fn test_zero_library_rejected() {
        let counts = Array2::from_shape_fn((5, 2), |(i, j)| if j == 1 { 0.0 } else { i as f64 + 1.0 });
        assert!(tmm_factors(counts.view(), &TmmParams::default()).is_err());
    }
}
