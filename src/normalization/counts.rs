//! Counts per million and log2-CPM
//!
//! Effective library size is the raw column sum times the TMM factor, the
//! way edgeR's `cpm()` uses `lib.size * norm.factors`.

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{AnalysisError, Result};

/// Counts per million on effective library sizes
///
/// Each column of the result sums to `1e6 / norm_factor`.
pub fn cpm(counts: ArrayView2<f64>, lib_sizes: &[f64], norm_factors: &[f64]) -> Result<Array2<f64>> {
    let n_samples = counts.ncols();
    if lib_sizes.len() != n_samples || norm_factors.len() != n_samples {
        return Err(AnalysisError::DimensionMismatch {
            expected: format!("{} library sizes and normalisation factors", n_samples),
            got: format!("{} and {}", lib_sizes.len(), norm_factors.len()),
        });
    }

    let mut result = counts.to_owned();
    for (j, mut col) in result.axis_iter_mut(Axis(1)).enumerate() {
        let effective = lib_sizes[j] * norm_factors[j];
        if effective <= 0.0 || !effective.is_finite() {
            return Err(AnalysisError::InvalidCountMatrix {
                reason: format!("Sample {} has a non-positive effective library size", j),
            });
        }
        col.mapv_inplace(|x| x / effective * 1e6);
    }
    Ok(result)
}

/// `log2(cpm + prior_count)`
pub fn log_cpm(
    counts: ArrayView2<f64>,
    lib_sizes: &[f64],
    norm_factors: &[f64],
    prior_count: f64,
) -> Result<Array2<f64>> {
    if prior_count <= 0.0 {
        return Err(AnalysisError::Config {
            reason: format!("prior_count must be positive, got {}", prior_count),
        });
    }
    let mut result = cpm(counts, lib_sizes, norm_factors)?;
    result.mapv_inplace(|x| (x + prior_count).log2());
    Ok(result)
}
