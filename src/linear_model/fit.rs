//! Per-gene ordinary least squares fits and contrasts

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rayon::prelude::*;

use super::design::Design;
use crate::error::{AnalysisError, Result};

/// Gene-wise linear model fit
#[derive(Debug, Clone)]
pub struct LinearFit {
    /// Genes x coefficients
    pub coefficients: Array2<f64>,
    /// Residual variance per gene
    pub sigma2: Vec<f64>,
    /// Residual degrees of freedom per gene
    pub df_residual: Vec<f64>,
    /// `(X'X)^-1`, shared by all genes
    pub cov_unscaled: Array2<f64>,
    /// Average log expression per gene
    pub amean: Vec<f64>,
}

/// Estimates for one contrast across genes
#[derive(Debug, Clone)]
pub struct ContrastFit {
    pub coefficient: Vec<f64>,
    pub stdev_unscaled: Vec<f64>,
    pub sigma2: Vec<f64>,
    pub df_residual: Vec<f64>,
    pub amean: Vec<f64>,
}

/// Fit `expr[g, ] ~ design` for every gene (genes x samples input)
pub fn lm_fit(expr: ArrayView2<f64>, design: &Design) -> Result<LinearFit> {
    let (_, n_samples) = expr.dim();
    if n_samples != design.n_samples() {
        return Err(AnalysisError::DimensionMismatch {
            expected: format!("{} samples in design", design.n_samples()),
            got: format!("{} samples in expression", n_samples),
        });
    }
    if expr.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::InvalidInput {
            reason: "Expression matrix contains non-finite values".to_string(),
        });
    }

    let p = design.n_coefs();
    let x = DMatrix::from_fn(n_samples, p, |i, j| design.matrix()[[i, j]]);
    let xtx = x.transpose() * &x;
    let xtx_inv = xtx
        .cholesky()
        .map(|c| c.inverse())
        .ok_or_else(|| AnalysisError::InvalidDesign {
            reason: "Design matrix is not of full column rank".to_string(),
        })?;
    // Rows of (X'X)^-1 X' give coefficients directly
    let projection = &xtx_inv * x.transpose();
    let df = design.df_residual() as f64;

    let per_gene: Vec<(Vec<f64>, f64)> = (0..expr.nrows())
        .into_par_iter()
        .map(|g| {
            let y = DVector::from_iterator(n_samples, expr.row(g).iter().copied());
            let beta = &projection * &y;
            let resid = &y - &x * &beta;
            let s2 = if df > 0.0 {
                resid.norm_squared() / df
            } else {
                f64::NAN
            };
            (beta.iter().copied().collect(), s2)
        })
        .collect();

    let n_genes = per_gene.len();
    let mut coefficients = Array2::zeros((n_genes, p));
    let mut sigma2 = Vec::with_capacity(n_genes);
    for (g, (beta, s2)) in per_gene.into_iter().enumerate() {
        for (j, b) in beta.into_iter().enumerate() {
            coefficients[[g, j]] = b;
        }
        sigma2.push(s2);
    }

    let amean = expr
        .axis_iter(Axis(0))
        .map(|r| r.mean().unwrap_or(f64::NAN))
        .collect();

    Ok(LinearFit {
        coefficients,
        sigma2,
        df_residual: vec![df; n_genes],
        cov_unscaled: Array2::from_shape_fn((p, p), |(i, j)| xtx_inv[(i, j)]),
        amean,
    })
}

/// Re-express a fit in terms of one contrast `c' beta`
pub fn contrasts_fit(fit: &LinearFit, contrast: &Array1<f64>) -> Result<ContrastFit> {
    let p = fit.coefficients.ncols();
    if contrast.len() != p {
        return Err(AnalysisError::InvalidContrast {
            reason: format!("contrast has {} weights for {} coefficients", contrast.len(), p),
        });
    }
    let var_unscaled = contrast.dot(&fit.cov_unscaled.dot(contrast));
    if !(var_unscaled > 0.0) {
        return Err(AnalysisError::InvalidContrast {
            reason: "contrast has zero variance".to_string(),
        });
    }
    Ok(ContrastFit {
        coefficient: fit.coefficients.dot(contrast).to_vec(),
        stdev_unscaled: vec![var_unscaled.sqrt(); fit.coefficients.nrows()],
        sigma2: fit.sigma2.clone(),
        df_residual: fit.df_residual.clone(),
        amean: fit.amean.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear_model::ContrastSpec;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn design() -> Design {
        let labels: Vec<String> = ["control", "control", "control", "cigarette", "cigarette", "cigarette"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Design::cell_means(&labels).unwrap()
    }

    #[test]
    fn test_cell_means_coefficients_are_group_means() {
        let expr = array![[1.0, 2.0, 3.0, 7.0, 8.0, 9.0], [5.0, 5.0, 5.0, 5.0, 5.0, 5.0]];
        let fit = lm_fit(expr.view(), &design()).unwrap();

        // levels sorted: cigarette, control
        assert_relative_eq!(fit.coefficients[[0, 0]], 8.0, epsilon = 1e-12);
        assert_relative_eq!(fit.coefficients[[0, 1]], 2.0, epsilon = 1e-12);
        // pooled variance: (2 + 2) / 4
        assert_relative_eq!(fit.sigma2[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(fit.sigma2[1], 0.0, epsilon = 1e-12);
        assert_eq!(fit.df_residual[0], 4.0);
        assert_relative_eq!(fit.amean[0], 5.0);
    }

    #[test]
    fn test_contrast_fit() {
        let expr = array![[1.0, 2.0, 3.0, 7.0, 8.0, 9.0]];
        let d = design();
        let fit = lm_fit(expr.view(), &d).unwrap();
        let c = d
            .contrast_vector(&ContrastSpec::new("cig_vs_ctrl", "cigarette", "control"))
            .unwrap();
        let cf = contrasts_fit(&fit, &c).unwrap();
        assert_relative_eq!(cf.coefficient[0], 6.0, epsilon = 1e-12);
        // sqrt(1/3 + 1/3)
        assert_relative_eq!(cf.stdev_unscaled[0], (2.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    }
}
