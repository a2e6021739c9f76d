//! Local polynomial regression (loess)
//!
//! Matches R `loess(y ~ x, span, degree)` with `family = "gaussian"`: each
//! point is fitted by weighted least squares on its `floor(n * span)` nearest
//! neighbours with tricube weights. Fits are evaluated exactly at the
//! requested points rather than interpolated from a kd-tree.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoessParams {
    /// Fraction of points in each local neighbourhood
    pub span: f64,
    /// Local polynomial degree, 1 or 2
    pub degree: usize,
}

impl Default for LoessParams {
    fn default() -> Self {
        Self { span: 0.3, degree: 2 }
    }
}

/// A loess smoother over fixed data
#[derive(Debug, Clone)]
pub struct Loess {
    xd: Vec<f64>,
    yd: Vec<f64>,
    obs_weights: Vec<f64>,
    k: usize,
    degree: usize,
    span: f64,
}

impl Loess {
    /// Prepare a smoother; non-finite observations are ignored
    pub fn new(x: &[f64], y: &[f64], weights: Option<&[f64]>, params: &LoessParams) -> Result<Self> {
        if x.len() != y.len() || weights.map_or(false, |w| w.len() != x.len()) {
            return Err(AnalysisError::DimensionMismatch {
                expected: format!("{} observations", x.len()),
                got: format!("{} responses", y.len()),
            });
        }
        if !(params.span > 0.0) || !(1..=2).contains(&params.degree) {
            return Err(AnalysisError::Config {
                reason: format!(
                    "loess needs span > 0 and degree 1 or 2 (got {}, {})",
                    params.span, params.degree
                ),
            });
        }

        let mut data: Vec<(f64, f64, f64)> = (0..x.len())
            .map(|i| (x[i], y[i], weights.map_or(1.0, |w| w[i])))
            .filter(|(x, y, w)| x.is_finite() && y.is_finite() && w.is_finite() && *w > 0.0)
            .collect();
        let n = data.len();
        if n < params.degree + 2 {
            return Err(AnalysisError::TrendFitting {
                reason: format!("loess needs at least {} finite points, got {}", params.degree + 2, n),
            });
        }
        data.sort_by(|a, b| a.0.total_cmp(&b.0));

        let k = ((n as f64 * params.span).floor() as usize).clamp(params.degree + 1, n);
        Ok(Self {
            xd: data.iter().map(|d| d.0).collect(),
            yd: data.iter().map(|d| d.1).collect(),
            obs_weights: data.iter().map(|d| d.2).collect(),
            k,
            degree: params.degree,
            span: params.span,
        })
    }

    /// Fitted value at `x`
    pub fn predict(&self, x: f64) -> f64 {
        let n = self.xd.len();
        let (l, r) = self.neighbourhood(x);
        let mut h = (x - self.xd[l]).abs().max((self.xd[r] - x).abs());
        if self.span > 1.0 {
            h *= self.span.sqrt();
        }
        // Every neighbour ties with x
        if h <= 0.0 {
            h = 1e-10;
        }

        let mut m = [[0.0f64; 3]; 3];
        let mut b = [0.0f64; 3];
        let mut sum_w = 0.0;
        let mut sum_wy = 0.0;
        for j in 0..n {
            let dx = self.xd[j] - x;
            let u = dx.abs() / h;
            if u >= 1.0 {
                continue;
            }
            let t = 1.0 - u * u * u;
            let w = t * t * t * self.obs_weights[j];
            let basis = [1.0, dx, dx * dx];
            for p in 0..=self.degree {
                for q in 0..=self.degree {
                    m[p][q] += w * basis[p] * basis[q];
                }
                b[p] += w * basis[p] * self.yd[j];
            }
            sum_w += w;
            sum_wy += w * self.yd[j];
        }

        if sum_w <= 0.0 {
            return self.yd[l..=r].iter().sum::<f64>() / (r - l + 1) as f64;
        }
        let fallback = sum_wy / sum_w;
        match self.degree {
            2 => solve3_intercept(&m, &b)
                .or_else(|| solve2_intercept(&m, &b))
                .unwrap_or(fallback),
            _ => solve2_intercept(&m, &b).unwrap_or(fallback),
        }
    }

    /// Fitted values at many points, in input order
    pub fn predict_many(&self, x: &[f64]) -> Vec<f64> {
        x.par_iter().map(|&xi| self.predict(xi)).collect()
    }

    /// Indices [l, r] of the k nearest neighbours of `x` in the sorted data
    fn neighbourhood(&self, x: f64) -> (usize, usize) {
        let n = self.xd.len();
        let z = match self.xd.binary_search_by(|v| v.total_cmp(&x)) {
            Ok(idx) => idx,
            Err(idx) => {
                if idx == 0 {
                    0
                } else if idx >= n {
                    n - 1
                } else if (x - self.xd[idx - 1]).abs() <= (self.xd[idx] - x).abs() {
                    idx - 1
                } else {
                    idx
                }
            }
        };

        let mut l = z;
        let mut r = z;
        while r - l + 1 < self.k {
            let can_go_left = l > 0;
            let can_go_right = r < n - 1;
            if can_go_left && can_go_right {
                if (x - self.xd[l - 1]).abs() <= (self.xd[r + 1] - x).abs() {
                    l -= 1;
                } else {
                    r += 1;
                }
            } else if can_go_left {
                l -= 1;
            } else if can_go_right {
                r += 1;
            } else {
                break;
            }
        }
        (l, r)
    }
}

/// Fit loess to (x, y) and return fitted values at each x
pub fn loess_fit(x: &[f64], y: &[f64], weights: Option<&[f64]>, params: &LoessParams) -> Result<Vec<f64>> {
    let smoother = Loess::new(x, y, weights, params)?;
    Ok(x
        .par_iter()
        .map(|&xi| if xi.is_finite() { smoother.predict(xi) } else { f64::NAN })
        .collect())
}

/// Intercept of the 3x3 normal equations by Cramer's rule
fn solve3_intercept(m: &[[f64; 3]; 3], b: &[f64; 3]) -> Option<f64> {
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    let scale = m[0][0].max(1.0) * m[1][1].max(1.0) * m[2][2].max(1.0);
    if !det.is_finite() || det.abs() < 1e-15 * scale {
        return None;
    }
    let det0 = b[0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (b[1] * m[2][2] - m[1][2] * b[2])
        + m[0][2] * (b[1] * m[2][1] - m[1][1] * b[2]);
    Some(det0 / det)
}

fn solve2_intercept(m: &[[f64; 3]; 3], b: &[f64; 3]) -> Option<f64> {
    let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
    if !det.is_finite() || det.abs() < 1e-15 * m[0][0].max(1.0) * m[1][1].max(1.0) {
        return None;
    }
    Some((b[0] * m[1][1] - m[0][1] * b[1]) / det)
}
