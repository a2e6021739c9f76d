//! Empirical Bayes moderation of gene-wise variances
//!
//! Follows limma's `squeezeVar`/`eBayes`: the log residual variances are
//! modelled as scaled F-distributed around a prior that, with `trend`, is a
//! smooth function of average expression. Posterior variances shrink each
//! gene towards that prior and feed a moderated t-statistic.

use serde::{Deserialize, Serialize};

use super::fit::ContrastFit;
use crate::de::{call_for, DeRecord, Thresholds};
use crate::error::{AnalysisError, Result};
use crate::stats::{digamma, mean, median, trigamma, trigamma_inverse};
use crate::testing::{benjamini_hochberg, two_sided_normal, two_sided_t};
use crate::trend::{Loess, LoessParams};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EbayesParams {
    /// Let the prior variance depend on average expression
    pub trend: bool,
    /// Loess span of the variance trend
    pub span: f64,
}

impl Default for EbayesParams {
    fn default() -> Self {
        Self {
            trend: true,
            span: 0.5,
        }
    }
}

/// Prior degrees of freedom and per-gene prior variance
#[derive(Debug, Clone)]
pub struct FDistFit {
    pub df_prior: f64,
    pub s2_prior: Vec<f64>,
}

/// Moderated statistics for one contrast
#[derive(Debug, Clone)]
pub struct ModeratedFit {
    pub t: Vec<f64>,
    pub pvalue: Vec<f64>,
    pub s2_post: Vec<f64>,
    pub df_total: Vec<f64>,
    pub prior: FDistFit,
}

/// Estimate the scaled F prior of the variances `s2` on `df` degrees of freedom
pub fn fit_f_dist(s2: &[f64], df: &[f64], covariate: Option<&[f64]>, span: f64) -> Result<FDistFit> {
    let n = s2.len();
    if df.len() != n || covariate.map_or(false, |c| c.len() != n) {
        return Err(AnalysisError::DimensionMismatch {
            expected: format!("{} variances", n),
            got: format!("{} df", df.len()),
        });
    }

    let ok: Vec<usize> = (0..n)
        .filter(|&i| s2[i].is_finite() && s2[i] > -1e-15 && df[i].is_finite() && df[i] > 1e-15)
        .filter(|&i| covariate.map_or(true, |c| c[i].is_finite()))
        .collect();
    if ok.is_empty() {
        return Err(AnalysisError::TrendFitting {
            reason: "no gene has a usable residual variance".to_string(),
        });
    }

    let positive: Vec<f64> = ok.iter().map(|&i| s2[i].max(0.0)).collect();
    let mut m = median(&positive);
    if m == 0.0 {
        log::warn!("More than half of residual variances are exactly zero");
        m = 1.0;
    }
    let floor = 1e-5 * m;

    let e: Vec<f64> = ok
        .iter()
        .map(|&i| {
            let half = df[i] / 2.0;
            s2[i].max(floor).ln() - digamma(half) + half.ln()
        })
        .collect();

    const TREND_PARAMS: usize = 3;
    let use_trend = covariate.is_some() && ok.len() > 10 * TREND_PARAMS;
    if covariate.is_some() && !use_trend {
        log::debug!("Too few genes ({}) for a variance trend, using a constant prior", ok.len());
    }

    let (emean_ok, emean_all, denom) = match covariate {
        Some(cov) if use_trend => {
            let x: Vec<f64> = ok.iter().map(|&i| cov[i]).collect();
            let smoother = Loess::new(&x, &e, None, &LoessParams { span, degree: 2 })?;
            let at_ok = smoother.predict_many(&x);
            let at_all = smoother.predict_many(cov);
            (at_ok, at_all, (ok.len() - TREND_PARAMS) as f64)
        }
        _ => {
            let mu = mean(&e);
            (vec![mu; ok.len()], vec![mu; n], (ok.len().max(2) - 1) as f64)
        }
    };

    let ss: f64 = e.iter().zip(&emean_ok).map(|(a, b)| (a - b).powi(2)).sum();
    let trigamma_mean = mean(&ok.iter().map(|&i| trigamma(df[i] / 2.0)).collect::<Vec<_>>());
    let evar = ss / denom - trigamma_mean;

    let (df_prior, s2_prior) = if evar > 0.0 {
        let d0 = 2.0 * trigamma_inverse(evar);
        let shift = digamma(d0 / 2.0) - (d0 / 2.0).ln();
        (d0, emean_all.iter().map(|em| (em + shift).exp()).collect())
    } else if use_trend {
        (f64::INFINITY, emean_all.iter().map(|em| em.exp()).collect())
    } else {
        // Pooled variance is the scale MLE when the prior is infinitely strong
        let pooled = mean(&ok.iter().map(|&i| s2[i].max(floor)).collect::<Vec<_>>());
        (f64::INFINITY, vec![pooled; n])
    };

    log::debug!(
        "Variance prior: df {:.3}, median s2 prior {:.4}",
        df_prior,
        median(&s2_prior)
    );
    Ok(FDistFit { df_prior, s2_prior })
}

/// Posterior variances `(d0 s0^2 + d s2) / (d0 + d)`
pub fn squeeze_var(s2: &[f64], df: &[f64], prior: &FDistFit) -> Vec<f64> {
    s2.iter()
        .zip(df)
        .zip(&prior.s2_prior)
        .map(|((&s, &d), &s0)| {
            if prior.df_prior.is_infinite() || !s.is_finite() || d <= 0.0 {
                s0
            } else {
                (prior.df_prior * s0 + d * s) / (prior.df_prior + d)
            }
        })
        .collect()
}

/// Moderated t-statistics and p-values for a contrast
pub fn ebayes(fit: &ContrastFit, params: &EbayesParams) -> Result<ModeratedFit> {
    let covariate = params.trend.then_some(fit.amean.as_slice());
    let prior = fit_f_dist(&fit.sigma2, &fit.df_residual, covariate, params.span)?;
    let s2_post = squeeze_var(&fit.sigma2, &fit.df_residual, &prior);

    let df_pooled: f64 = fit
        .df_residual
        .iter()
        .zip(&fit.sigma2)
        .filter(|(_, s)| s.is_finite())
        .map(|(d, _)| d)
        .sum();

    let mut t = Vec::with_capacity(s2_post.len());
    let mut pvalue = Vec::with_capacity(s2_post.len());
    let mut df_total = Vec::with_capacity(s2_post.len());
    for i in 0..s2_post.len() {
        let se = fit.stdev_unscaled[i] * s2_post[i].sqrt();
        let ti = fit.coefficient[i] / se;
        let dt = (fit.df_residual[i] + prior.df_prior).min(df_pooled);
        let p = if dt.is_infinite() {
            two_sided_normal(ti)
        } else {
            two_sided_t(ti, dt)
        };
        t.push(ti);
        pvalue.push(p);
        df_total.push(dt);
    }

    Ok(ModeratedFit {
        t,
        pvalue,
        s2_post,
        df_total,
        prior,
    })
}

/// Assemble the DE table of one contrast with BH-adjusted p-values
pub fn top_table(
    genes: &[String],
    fit: &ContrastFit,
    moderated: &ModeratedFit,
    thresholds: &Thresholds,
    contrast: &str,
    cohort: &str,
) -> Result<Vec<DeRecord>> {
    if genes.len() != fit.coefficient.len() || genes.len() != moderated.pvalue.len() {
        return Err(AnalysisError::DimensionMismatch {
            expected: format!("{} genes", fit.coefficient.len()),
            got: format!("{} gene names", genes.len()),
        });
    }
    let padj = benjamini_hochberg(&moderated.pvalue);
    Ok(genes
        .iter()
        .enumerate()
        .map(|(i, gene)| DeRecord {
            gene: gene.clone(),
            log2_fold_change: fit.coefficient[i],
            average_expression: fit.amean[i],
            statistic: moderated.t[i],
            pvalue: moderated.pvalue[i],
            padj: padj[i],
            call: call_for(padj[i], fit.coefficient[i], thresholds),
            contrast: contrast.to_string(),
            cohort: cohort.to_string(),
        })
        .collect())
}
