//! Moderated linear models for bulk differential expression
//!
//! One `~ 0 + smoking_type` model per cohort, several contrasts, empirical
//! Bayes variance moderation with an expression trend.

mod design;
mod ebayes;
mod fit;

pub use design::{ContrastSpec, Design};
pub use ebayes::{ebayes, fit_f_dist, squeeze_var, top_table, EbayesParams, FDistFit, ModeratedFit};
pub use fit::{contrasts_fit, lm_fit, ContrastFit, LinearFit};

use ndarray::ArrayView2;

use crate::de::{DeRecord, Thresholds};
use crate::error::{AnalysisError, Result};

/// DE tables of the contrasts that could be evaluated, plus the skipped ones
#[derive(Debug, Clone, Default)]
pub struct DeOutcome {
    pub tables: Vec<(String, Vec<DeRecord>)>,
    pub skipped: Vec<(String, String)>,
}

/// Fit the cell-means model once and evaluate every contrast
///
/// A contrast naming a level absent from `labels` is skipped with a warning,
/// as is every contrast when the model has no residual degrees of freedom.
pub fn differential_expression(
    expr: ArrayView2<f64>,
    genes: &[String],
    labels: &[String],
    contrasts: &[ContrastSpec],
    params: &EbayesParams,
    thresholds: &Thresholds,
    cohort: &str,
) -> Result<DeOutcome> {
    let design = Design::cell_means(labels)?;
    let mut outcome = DeOutcome::default();

    if design.df_residual() < 1 {
        for c in contrasts {
            log::warn!("{}: skipping {} (no residual degrees of freedom)", cohort, c.name);
            outcome
                .skipped
                .push((c.name.clone(), "no residual degrees of freedom".to_string()));
        }
        return Ok(outcome);
    }

    let fit = lm_fit(expr, &design)?;
    for c in contrasts {
        let weights = match design.contrast_vector(c) {
            Ok(w) => w,
            Err(AnalysisError::InvalidContrast { reason }) => {
                log::warn!("{}: skipping contrast: {}", cohort, reason);
                outcome.skipped.push((c.name.clone(), reason));
                continue;
            }
            Err(e) => return Err(e),
        };
        let cf = contrasts_fit(&fit, &weights)?;
        let moderated = ebayes(&cf, params)?;
        log::debug!(
            "{} {}: prior df {:.2}",
            cohort,
            c.name,
            moderated.prior.df_prior
        );
        let table = top_table(genes, &cf, &moderated, thresholds, &c.name, cohort)?;
        outcome.tables.push((c.name.clone(), table));
    }
    Ok(outcome)
}
