//! Hypothesis tests and multiple testing correction

mod fdr;
mod pvalue;
mod wilcoxon;

pub use fdr::{benjamini_hochberg, bonferroni};
pub use pvalue::{two_sided_normal, two_sided_t};
pub use wilcoxon::{rank_sum_test, RankSumResult};
