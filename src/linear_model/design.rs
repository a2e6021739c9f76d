//! Cell-means design matrices and contrasts

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// A named difference between two levels of the design factor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContrastSpec {
    pub name: String,
    pub numerator: String,
    pub denominator: String,
}

impl ContrastSpec {
    pub fn new(name: &str, numerator: &str, denominator: &str) -> Self {
        Self {
            name: name.to_string(),
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
        }
    }

    /// The three smoking comparisons
    pub fn smoking_defaults() -> Vec<Self> {
        vec![
            Self::new("cig_vs_ctrl", "cigarette", "control"),
            Self::new("cig_vs_ecig", "cigarette", "ecigarette"),
            Self::new("ecig_vs_ctrl", "ecigarette", "control"),
        ]
    }
}

/// No-intercept indicator design, one column per level
#[derive(Debug, Clone)]
pub struct Design {
    matrix: Array2<f64>,
    levels: Vec<String>,
}

impl Design {
    /// Build `~ 0 + factor` from per-sample labels; levels are sorted
    pub fn cell_means(labels: &[String]) -> Result<Self> {
        if labels.is_empty() {
            return Err(AnalysisError::InvalidDesign {
                reason: "No samples to build a design from".to_string(),
            });
        }
        if let Some(i) = labels.iter().position(|l| l.is_empty()) {
            return Err(AnalysisError::InvalidDesign {
                reason: format!("Sample {} has an empty factor level", i),
            });
        }

        let mut levels: Vec<String> = labels.to_vec();
        levels.sort();
        levels.dedup();

        let mut matrix = Array2::zeros((labels.len(), levels.len()));
        for (i, label) in labels.iter().enumerate() {
            // Levels are built from labels, so every label is found
            if let Ok(j) = levels.binary_search(label) {
                matrix[[i, j]] = 1.0;
            }
        }
        Ok(Self { matrix, levels })
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_coefs(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn has_level(&self, level: &str) -> bool {
        self.levels.iter().any(|l| l == level)
    }

    /// Residual degrees of freedom
    pub fn df_residual(&self) -> usize {
        self.n_samples().saturating_sub(self.n_coefs())
    }

    /// Contrast weights `numerator - denominator`
    pub fn contrast_vector(&self, contrast: &ContrastSpec) -> Result<Array1<f64>> {
        let find = |level: &str| {
            self.levels
                .iter()
                .position(|l| l == level)
                .ok_or_else(|| AnalysisError::InvalidContrast {
                    reason: format!(
                        "{}: level '{}' not among design levels {:?}",
                        contrast.name, level, self.levels
                    ),
                })
        };
        let num = find(&contrast.numerator)?;
        let den = find(&contrast.denominator)?;
        if num == den {
            return Err(AnalysisError::InvalidContrast {
                reason: format!("{}: numerator and denominator are the same level", contrast.name),
            });
        }
        let mut c = Array1::zeros(self.n_coefs());
        c[num] = 1.0;
        c[den] = -1.0;
        Ok(c)
    }
}
