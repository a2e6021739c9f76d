//! Count matrix representation for RNA-seq read counts

use std::collections::{HashMap, HashSet};

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{AnalysisError, Result};

/// A genes x samples matrix of read counts
///
/// Gene-level and splice-junction-level counts share this type; rows are keyed
/// by gene identifier and columns by library identifier.
#[derive(Debug, Clone)]
pub struct CountMatrix {
    counts: Array2<f64>,
    gene_ids: Vec<String>,
    sample_ids: Vec<String>,
}

impl CountMatrix {
    /// Create a new count matrix from raw data
    pub fn new(counts: Array2<f64>, gene_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (n_genes, n_samples) = counts.dim();

        if gene_ids.len() != n_genes {
            return Err(AnalysisError::DimensionMismatch {
                expected: format!("{} gene IDs", n_genes),
                got: format!("{} gene IDs", gene_ids.len()),
            });
        }

        if sample_ids.len() != n_samples {
            return Err(AnalysisError::DimensionMismatch {
                expected: format!("{} sample IDs", n_samples),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }

        if counts.iter().any(|&x| x < 0.0 || !x.is_finite()) {
            return Err(AnalysisError::InvalidCountMatrix {
                reason: "Counts must be non-negative finite values".to_string(),
            });
        }

        if let Some(dup) = first_duplicate(&gene_ids) {
            return Err(AnalysisError::InvalidCountMatrix {
                reason: format!("Duplicate gene identifier '{}'", dup),
            });
        }

        if let Some(dup) = first_duplicate(&sample_ids) {
            return Err(AnalysisError::InvalidCountMatrix {
                reason: format!("Duplicate sample identifier '{}'", dup),
            });
        }

        if counts.iter().any(|&x| x != x.round()) {
            log::warn!("Some count values are not integers; raw read counts are expected");
        }

        Ok(Self {
            counts,
            gene_ids,
            sample_ids,
        })
    }

    pub fn n_genes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.ncols()
    }

    /// Get the raw counts as a view
    pub fn counts(&self) -> ArrayView2<'_, f64> {
        self.counts.view()
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get counts for a specific gene
    pub fn gene_counts(&self, gene_idx: usize) -> ArrayView1<'_, f64> {
        self.counts.row(gene_idx)
    }

    /// Get counts for a specific sample
    pub fn sample_counts(&self, sample_idx: usize) -> ArrayView1<'_, f64> {
        self.counts.column(sample_idx)
    }

    pub fn gene_index(&self, gene_id: &str) -> Option<usize> {
        self.gene_ids.iter().position(|id| id == gene_id)
    }

    pub fn sample_index(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|id| id == sample_id)
    }

    /// Sum of counts per sample (library size)
    pub fn library_sizes(&self) -> Vec<f64> {
        self.counts.axis_iter(Axis(1)).map(|col| col.sum()).collect()
    }

    /// Mean count per gene across samples
    pub fn gene_means(&self) -> Vec<f64> {
        let n = self.n_samples().max(1) as f64;
        self.counts.axis_iter(Axis(0)).map(|row| row.sum() / n).collect()
    }

    /// Indices of genes passing the adaptive expression filter
    ///
    /// A gene is kept when at least `max(min_samples, ceil(min_prop * n_samples))`
    /// samples carry `min_count` reads or more.
    pub fn expressed_genes(&self, min_count: f64, min_samples: usize, min_prop: f64) -> Vec<usize> {
        let required = required_samples(self.n_samples(), min_samples, min_prop);
        (0..self.n_genes())
            .filter(|&i| {
                let n_above = self.counts.row(i).iter().filter(|&&x| x >= min_count).count();
                n_above >= required
            })
            .collect()
    }

    /// Subset to specific samples, in the given order
    pub fn subset_samples(&self, sample_indices: &[usize]) -> Result<Self> {
        let new_counts = self.counts.select(Axis(1), sample_indices);
        let new_sample_ids: Vec<String> = sample_indices
            .iter()
            .map(|&i| self.sample_ids[i].clone())
            .collect();

        Self::new(new_counts, self.gene_ids.clone(), new_sample_ids)
    }

    /// Select samples by identifier, in the given order
    pub fn select_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let lookup: HashMap<&str, usize> = self
            .sample_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let indices = sample_ids
            .iter()
            .map(|id| {
                lookup.get(id.as_str()).copied().ok_or_else(|| AnalysisError::AlignmentMismatch {
                    what: "sample selection".to_string(),
                    detail: format!("sample '{}' is not a column of the count matrix", id),
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        self.subset_samples(&indices)
    }

    /// Subset to specific genes, in the given order
    pub fn subset_genes(&self, gene_indices: &[usize]) -> Result<Self> {
        let new_counts = self.counts.select(Axis(0), gene_indices);
        let new_gene_ids: Vec<String> = gene_indices
            .iter()
            .map(|&i| self.gene_ids[i].clone())
            .collect();

        Self::new(new_counts, new_gene_ids, self.sample_ids.clone())
    }

    /// Replace the row keys (e.g. gene IDs by resolved gene symbols)
    pub fn with_gene_ids(self, gene_ids: Vec<String>) -> Result<Self> {
        Self::new(self.counts, gene_ids, self.sample_ids)
    }
}

/// Number of samples a gene must be expressed in
pub fn required_samples(n_samples: usize, min_samples: usize, min_prop: f64) -> usize {
    let by_prop = (min_prop.max(0.0) * n_samples as f64).ceil() as usize;
    min_samples.max(by_prop)
}

/// Verify that two matrices share identical gene and sample ordering
///
/// The gene-level and junction-level matrices must line up exactly before
/// any downstream use.
pub fn check_alignment(gene_level: &CountMatrix, junction_level: &CountMatrix) -> Result<()> {
    if let Some(detail) = first_difference(gene_level.sample_ids(), junction_level.sample_ids()) {
        return Err(AnalysisError::AlignmentMismatch {
            what: "sample columns of gene and junction matrices".to_string(),
            detail,
        });
    }
    if let Some(detail) = first_difference(gene_level.gene_ids(), junction_level.gene_ids()) {
        return Err(AnalysisError::AlignmentMismatch {
            what: "gene rows of gene and junction matrices".to_string(),
            detail,
        });
    }
    Ok(())
}

/// Describe the first position where two key vectors differ
pub(crate) fn first_difference(a: &[String], b: &[String]) -> Option<String> {
    if a.len() != b.len() {
        return Some(format!("lengths differ ({} vs {})", a.len(), b.len()));
    }
    a.iter()
        .zip(b.iter())
        .position(|(x, y)| x != y)
        .map(|pos| format!("position {}: '{}' vs '{}'", pos, a[pos], b[pos]))
}

fn first_duplicate(ids: &[String]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().find(|id| !seen.insert(id.as_str())).map(|s| s.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_count_matrix_creation() {
        let counts = array![[10.0, 20.0, 30.0], [5.0, 15.0, 25.0]];
        let matrix = CountMatrix::new(counts, ids("g", 2), ids("s", 3)).unwrap();
        assert_eq!(matrix.n_genes(), 2);
        assert_eq!(matrix.n_samples(), 3);
        assert_eq!(matrix.library_sizes(), vec![15.0, 35.0, 55.0]);
    }

    #[test]
    fn test_negative_counts_rejected() {
        let counts = array![[10.0, -5.0], [5.0, 15.0]];
        assert!(CountMatrix::new(counts, ids("g", 2), ids("s", 2)).is_err());
    }

    #[test]
    fn test_duplicate_gene_ids_rejected() {
        let counts = array![[1.0, 2.0], [3.0, 4.0]];
        let genes = vec!["g1".to_string(), "g1".to_string()];
        assert!(CountMatrix::new(counts, genes, ids("s", 2)).is_err());
    }

    #[test]
    fn test_required_samples_has_floor() {
        assert_eq!(required_samples(4, 3, 0.1), 3);
        assert_eq!(required_samples(100, 3, 0.1), 10);
        assert_eq!(required_samples(101, 3, 0.1), 11);
    }

    #[test]
    fn test_expressed_genes() {
        let counts = array![
            [10.0, 10.0, 10.0, 10.0],
            [10.0, 0.0, 0.0, 10.0],
            [0.0, 0.0, 0.0, 10.0],
        ];
        let matrix = CountMatrix::new(counts, ids("g", 3), ids("s", 4)).unwrap();
        assert_eq!(matrix.expressed_genes(10.0, 2, 0.0), vec![0, 1]);
        assert_eq!(matrix.expressed_genes(10.0, 1, 0.0), vec![0, 1, 2]);
        assert_eq!(matrix.expressed_genes(10.0, 1, 0.75), vec![0]);
    }

    #[test]
    fn test_select_samples_reorders() {
        let counts = array![[1.0, 2.0, 3.0]];
        let matrix = CountMatrix::new(counts, ids("g", 1), ids("s", 3)).unwrap();
        let picked = matrix
            .select_samples(&["s3".to_string(), "s1".to_string()])
            .unwrap();
        assert_eq!(picked.sample_ids(), &["s3".to_string(), "s1".to_string()]);
        assert_eq!(picked.counts()[[0, 0]], 3.0);

        let missing = matrix.select_samples(&["s9".to_string()]);
        assert!(matches!(missing, Err(AnalysisError::AlignmentMismatch { .. })));
    }

    #[test]
    fn test_check_alignment() {
        let a = CountMatrix::new(array![[1.0, 2.0]], ids("g", 1), ids("s", 2)).unwrap();
        let b = CountMatrix::new(array![[5.0, 6.0]], ids("g", 1), ids("s", 2)).unwrap();
        assert!(check_alignment(&a, &b).is_ok());

        let swapped = CountMatrix::new(
            array![[5.0, 6.0]],
            ids("g", 1),
            vec!["s2".to_string(), "s1".to_string()],
        )
        .unwrap();
        let err = check_alignment(&a, &swapped).unwrap_err();
        assert!(err.to_string().contains("position 0"));
    }
}
