//! Clustered single-cell expression with per-cell labels

use std::collections::HashMap;
use std::path::Path;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{AnalysisError, Result};
use crate::io::{read_matrix, Table};

/// Log-normalised expression (genes x cells) with cluster and group labels
#[derive(Debug, Clone)]
pub struct SingleCellData {
    expr: Array2<f64>,
    genes: Vec<String>,
    cells: Vec<String>,
    clusters: Vec<String>,
    groups: Vec<String>,
}

impl SingleCellData {
    pub fn new(
        expr: Array2<f64>,
        genes: Vec<String>,
        cells: Vec<String>,
        clusters: Vec<String>,
        groups: Vec<String>,
    ) -> Result<Self> {
        let (n_genes, n_cells) = expr.dim();
        if genes.len() != n_genes {
            return Err(AnalysisError::DimensionMismatch {
                expected: format!("{} gene names", n_genes),
                got: format!("{}", genes.len()),
            });
        }
        for (what, v) in [("cell ids", &cells), ("cluster labels", &clusters), ("group labels", &groups)] {
            if v.len() != n_cells {
                return Err(AnalysisError::DimensionMismatch {
                    expected: format!("{} {}", n_cells, what),
                    got: format!("{}", v.len()),
                });
            }
        }
        if expr.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(AnalysisError::InvalidInput {
                reason: "log-normalised expression must be finite and non-negative".to_string(),
            });
        }
        Ok(Self {
            expr,
            genes,
            cells,
            clusters,
            groups,
        })
    }

    /// Read an expression matrix and a cell table with `cell`, `cluster`, `group`
    ///
    /// Every matrix column must have a row in the cell table.
    pub fn read<P: AsRef<Path>, Q: AsRef<Path>>(expression: P, cell_table: Q) -> Result<Self> {
        let matrix = read_matrix(expression)?;
        let table = Table::read(cell_table)?;

        let mut by_cell: HashMap<&str, usize> = HashMap::new();
        for row in 0..table.n_rows() {
            by_cell.entry(table.require(row, "cell")?).or_insert(row);
        }

        let mut clusters = Vec::with_capacity(matrix.col_ids.len());
        let mut groups = Vec::with_capacity(matrix.col_ids.len());
        for cell in &matrix.col_ids {
            let row = *by_cell.get(cell.as_str()).ok_or_else(|| AnalysisError::AlignmentMismatch {
                what: "single-cell expression columns vs cell table".to_string(),
                detail: format!("cell '{}' has no cluster/group annotation", cell),
            })?;
            clusters.push(table.require(row, "cluster")?.to_string());
            groups.push(table.require(row, "group")?.to_string());
        }

        Self::new(matrix.values, matrix.row_ids, matrix.col_ids, clusters, groups)
    }

    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn expr(&self) -> ArrayView2<'_, f64> {
        self.expr.view()
    }

    pub fn gene_row(&self, gene: usize) -> ArrayView1<'_, f64> {
        self.expr.row(gene)
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn clusters(&self) -> &[String] {
        &self.clusters
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn gene_index(&self, gene: &str) -> Option<usize> {
        self.genes.iter().position(|g| g == gene)
    }

    /// Distinct cluster labels, numeric labels in numeric order
    pub fn cluster_levels(&self) -> Vec<String> {
        let mut levels: Vec<String> = self.clusters.clone();
        levels.sort_by(|a, b| match (a.parse::<i64>(), b.parse::<i64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.cmp(b),
        });
        levels.dedup();
        levels
    }

    /// Mean expression of each gene over all cells
    pub fn gene_means(&self) -> Vec<f64> {
        self.expr
            .axis_iter(Axis(0))
            .map(|r| r.mean().unwrap_or(0.0))
            .collect()
    }
}
