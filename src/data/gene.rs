//! Gene annotation and per-cohort gene metadata

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::io::Table;

/// Gene metadata kept with a cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneRecord {
    pub gene_id: String,
    pub gene_name: String,
    pub chromosome: String,
    /// Mean CPM across the cohort's samples, used to resolve duplicate symbols
    pub mean_expression: f64,
}

/// Mapping from gene identifier to symbol and chromosome
#[derive(Debug, Clone, Default)]
pub struct GeneAnnotation {
    entries: HashMap<String, (String, String)>,
}

impl GeneAnnotation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, gene_id: &str, gene_name: &str, chromosome: &str) {
        self.entries
            .insert(gene_id.to_string(), (gene_name.to_string(), chromosome.to_string()));
    }

    /// Build from a table with `gene_id`, `gene_name` and `chromosome` columns
    pub fn from_table(table: &Table) -> Result<Self> {
        for col in ["gene_id", "gene_name", "chromosome"] {
            if !table.has_column(col) {
                return Err(AnalysisError::InvalidInput {
                    reason: format!("gene annotation lacks column '{}'", col),
                });
            }
        }
        let mut annotation = Self::new();
        for row in 0..table.n_rows() {
            let gene_id = table.require(row, "gene_id")?;
            if annotation.entries.contains_key(gene_id) {
                continue;
            }
            annotation.insert(
                gene_id,
                table.require(row, "gene_name")?,
                table.require(row, "chromosome")?,
            );
        }
        Ok(annotation)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_table(&Table::read(path)?)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Symbol for a gene; unannotated genes keep their identifier
    pub fn symbol<'a>(&'a self, gene_id: &'a str) -> &'a str {
        self.entries
            .get(gene_id)
            .map(|(name, _)| name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(gene_id)
    }

    /// Chromosome for a gene, `"NA"` when unannotated
    pub fn chromosome(&self, gene_id: &str) -> &str {
        self.entries
            .get(gene_id)
            .map(|(_, chr)| chr.as_str())
            .unwrap_or("NA")
    }

    pub fn is_mitochondrial(&self, gene_id: &str) -> bool {
        matches!(
            self.chromosome(gene_id).to_ascii_uppercase().as_str(),
            "MT" | "CHRM" | "M" | "CHRMT"
        )
    }

    pub fn is_ribosomal(&self, gene_id: &str) -> bool {
        let symbol = self.symbol(gene_id).to_ascii_uppercase();
        symbol.starts_with("RPL") || symbol.starts_with("RPS")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_falls_back_to_id() {
        let mut ann = GeneAnnotation::new();
        ann.insert("ENSG1", "CYP1A1", "15");
        ann.insert("ENSG2", "MT-CO1", "MT");
        ann.insert("ENSG3", "Rpl13", "8");

        assert_eq!(ann.symbol("ENSG1"), "CYP1A1");
        assert_eq!(ann.symbol("ENSG9"), "ENSG9");
        assert_eq!(ann.chromosome("ENSG9"), "NA");
        assert!(ann.is_mitochondrial("ENSG2"));
        assert!(!ann.is_mitochondrial("ENSG1"));
        assert!(ann.is_ribosomal("ENSG3"));
    }
}
