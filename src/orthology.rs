//! Cross-species translation of gene symbols
//!
//! Mouse-derived signatures are mapped onto human symbols before enrichment.
//! Genes without an ortholog are dropped, never replaced.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::de::GeneSet;
use crate::error::{AnalysisError, Result};
use crate::io::Table;

/// Anything that can list the orthologs of a gene symbol
pub trait OrthologSource {
    /// Orthologs in preference order; empty when there is none
    fn orthologs(&self, gene: &str) -> &[String];
}

/// Ortholog pairs loaded from a `source` / `target` table
#[derive(Debug, Clone, Default)]
pub struct OrthologTable {
    map: HashMap<String, Vec<String>>,
}

impl OrthologTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: &str, target: &str) {
        if source.is_empty() || target.is_empty() {
            return;
        }
        let targets = self.map.entry(source.to_string()).or_default();
        if !targets.iter().any(|t| t == target) {
            targets.push(target.to_string());
        }
    }

    pub fn from_table(table: &Table) -> Result<Self> {
        for col in ["source", "target"] {
            if !table.has_column(col) {
                return Err(AnalysisError::InvalidInput {
                    reason: format!("ortholog table lacks column '{}'", col),
                });
            }
        }
        let mut orthologs = Self::new();
        for row in 0..table.n_rows() {
            orthologs.insert(table.require(row, "source")?, table.require(row, "target")?);
        }
        Ok(orthologs)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_table(&Table::read(path)?)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl OrthologSource for OrthologTable {
    fn orthologs(&self, gene: &str) -> &[String] {
        self.map.get(gene).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Translated genes plus the inputs that had no ortholog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub genes: Vec<String>,
    pub unmapped: Vec<String>,
}

/// First ortholog of each gene, de-duplicated in input order
pub fn translate<S: OrthologSource + ?Sized>(source: &S, genes: &[String]) -> Translation {
    let mut seen = HashSet::new();
    let mut translated = Vec::new();
    let mut unmapped = Vec::new();
    for gene in genes {
        match source.orthologs(gene).first() {
            Some(target) => {
                if seen.insert(target.clone()) {
                    translated.push(target.clone());
                }
            }
            None => unmapped.push(gene.clone()),
        }
    }
    Translation {
        genes: translated,
        unmapped,
    }
}

/// Translate a whole gene set, keeping its name
pub fn translate_set<S: OrthologSource + ?Sized>(source: &S, set: &GeneSet) -> GeneSet {
    let t = translate(source, set.genes());
    if !t.unmapped.is_empty() {
        log::warn!(
            "{}: {} of {} genes have no ortholog and were dropped",
            set.name(),
            t.unmapped.len(),
            set.len()
        );
    }
    GeneSet::new(set.name(), t.genes)
}
