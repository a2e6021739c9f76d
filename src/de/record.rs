//! Differential expression and enrichment result records

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::volcano::{call_for, Thresholds};
use crate::error::AnalysisError;

/// Categorical call for a gene under a pair of thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeCall {
    #[serde(rename = "up")]
    Up,
    #[serde(rename = "dn")]
    Down,
    #[serde(rename = "no")]
    No,
}

impl DeCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeCall::Up => "up",
            DeCall::Down => "dn",
            DeCall::No => "no",
        }
    }
}

impl fmt::Display for DeCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeCall {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "up" => Ok(DeCall::Up),
            "dn" | "down" => Ok(DeCall::Down),
            "no" => Ok(DeCall::No),
            other => Err(AnalysisError::InvalidInput {
                reason: format!("Unknown DE call '{}'", other),
            }),
        }
    }
}

/// One gene's result under one contrast in one cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeRecord {
    pub gene: String,
    pub log2_fold_change: f64,
    pub average_expression: f64,
    /// Moderated t (bulk) or Wilcoxon z (single-cell)
    pub statistic: f64,
    pub pvalue: f64,
    pub padj: f64,
    pub call: DeCall,
    pub contrast: String,
    pub cohort: String,
}

/// One gene set's enrichment under one contrast in one cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub pathway: String,
    pub es: f64,
    pub nes: f64,
    pub pvalue: f64,
    pub padj: f64,
    /// Members present in the ranked list
    pub size: usize,
    pub leading_edge: Vec<String>,
    pub contrast: String,
    pub cohort: String,
}

/// Named collection of gene symbols, fixed once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneSet {
    name: String,
    genes: Vec<String>,
}

impl GeneSet {
    /// Build a set; duplicate members are dropped, first occurrence wins
    pub fn new(name: impl Into<String>, genes: Vec<String>) -> Self {
        let mut seen = std::collections::HashSet::with_capacity(genes.len());
        let genes = genes
            .into_iter()
            .filter(|g| !g.is_empty() && seen.insert(g.clone()))
            .collect();
        Self {
            name: name.into(),
            genes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

/// Which side of a DE table a derived gene set collects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl GeneSet {
    /// Genes called in `direction` under `thresholds`, in table order
    pub fn from_de_records(
        name: impl Into<String>,
        records: &[DeRecord],
        thresholds: &Thresholds,
        direction: Direction,
    ) -> Self {
        let wanted = match direction {
            Direction::Up => DeCall::Up,
            Direction::Down => DeCall::Down,
        };
        let genes = records
            .iter()
            .filter(|r| call_for(r.padj, r.log2_fold_change, thresholds) == wanted)
            .map(|r| r.gene.clone())
            .collect();
        Self::new(name, genes)
    }
}

/// Counts of calls in a DE table
#[derive(Debug, Clone, PartialEq)]
pub struct DeSummary {
    pub contrast: String,
    pub cohort: String,
    pub total_genes: usize,
    pub genes_tested: usize,
    pub upregulated: usize,
    pub downregulated: usize,
}

impl DeSummary {
    /// Summarise the records of one (contrast, cohort) table
    pub fn from_records(records: &[DeRecord]) -> Self {
        let first = records.first();
        Self {
            contrast: first.map(|r| r.contrast.clone()).unwrap_or_default(),
            cohort: first.map(|r| r.cohort.clone()).unwrap_or_default(),
            total_genes: records.len(),
            genes_tested: records.iter().filter(|r| r.pvalue.is_finite()).count(),
            upregulated: records.iter().filter(|r| r.call == DeCall::Up).count(),
            downregulated: records.iter().filter(|r| r.call == DeCall::Down).count(),
        }
    }
}

impl fmt::Display for DeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} / {}", self.cohort, self.contrast)?;
        writeln!(f, "  Total genes: {}", self.total_genes)?;
        writeln!(f, "  Genes tested: {}", self.genes_tested)?;
        writeln!(f, "  Up-regulated: {}", self.upregulated)?;
        write!(f, "  Down-regulated: {}", self.downregulated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_display_has_no_trailing_newline() {
        let summary = DeSummary {
            cohort: "all".to_string(),
            contrast: "TCDD_vs_vehicle".to_string(),
            total_genes: 20,
            genes_tested: 12,
            upregulated: 3,
            downregulated: 1,
        };
        let text = format!("{}", summary);
        assert_eq!(text.lines().count(), 5);
        assert!(!text.ends_with('\n'));
        let two = format!("{}\n{}\n", summary, summary);
        assert_eq!(two.lines().nth(5), Some("all / TCDD_vs_vehicle"));
    }

    #[test]
    fn test_call_labels() {
        assert_eq!(DeCall::Down.to_string(), "dn");
        assert_eq!("up".parse::<DeCall>().unwrap(), DeCall::Up);
        assert!("maybe".parse::<DeCall>().is_err());
    }

    #[test]
    fn test_gene_set_dedup() {
        let set = GeneSet::new(
            "AHR",
            vec!["CYP1A1".into(), "CYP1B1".into(), "CYP1A1".into(), "".into()],
        );
        assert_eq!(set.genes(), &["CYP1A1".to_string(), "CYP1B1".to_string()]);
    }

    #[test]
    fn test_summary_counts() {
        let rec = |gene: &str, call: DeCall, p: f64| DeRecord {
            gene: gene.into(),
            log2_fold_change: 0.0,
            average_expression: 1.0,
            statistic: 0.0,
            pvalue: p,
            padj: p,
            call,
            contrast: "cig_vs_ctrl".into(),
            cohort: "S1_airway".into(),
        };
        let summary = DeSummary::from_records(&[
            rec("a", DeCall::Up, 0.01),
            rec("b", DeCall::Down, 0.01),
            rec("c", DeCall::No, f64::NAN),
        ]);
        assert_eq!(summary.genes_tested, 2);
        assert_eq!(summary.upregulated, 1);
        assert!(summary.to_string().contains("S1_airway / cig_vs_ctrl"));
    }

    #[test]
    fn test_gene_set_from_de_records() {
        let rec = |gene: &str, lfc: f64, padj: f64| DeRecord {
            gene: gene.into(),
            log2_fold_change: lfc,
            average_expression: 1.0,
            statistic: 0.0,
            pvalue: padj,
            padj,
            call: DeCall::No,
            contrast: "TCDD_vs_vehicle".into(),
            cohort: "all".into(),
        };
        let records = [
            rec("Cyp1a1", 4.0, 1e-20),
            rec("Tiparp", 2.0, 1e-6),
            rec("Nqo1", 1.5, 0.01),
            rec("Ahrr", -3.0, 1e-12),
        ];
        let up = GeneSet::from_de_records("up", &records, &Thresholds::export(), Direction::Up);
        assert_eq!(up.genes(), &["Cyp1a1", "Tiparp"]);
        let down = GeneSet::from_de_records("dn", &records, &Thresholds::export(), Direction::Down);
        assert_eq!(down.genes(), &["Ahrr"]);
    }
}
