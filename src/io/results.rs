//! Writers for the result tables of both pipelines

use std::path::Path;

use serde::Serialize;

use crate::de::{DeRecord, EnrichmentRecord, VolcanoPoint};
use crate::error::Result;

use super::csv::{tsv_writer, write_records};

/// Write DE records in the column layout read back by [`super::read_de_table`]
pub fn write_de_table<P: AsRef<Path>>(path: P, records: &[DeRecord]) -> Result<()> {
    write_records(path, records)
}

#[derive(Serialize)]
struct EnrichmentRow<'a> {
    pathway: &'a str,
    es: f64,
    nes: f64,
    pvalue: f64,
    padj: f64,
    size: usize,
    leading_edge: String,
    contrast: &'a str,
    cohort: &'a str,
}

/// Write GSEA records; leading-edge genes are comma separated
pub fn write_enrichment_table<P: AsRef<Path>>(path: P, records: &[EnrichmentRecord]) -> Result<()> {
    let mut writer = tsv_writer(path.as_ref())?;
    for r in records {
        writer.serialize(EnrichmentRow {
            pathway: &r.pathway,
            es: r.es,
            nes: r.nes,
            pvalue: r.pvalue,
            padj: r.padj,
            size: r.size,
            leading_edge: r.leading_edge.join(","),
            contrast: &r.contrast,
            cohort: &r.cohort,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Write volcano coordinates with their annotation flags
pub fn write_volcano_table<P: AsRef<Path>>(path: P, points: &[VolcanoPoint]) -> Result<()> {
    write_records(path, points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::de::DeCall;
    use crate::io::read_de_table;
    use tempfile::NamedTempFile;

    #[test]
    fn test_de_table_read_back() {
        let file = NamedTempFile::new().unwrap();
        let records = vec![
            DeRecord {
                gene: "CYP1A1".into(),
                log2_fold_change: 3.2,
                average_expression: 5.1,
                statistic: 9.0,
                pvalue: 1e-12,
                padj: 1e-9,
                call: DeCall::Up,
                contrast: "cig_vs_ctrl".into(),
                cohort: "S1_airway".into(),
            },
            DeRecord {
                gene: "ACTB".into(),
                log2_fold_change: 0.0,
                average_expression: 12.0,
                statistic: f64::NAN,
                pvalue: f64::NAN,
                padj: f64::NAN,
                call: DeCall::No,
                contrast: "cig_vs_ctrl".into(),
                cohort: "S1_airway".into(),
            },
        ];
        write_de_table(file.path(), &records).unwrap();

        let back = read_de_table(file.path()).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].gene, "CYP1A1");
        assert_eq!(back[0].call, DeCall::Up);
        assert!(back[1].padj.is_nan());
    }

    #[test]
    fn test_enrichment_leading_edge_joined() {
        let file = NamedTempFile::new().unwrap();
        let records = vec![EnrichmentRecord {
            pathway: "XENOBIOTIC".into(),
            es: 0.7,
            nes: 2.1,
            pvalue: 0.001,
            padj: 0.01,
            size: 12,
            leading_edge: vec!["CYP1A1".into(), "CYP1B1".into()],
            contrast: "cig_vs_ctrl".into(),
            cohort: "S1_airway".into(),
        }];
        write_enrichment_table(file.path(), &records).unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.contains("CYP1A1,CYP1B1"));
        assert!(text.starts_with("pathway\tes\tnes"));
    }
}
