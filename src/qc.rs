//! Per-sample QC metrics and threshold-based sample filtering

use serde::{Deserialize, Serialize};

use crate::data::{check_alignment, CountMatrix, GeneAnnotation, QcMetrics, SampleTable};
use crate::error::Result;

/// Sample-level QC cutoffs; a `NaN` metric never fails a cutoff
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QcThresholds {
    pub min_total_counts: f64,
    pub min_total_sj_counts: f64,
    pub max_mito_fraction: f64,
    pub max_intergenic_fraction: f64,
    pub max_ribo_fraction: f64,
}

impl Default for QcThresholds {
    fn default() -> Self {
        Self {
            min_total_counts: 1e6,
            min_total_sj_counts: 1e5,
            max_mito_fraction: 0.3,
            max_intergenic_fraction: 0.2,
            max_ribo_fraction: 0.5,
        }
    }
}

impl QcThresholds {
    /// Reasons a sample fails, empty when it passes
    pub fn failures(&self, qc: &QcMetrics) -> Vec<String> {
        let mut reasons = Vec::new();
        if qc.total_counts < self.min_total_counts {
            reasons.push(format!("total_counts {} < {}", qc.total_counts, self.min_total_counts));
        }
        if qc.total_sj_counts < self.min_total_sj_counts {
            reasons.push(format!(
                "total_sj_counts {} < {}",
                qc.total_sj_counts, self.min_total_sj_counts
            ));
        }
        if qc.mito_fraction > self.max_mito_fraction {
            reasons.push(format!(
                "mito_fraction {:.3} > {}",
                qc.mito_fraction, self.max_mito_fraction
            ));
        }
        if qc.intergenic_fraction > self.max_intergenic_fraction {
            reasons.push(format!(
                "intergenic_fraction {:.3} > {}",
                qc.intergenic_fraction, self.max_intergenic_fraction
            ));
        }
        if qc.ribo_fraction > self.max_ribo_fraction {
            reasons.push(format!(
                "ribo_fraction {:.3} > {}",
                qc.ribo_fraction, self.max_ribo_fraction
            ));
        }
        reasons
    }
}

/// Outcome of QC for one library
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QcDecision {
    pub library: String,
    pub passed: bool,
    pub reasons: Vec<String>,
}

/// Compute QC metrics for every sample in the table
///
/// The gene-level and junction-level matrices must be aligned; a mismatch is
/// fatal. The intergenic fraction is carried over from the sample table.
pub fn compute_qc(
    samples: &SampleTable,
    gene_counts: &CountMatrix,
    junction_counts: &CountMatrix,
    annotation: &GeneAnnotation,
) -> Result<Vec<QcMetrics>> {
    check_alignment(gene_counts, junction_counts)?;

    let libraries = samples.libraries();
    let genes = gene_counts.select_samples(&libraries)?;
    let junctions = junction_counts.select_samples(&libraries)?;

    let mito: Vec<usize> = (0..genes.n_genes())
        .filter(|&i| annotation.is_mitochondrial(&genes.gene_ids()[i]))
        .collect();
    let ribo: Vec<usize> = (0..genes.n_genes())
        .filter(|&i| annotation.is_ribosomal(&genes.gene_ids()[i]))
        .collect();
    log::debug!("QC: {} mitochondrial and {} ribosomal genes", mito.len(), ribo.len());

    let totals = genes.library_sizes();
    let sj_totals = junctions.library_sizes();

    Ok(samples
        .records()
        .iter()
        .enumerate()
        .map(|(j, record)| {
            let col = genes.sample_counts(j);
            let total = totals[j];
            let fraction = |idx: &[usize]| {
                if total > 0.0 {
                    idx.iter().map(|&i| col[i]).sum::<f64>() / total
                } else {
                    f64::NAN
                }
            };
            QcMetrics {
                total_counts: total,
                total_sj_counts: sj_totals[j],
                mito_fraction: fraction(&mito),
                intergenic_fraction: record.qc.intergenic_fraction,
                ribo_fraction: fraction(&ribo),
            }
        })
        .collect())
}

/// Keep samples whose QC metrics pass every threshold
pub fn filter_samples(samples: &SampleTable, thresholds: &QcThresholds) -> (SampleTable, Vec<QcDecision>) {
    let decisions: Vec<QcDecision> = samples
        .records()
        .iter()
        .map(|r| {
            let reasons = thresholds.failures(&r.qc);
            QcDecision {
                library: r.library.clone(),
                passed: reasons.is_empty(),
                reasons,
            }
        })
        .collect();

    for d in decisions.iter().filter(|d| !d.passed) {
        log::warn!("Sample {} fails QC: {}", d.library, d.reasons.join("; "));
    }

    let kept = samples.filter(|r| thresholds.failures(&r.qc).is_empty());
    log::info!("QC: {} of {} samples pass", kept.len(), samples.len());
    (kept, decisions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SampleRecord;
    use ndarray::array;

    fn record(lib: &str, intergenic: f64) -> SampleRecord {
        SampleRecord {
            study: "S1".into(),
            patient: lib.into(),
            sample: lib.into(),
            library: lib.into(),
            tissue: "airway".into(),
            smoking_type: "control".into(),
            smoking_status: "never".into(),
            qc: QcMetrics {
                intergenic_fraction: intergenic,
                ..QcMetrics::default()
            },
        }
    }

    fn annotation() -> GeneAnnotation {
        let mut ann = GeneAnnotation::new();
        ann.insert("E1", "MT-CO1", "MT");
        ann.insert("E2", "RPL13", "16");
        ann.insert("E3", "CYP1A1", "15");
        ann
    }

    #[test]
    fn test_compute_qc_fractions() {
        let ids = vec!["E1".to_string(), "E2".to_string(), "E3".to_string()];
        let libs = vec!["L1".to_string(), "L2".to_string()];
        let genes = CountMatrix::new(array![[10.0, 50.0], [20.0, 0.0], [70.0, 50.0]], ids.clone(), libs.clone()).unwrap();
        let junctions = CountMatrix::new(array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]], ids, libs).unwrap();
        let samples = SampleTable::new(vec![record("L2", 0.1), record("L1", f64::NAN)]).unwrap();

        let qc = compute_qc(&samples, &genes, &junctions, &annotation()).unwrap();
        // Sample table order, not matrix order
        assert_eq!(qc[0].total_counts, 100.0);
        assert!((qc[0].mito_fraction - 0.5).abs() < 1e-12);
        assert_eq!(qc[0].ribo_fraction, 0.0);
        assert_eq!(qc[0].total_sj_counts, 12.0);
        assert!((qc[1].ribo_fraction - 0.2).abs() < 1e-12);
        assert!(qc[1].intergenic_fraction.is_nan());
    }

    #[test]
    fn test_misaligned_matrices_are_fatal() {
        let genes = CountMatrix::new(array![[1.0, 2.0]], vec!["E1".into()], vec!["L1".into(), "L2".into()]).unwrap();
        let junctions = CountMatrix::new(array![[1.0, 2.0]], vec!["E1".into()], vec!["L2".into(), "L1".into()]).unwrap();
        let samples = SampleTable::new(vec![record("L1", 0.0)]).unwrap();
        assert!(compute_qc(&samples, &genes, &junctions, &annotation()).is_err());
    }

    #[test]
    fn test_nan_metrics_never_fail() {
        let thresholds = QcThresholds::default();
        assert!(thresholds.failures(&QcMetrics::default()).is_empty());

        let mut bad = record("L1", 0.5);
        bad.qc.total_counts = 10.0;
        let samples = SampleTable::new(vec![bad, record("L2", f64::NAN)]).unwrap();
        let (kept, decisions) = filter_samples(&samples, &thresholds);
        assert_eq!(kept.libraries(), vec!["L2"]);
        assert_eq!(decisions[0].reasons.len(), 2);
    }
}
