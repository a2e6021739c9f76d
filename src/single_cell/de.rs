//! Per-cluster treatment vs control markers
//!
//! For every cluster, and for all cells pooled as cluster `"all"`, cells of
//! the treatment group are compared against control cells gene by gene with
//! a Wilcoxon rank-sum test after detection and fold-change pre-filters.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::data::SingleCellData;
use crate::de::{call_for, DeRecord, Thresholds};
use crate::testing::{bonferroni, rank_sum_test};

/// Label of the pseudo-cluster holding every cell
pub const ALL_CELLS: &str = "all";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerParams {
    pub treatment: String,
    pub control: String,
    /// Minimum detection fraction in either group
    pub min_pct: f64,
    /// Minimum absolute average log2 fold change
    pub logfc_threshold: f64,
    /// Clusters with fewer cells in either group are not tested
    pub min_cells_group: usize,
}

impl Default for MarkerParams {
    fn default() -> Self {
        Self {
            treatment: "TCDD".to_string(),
            control: "vehicle".to_string(),
            min_pct: 0.01,
            logfc_threshold: 0.1,
            min_cells_group: 3,
        }
    }
}

/// One gene tested in one cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerRecord {
    pub gene: String,
    pub cluster: String,
    pub avg_log2fc: f64,
    pub pct_1: f64,
    pub pct_2: f64,
    /// Mean log expression over the compared cells
    pub avg_expression: f64,
    pub z: f64,
    pub pvalue: f64,
    pub padj: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClusterOutcome {
    Tested(Vec<MarkerRecord>),
    /// Too few cells in a group for a meaningful test
    Degenerate { n_treatment: usize, n_control: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterResult {
    pub cluster: String,
    pub outcome: ClusterOutcome,
}

impl ClusterResult {
    pub fn records(&self) -> &[MarkerRecord] {
        match &self.outcome {
            ClusterOutcome::Tested(records) => records,
            ClusterOutcome::Degenerate { .. } => &[],
        }
    }
}

/// Test treatment vs control within the given cells
pub fn find_markers(
    data: &SingleCellData,
    cells: &[usize],
    cluster: &str,
    params: &MarkerParams,
) -> ClusterOutcome {
    let treatment: Vec<usize> = cells
        .iter()
        .copied()
        .filter(|&c| data.groups()[c] == params.treatment)
        .collect();
    let control: Vec<usize> = cells
        .iter()
        .copied()
        .filter(|&c| data.groups()[c] == params.control)
        .collect();

    if treatment.len() < params.min_cells_group || control.len() < params.min_cells_group {
        log::warn!(
            "Cluster {}: {} {} vs {} {} cells, not tested",
            cluster,
            treatment.len(),
            params.treatment,
            control.len(),
            params.control
        );
        return ClusterOutcome::Degenerate {
            n_treatment: treatment.len(),
            n_control: control.len(),
        };
    }

    let mut records: Vec<MarkerRecord> = (0..data.n_genes())
        .into_par_iter()
        .filter_map(|g| {
            let row = data.gene_row(g);
            let x: Vec<f64> = treatment.iter().map(|&c| row[c]).collect();
            let y: Vec<f64> = control.iter().map(|&c| row[c]).collect();

            let pct_1 = detection_rate(&x);
            let pct_2 = detection_rate(&y);
            if pct_1.max(pct_2) < params.min_pct {
                return None;
            }
            let avg_log2fc = mean_expm1_log2(&x) - mean_expm1_log2(&y);
            if avg_log2fc.abs() < params.logfc_threshold {
                return None;
            }

            let test = rank_sum_test(&x, &y);
            let avg_expression = (x.iter().sum::<f64>() + y.iter().sum::<f64>()) / (x.len() + y.len()) as f64;
            Some(MarkerRecord {
                gene: data.genes()[g].clone(),
                cluster: cluster.to_string(),
                avg_log2fc,
                pct_1,
                pct_2,
                avg_expression,
                z: test.z,
                pvalue: test.pvalue,
                padj: f64::NAN,
            })
        })
        .collect();

    let pvalues: Vec<f64> = records.iter().map(|r| r.pvalue).collect();
    for (r, padj) in records.iter_mut().zip(bonferroni(&pvalues, data.n_genes())) {
        r.padj = padj;
    }
    records.sort_by(|a, b| {
        a.pvalue
            .total_cmp(&b.pvalue)
            .then(b.avg_log2fc.abs().total_cmp(&a.avg_log2fc.abs()))
    });

    log::debug!("Cluster {}: {} genes tested", cluster, records.len());
    ClusterOutcome::Tested(records)
}

/// Markers for the `"all"` pseudo-cluster followed by every cluster
pub fn markers_by_cluster(data: &SingleCellData, params: &MarkerParams) -> Vec<ClusterResult> {
    let all: Vec<usize> = (0..data.n_cells()).collect();
    let mut results = vec![ClusterResult {
        cluster: ALL_CELLS.to_string(),
        outcome: find_markers(data, &all, ALL_CELLS, params),
    }];

    for level in data.cluster_levels() {
        let cells: Vec<usize> = (0..data.n_cells())
            .filter(|&c| data.clusters()[c] == level)
            .collect();
        results.push(ClusterResult {
            outcome: find_markers(data, &cells, &level, params),
            cluster: level,
        });
    }
    results
}

/// Flatten tested clusters into DE records called under `thresholds`
pub fn to_de_records(results: &[ClusterResult], params: &MarkerParams, thresholds: &Thresholds) -> Vec<DeRecord> {
    let contrast = format!("{}_vs_{}", params.treatment, params.control);
    results
        .iter()
        .flat_map(|r| r.records().iter())
        .map(|m| DeRecord {
            gene: m.gene.clone(),
            log2_fold_change: m.avg_log2fc,
            average_expression: m.avg_expression,
            statistic: m.z,
            pvalue: m.pvalue,
            padj: m.padj,
            call: call_for(m.padj, m.avg_log2fc, thresholds),
            contrast: contrast.clone(),
            cohort: m.cluster.clone(),
        })
        .collect()
}

fn detection_rate(x: &[f64]) -> f64 {
    x.iter().filter(|&&v| v > 0.0).count() as f64 / x.len() as f64
}

/// `log2(mean(expm1(x)) + 1)`
fn mean_expm1_log2(x: &[f64]) -> f64 {
    let m = x.iter().map(|v| v.exp_m1()).sum::<f64>() / x.len() as f64;
    (m + 1.0).log2()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// 3 genes x 24 cells; cluster 0 has 8 TCDD and 8 vehicle cells,
    /// cluster 1 has 6 TCDD and 2 vehicle cells
    fn data() -> SingleCellData {
        let n = 24;
        let clusters: Vec<String> = (0..n).map(|c| if c < 16 { "0" } else { "1" }.to_string()).collect();
        let groups: Vec<String> = (0..n)
            .map(|c| {
                let tcdd = if c < 16 { c % 2 == 0 } else { c < 22 };
                if tcdd { "TCDD" } else { "vehicle" }.to_string()
            })
            .collect();
        let expr = Array2::from_shape_fn((3, n), |(g, c)| {
            let tcdd = groups[c] == "TCDD";
            match g {
                // Induced by TCDD
                0 => {
                    if tcdd {
                        3.0 + (c % 3) as f64 * 0.1
                    } else if c % 4 == 1 {
                        0.1
                    } else {
                        0.0
                    }
                }
                // Flat
                1 => 1.0 + (c % 4) as f64 * 0.01,
                // Never detected
                _ => 0.0,
            }
        });
        SingleCellData::new(
            expr,
            vec!["Cyp1a1".into(), "Actb".into(), "Xist".into()],
            (0..n).map(|c| format!("cell{}", c)).collect(),
            clusters,
            groups,
        )
        .unwrap()
    }

    #[test]
    fn test_all_cluster_first_and_degenerate_reported() {
        let results = markers_by_cluster(&data(), &MarkerParams::default());
        let names: Vec<&str> = results.iter().map(|r| r.cluster.as_str()).collect();
        assert_eq!(names, vec!["all", "0", "1"]);
        assert_eq!(
            results[2].outcome,
            ClusterOutcome::Degenerate {
                n_treatment: 6,
                n_control: 2
            }
        );
    }

    #[test]
    fn test_filters_and_statistics() {
        let results = markers_by_cluster(&data(), &MarkerParams::default());
        let cluster0 = results[1].records();
        // Actb fails the fold-change filter, Xist the detection filter
        assert_eq!(cluster0.len(), 1);
        let cyp = &cluster0[0];
        assert_eq!(cyp.gene, "Cyp1a1");
        assert_eq!(cyp.pct_1, 1.0);
        assert_eq!(cyp.pct_2, 0.5);
        assert!(cyp.avg_log2fc > 3.0);
        assert!(cyp.pvalue < 0.01);
        // Bonferroni over all 3 genes
        assert!((cyp.padj - (cyp.pvalue * 3.0).min(1.0)).abs() < 1e-15);
    }

    #[test]
    fn test_de_records_use_given_thresholds() {
        let params = MarkerParams::default();
        let results = markers_by_cluster(&data(), &params);
        let strict = to_de_records(&results, &params, &Thresholds::new(1e-300, 1.0));
        assert!(strict.iter().all(|r| r.call == crate::de::DeCall::No));
        let loose = to_de_records(&results, &params, &Thresholds::new(0.05, 1.0));
        assert!(loose.iter().any(|r| r.call == crate::de::DeCall::Up));
        assert_eq!(loose[0].contrast, "TCDD_vs_vehicle");
    }
}
