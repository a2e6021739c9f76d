//! Single-cell pipeline: per-cluster markers, signature scores, volcano labels

use std::path::PathBuf;

use ndarray::Array2;

use super::{ensure_dir, file_stem, load_gene_sets};
use crate::config::SingleCellConfig;
use crate::de::{label_volcano, DeRecord, DeSummary};
use crate::error::Result;
use crate::io::{write_de_table, write_matrix, write_records, write_volcano_table};
use crate::single_cell::{markers_by_cluster, score_signatures, to_de_records, ClusterOutcome, SingleCellData};

#[derive(Debug, Clone)]
pub struct SingleCellReport {
    /// Clusters that were tested, `"all"` first
    pub tested: Vec<DeSummary>,
    /// Clusters skipped for too few cells, with group sizes
    pub degenerate: Vec<(String, usize, usize)>,
    pub signatures_scored: usize,
    pub output_dir: PathBuf,
}

/// Run the single-cell analysis described by `config`
pub fn run(config: &SingleCellConfig) -> Result<SingleCellReport> {
    let out = ensure_dir(&config.output_dir)?;

    let data = SingleCellData::read(&config.expression, &config.cells)?;
    log::info!("Loaded {} genes x {} cells", data.n_genes(), data.n_cells());

    let results = markers_by_cluster(&data, &config.markers);
    let mut tested = Vec::new();
    let mut degenerate = Vec::new();
    for r in &results {
        match &r.outcome {
            ClusterOutcome::Tested(markers) => {
                write_records(out.join(format!("markers_{}.tsv", file_stem(&r.cluster))), markers)?;
            }
            ClusterOutcome::Degenerate { n_treatment, n_control } => {
                degenerate.push((r.cluster.clone(), *n_treatment, *n_control));
            }
        }
    }

    // The exported table and the plots use separate cutoffs
    let exported = to_de_records(&results, &config.markers, &config.export_thresholds);
    write_de_table(out.join("de_single_cell.tsv"), &exported)?;

    for r in results.iter().filter(|r| matches!(r.outcome, ClusterOutcome::Tested(_))) {
        let cluster_records: Vec<DeRecord> = exported.iter().filter(|d| d.cohort == r.cluster).cloned().collect();
        tested.push(DeSummary::from_records(&cluster_records));
        // Volcano calls are recomputed under the plot cutoffs
        let points = label_volcano(
            &cluster_records,
            &config.plot_thresholds,
            &config.highlight_genes,
            config.top_n_labels,
        );
        write_volcano_table(out.join(format!("volcano_{}.tsv", file_stem(&r.cluster))), &points)?;
    }

    let signatures = load_gene_sets(&config.signatures)?;
    let scores = score_signatures(&data, &signatures, &config.scoring)?;
    if !scores.is_empty() {
        let names: Vec<String> = scores.iter().map(|s| s.signature.clone()).collect();
        let matrix = Array2::from_shape_fn((data.n_cells(), scores.len()), |(c, k)| scores[k].scores[c]);
        write_matrix(out.join("signature_scores.tsv"), "cell", data.cells(), &names, matrix.view())?;
    }
    log::info!(
        "{} clusters tested, {} skipped, {} signatures scored",
        tested.len(),
        degenerate.len(),
        scores.len()
    );

    Ok(SingleCellReport {
        tested,
        degenerate,
        signatures_scored: scores.len(),
        output_dir: out,
    })
}
