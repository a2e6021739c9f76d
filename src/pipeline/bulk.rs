//! Bulk pipeline: QC, cohorts, HVG, PCA, moderated DE, GSEA, xCell

use std::path::{Path, PathBuf};

use ndarray::Axis;
use serde::Serialize;

use super::{ensure_dir, file_stem, load_gene_sets};
use crate::config::{BulkConfig, MouseSignatureConfig};
use crate::data::{build_cohorts, Cohort, GeneAnnotation, SampleTable};
use crate::de::{DeRecord, DeSummary, Direction, EnrichmentRecord, GeneSet};
use crate::deconvolution::{Deconvolution, PrecomputedXcell};
use crate::enrichment::{gsea, RankedList};
use crate::error::Result;
use crate::hvg::select_hvg;
use crate::io::{
    read_count_matrix, read_de_table, write_de_table, write_enrichment_table, write_matrix,
    write_records, Table,
};
use crate::linear_model::differential_expression;
use crate::orthology::{translate_set, OrthologTable};
use crate::pca::pca;
use crate::qc::{compute_qc, filter_samples, QcDecision};

/// What one cohort produced
#[derive(Debug, Clone)]
pub struct CohortReport {
    pub name: String,
    pub n_samples: usize,
    pub n_genes: usize,
    pub de: Vec<DeSummary>,
    /// Contrasts that could not be evaluated, with the reason
    pub skipped_contrasts: Vec<(String, String)>,
    pub n_enriched: usize,
}

#[derive(Debug, Clone)]
pub struct BulkReport {
    pub qc: Vec<QcDecision>,
    pub cohorts: Vec<CohortReport>,
    pub output_dir: PathBuf,
}

#[derive(Serialize)]
struct QcRow<'a> {
    library: &'a str,
    study: &'a str,
    tissue: &'a str,
    smoking_type: &'a str,
    total_counts: f64,
    total_sj_counts: f64,
    mito_fraction: f64,
    intergenic_fraction: f64,
    ribo_fraction: f64,
    passed: bool,
    reasons: String,
}

#[derive(Serialize)]
struct VarianceRow {
    component: String,
    singular_value: f64,
    explained_variance_ratio: f64,
}

/// Run the bulk analysis described by `config`
pub fn run(config: &BulkConfig) -> Result<BulkReport> {
    let out = ensure_dir(&config.output_dir)?;

    log::info!("Joining {} with {}", config.sample_sheet.display(), config.metadata.display());
    let samples = SampleTable::join(&Table::read(&config.sample_sheet)?, &Table::read(&config.metadata)?)?;
    log::info!("  {} samples", samples.len());

    let gene_counts = read_count_matrix(&config.gene_counts)?;
    let junction_counts = read_count_matrix(&config.junction_counts)?;
    let annotation = GeneAnnotation::read(&config.annotation)?;
    log::info!(
        "  {} genes, {} junction rows, {} annotated genes",
        gene_counts.n_genes(),
        junction_counts.n_genes(),
        annotation.len()
    );

    let qc = compute_qc(&samples, &gene_counts, &junction_counts, &annotation)?;
    let samples = samples.with_qc(qc)?;
    let (passed, decisions) = filter_samples(&samples, &config.qc);
    write_qc_table(&out.join("qc.tsv"), &samples, &decisions)?;

    let cohorts = build_cohorts(&passed, &gene_counts, &annotation, &config.cohort)?;
    log::info!("Built {} cohorts", cohorts.len());

    let mut gene_sets = load_gene_sets(&config.gene_sets)?;
    if let Some(mouse) = &config.mouse_signatures {
        gene_sets.extend(mouse_gene_sets(mouse)?);
    }

    let xcell = config.xcell.as_ref().map(PrecomputedXcell::read).transpose()?;

    let mut all_de: Vec<DeRecord> = Vec::new();
    let mut all_enrichment: Vec<EnrichmentRecord> = Vec::new();
    let mut reports = Vec::with_capacity(cohorts.len());
    for cohort in &cohorts {
        let (report, de, enrichment) = run_cohort(cohort, config, &gene_sets, xcell.as_ref(), &out)?;
        all_de.extend(de);
        all_enrichment.extend(enrichment);
        reports.push(report);
    }

    write_de_table(out.join("de_all.tsv"), &all_de)?;
    write_enrichment_table(out.join("gsea_all.tsv"), &all_enrichment)?;
    log::info!("Wrote results to {}", out.display());

    Ok(BulkReport {
        qc: decisions,
        cohorts: reports,
        output_dir: out,
    })
}

fn run_cohort(
    cohort: &Cohort,
    config: &BulkConfig,
    gene_sets: &[GeneSet],
    xcell: Option<&PrecomputedXcell>,
    out: &Path,
) -> Result<(CohortReport, Vec<DeRecord>, Vec<EnrichmentRecord>)> {
    let name = cohort.name();
    log::info!("Cohort {}: {} samples x {} genes", name, cohort.n_samples(), cohort.n_genes());
    let dir = ensure_dir(&out.join(file_stem(name)))?;
    let libraries = cohort.samples().libraries();

    write_matrix(dir.join("log_cpm.tsv"), "gene", cohort.symbols(), &libraries, cohort.log_cpm())?;

    let hvg = select_hvg(cohort.log_cpm(), cohort.symbols(), &config.hvg)?;
    write_records(dir.join("hvg.tsv"), hvg.ranked())?;

    let top = cohort.log_cpm().select(Axis(0), &hvg.top_indices());
    let pcs = pca(top.view(), &hvg.top_genes(), &libraries, &config.pca)?;
    let components = pcs.component_names();
    write_matrix(dir.join("pca_scores.tsv"), "library", &libraries, &components, pcs.scores.view())?;
    let variance: Vec<VarianceRow> = components
        .iter()
        .enumerate()
        .map(|(k, c)| VarianceRow {
            component: c.clone(),
            singular_value: pcs.singular_values[k],
            explained_variance_ratio: pcs.explained_variance_ratio[k],
        })
        .collect();
    write_records(dir.join("pca_variance.tsv"), &variance)?;

    let outcome = differential_expression(
        cohort.log_cpm(),
        cohort.symbols(),
        &cohort.samples().smoking_types(),
        &config.contrasts,
        &config.ebayes,
        &config.thresholds,
        name,
    )?;

    let mut de_all = Vec::new();
    let mut enrichment_all = Vec::new();
    let mut summaries = Vec::new();
    for (contrast, table) in &outcome.tables {
        let summary = DeSummary::from_records(table);
        log::info!("{} {}: {} up, {} down", name, contrast, summary.upregulated, summary.downregulated);
        summaries.push(summary);
        write_de_table(dir.join(format!("de_{}.tsv", file_stem(contrast))), table)?;

        if !gene_sets.is_empty() {
            let ranked = RankedList::from_records(table)?;
            let enrichment = gsea(&ranked, gene_sets, &config.gsea, contrast, name)?;
            write_enrichment_table(dir.join(format!("gsea_{}.tsv", file_stem(contrast))), &enrichment)?;
            enrichment_all.extend(enrichment);
        }
        de_all.extend(table.iter().cloned());
    }

    if let Some(xcell) = xcell {
        let scores = xcell.scores(cohort)?;
        write_matrix(dir.join("xcell.tsv"), "cell_type", &scores.cell_types, &scores.samples, scores.scores.view())?;
    }

    let report = CohortReport {
        name: name.to_string(),
        n_samples: cohort.n_samples(),
        n_genes: cohort.n_genes(),
        de: summaries,
        skipped_contrasts: outcome.skipped,
        n_enriched: enrichment_all.len(),
    };
    Ok((report, de_all, enrichment_all))
}

/// Up and down sets from the mouse single-cell table, translated to human symbols
fn mouse_gene_sets(mouse: &MouseSignatureConfig) -> Result<Vec<GeneSet>> {
    let records: Vec<DeRecord> = read_de_table(&mouse.de_table)?
        .into_iter()
        .filter(|r| r.cohort == mouse.cluster)
        .collect();
    let orthologs = OrthologTable::read(&mouse.orthologs)?;
    log::info!(
        "Mouse signatures: {} DE rows in cluster {}, {} ortholog entries",
        records.len(),
        mouse.cluster,
        orthologs.len()
    );

    Ok([(Direction::Up, "up"), (Direction::Down, "dn")]
        .into_iter()
        .map(|(direction, tag)| {
            let set = GeneSet::from_de_records(
                format!("mouse_TCDD_{}_{}", mouse.cluster, tag),
                &records,
                &mouse.thresholds,
                direction,
            );
            translate_set(&orthologs, &set)
        })
        .collect())
}

fn write_qc_table(path: &Path, samples: &SampleTable, decisions: &[QcDecision]) -> Result<()> {
    let rows: Vec<QcRow> = samples
        .records()
        .iter()
        .zip(decisions)
        .map(|(r, d)| QcRow {
            library: &r.library,
            study: &r.study,
            tissue: &r.tissue,
            smoking_type: &r.smoking_type,
            total_counts: r.qc.total_counts,
            total_sj_counts: r.qc.total_sj_counts,
            mito_fraction: r.qc.mito_fraction,
            intergenic_fraction: r.qc.intergenic_fraction,
            ribo_fraction: r.qc.ribo_fraction,
            passed: d.passed,
            reasons: d.reasons.join("; "),
        })
        .collect();
    write_records(path, &rows)
}
