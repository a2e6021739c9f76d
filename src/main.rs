//! ahr_rnaseq command-line interface

use std::collections::BTreeMap;

use clap::Parser;
use log::{info, LevelFilter};

use ahr_rnaseq::cli::{Cli, Commands};
use ahr_rnaseq::io::{read_de_table, read_matrix, write_records};
use ahr_rnaseq::pipeline;
use ahr_rnaseq::prelude::*;

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .ok();
    }

    let result = match cli.command {
        Commands::Bulk { config } => run_bulk(&config),
        Commands::SingleCell { config } => run_single_cell(&config),
        Commands::Hvg {
            input,
            output,
            n_top,
            span,
        } => run_hvg(&input, &output, n_top, span),
        Commands::Gsea {
            de_table,
            gene_sets,
            output,
            min_size,
            max_size,
            n_perm,
            seed,
        } => run_gsea(
            &de_table,
            &gene_sets,
            &output,
            GseaParams {
                min_size,
                max_size,
                n_perm,
                seed,
                ..GseaParams::default()
            },
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_bulk(config_path: &str) -> Result<()> {
    info!("Loading configuration from: {}", config_path);
    let config = BulkConfig::load(config_path)?;
    let report = pipeline::bulk::run(&config)?;

    let failed = report.qc.iter().filter(|d| !d.passed).count();
    println!("QC: {} of {} samples failed", failed, report.qc.len());
    for cohort in &report.cohorts {
        println!("{}: {} samples, {} genes", cohort.name, cohort.n_samples, cohort.n_genes);
        for summary in &cohort.de {
            println!("{}", summary);
        }
        for (contrast, reason) in &cohort.skipped_contrasts {
            println!("  skipped {}: {}", contrast, reason);
        }
    }
    println!("Results written to {}", report.output_dir.display());
    Ok(())
}

fn run_single_cell(config_path: &str) -> Result<()> {
    info!("Loading configuration from: {}", config_path);
    let config = SingleCellConfig::load(config_path)?;
    let report = pipeline::single_cell::run(&config)?;

    for summary in &report.tested {
        println!("{}", summary);
    }
    for (cluster, n_treatment, n_control) in &report.degenerate {
        println!("Cluster {} not tested ({} vs {} cells)", cluster, n_treatment, n_control);
    }
    println!("Results written to {}", report.output_dir.display());
    Ok(())
}

fn run_hvg(input: &str, output: &str, n_top: usize, span: f64) -> Result<()> {
    info!("Loading expression matrix from: {}", input);
    let matrix = read_matrix(input)?;
    info!("  {} genes, {} samples", matrix.row_ids.len(), matrix.col_ids.len());

    let hvg = select_hvg(matrix.values.view(), &matrix.row_ids, &HvgParams { span, n_top })?;
    info!("Writing {} ranked genes to: {}", hvg.ranked().len(), output);
    write_records(output, hvg.ranked())?;
    Ok(())
}

fn run_gsea(de_path: &str, set_paths: &[String], output: &str, params: GseaParams) -> Result<()> {
    info!("Loading DE table from: {}", de_path);
    let records = read_de_table(de_path)?;

    let mut sets = Vec::new();
    for path in set_paths {
        sets.extend(read_gene_sets(path)?);
    }
    info!("  {} DE rows, {} gene sets", records.len(), sets.len());

    // One ranking per (cohort, contrast) present in the table
    let mut groups: BTreeMap<(String, String), Vec<DeRecord>> = BTreeMap::new();
    for r in records {
        groups.entry((r.cohort.clone(), r.contrast.clone())).or_default().push(r);
    }

    let mut enrichment = Vec::new();
    for ((cohort, contrast), group) in &groups {
        let ranked = RankedList::from_records(group)?;
        enrichment.extend(gsea(&ranked, &sets, &params, contrast, cohort)?);
    }
    info!("Writing {} enrichment rows to: {}", enrichment.len(), output);
    write_enrichment_table(output, &enrichment)?;
    Ok(())
}
