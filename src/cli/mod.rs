//! Command-line interface for ahr_rnaseq

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ahr_rnaseq")]
#[command(version)]
#[command(about = "Bulk and single-cell RNA-seq analysis of AHR signalling")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Number of threads (0 = all cores)
    #[arg(short, long, global = true, default_value = "0")]
    pub threads: usize,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bulk smoking-cohort pipeline
    #[command(
        long_about = "Run the bulk smoking-cohort pipeline\n\n\
            Joins the sample sheet with metadata, applies sample QC, builds one\n\
            cohort per (study, tissue), then for each cohort selects highly\n\
            variable genes, runs PCA, fits moderated contrasts between smoking\n\
            types and tests gene sets by preranked GSEA.",
        after_long_help = "\
Example config (JSON, every parameter block optional):
  {
    \"sample_sheet\": \"samples.tsv\",
    \"metadata\": \"metadata.tsv\",
    \"gene_counts\": \"gene_counts.tsv\",
    \"junction_counts\": \"sj_counts.tsv\",
    \"annotation\": \"genes.tsv\",
    \"output_dir\": \"bulk_out\",
    \"gene_sets\": [\"ahr_curated.txt\", \"hallmark.gmt\"],
    \"cohort\": { \"gene_min_counts\": 10, \"gene_min_samples\": 3 }
  }"
    )]
    Bulk {
        /// Path to the JSON run configuration
        #[arg(short, long)]
        config: String,
    },

    /// Run the single-cell TCDD vs vehicle pipeline
    #[command(
        long_about = "Run the single-cell TCDD vs vehicle pipeline\n\n\
            Tests every cluster, plus all cells pooled, with a Wilcoxon rank-sum\n\
            test, scores signatures per cell and writes volcano tables labelled\n\
            with the plot thresholds next to a DE table labelled with the export\n\
            thresholds."
    )]
    SingleCell {
        /// Path to the JSON run configuration
        #[arg(short, long)]
        config: String,
    },

    /// Rank genes of a log-expression matrix by overdispersion
    Hvg {
        /// Genes x samples log-expression matrix (CSV or TSV)
        #[arg(short, long)]
        input: String,

        /// Output TSV [default: hvg.tsv]
        #[arg(short, long, default_value = "hvg.tsv")]
        output: String,

        /// Number of top genes flagged [default: 500]
        #[arg(long, default_value = "500")]
        n_top: usize,

        /// Loess span of the mean-variance trend [default: 0.3]
        #[arg(long, default_value = "0.3")]
        span: f64,
    },

    /// Preranked GSEA of an exported DE table
    Gsea {
        /// DE table as written by the pipelines
        #[arg(short, long)]
        de_table: String,

        /// Gene set files (GMT or one gene per line); repeatable
        #[arg(short, long, required = true)]
        gene_sets: Vec<String>,

        /// Output TSV [default: gsea.tsv]
        #[arg(short, long, default_value = "gsea.tsv")]
        output: String,

        /// Minimum set size after intersecting with the ranking [default: 10]
        #[arg(long, default_value = "10")]
        min_size: usize,

        /// Maximum set size [default: 500]
        #[arg(long, default_value = "500")]
        max_size: usize,

        /// Permutations per set size [default: 1000]
        #[arg(long, default_value = "1000")]
        n_perm: usize,

        /// Random seed [default: 42]
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}
