//! Gene set enrichment of ranked DE results

mod gsea;

pub use gsea::{enrichment_score, gsea, GseaParams, RankedList};
