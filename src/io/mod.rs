//! Input/output for sample tables, matrices, gene sets and result tables

mod csv;
mod results;
mod table;

pub use self::csv::{
    read_count_matrix, read_de_table, read_gene_list, read_gene_sets, read_gmt, read_matrix,
    write_matrix, write_records, LabelledMatrix,
};
pub use results::{write_de_table, write_enrichment_table, write_volcano_table};
pub use table::Table;
