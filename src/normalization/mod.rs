//! Library-size normalisation for bulk RNA-seq counts

mod counts;
mod tmm;

pub use counts::{cpm, log_cpm};
pub use tmm::{tmm_factors, TmmParams};
