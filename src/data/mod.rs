//! Sample, gene and count data, and the cohort value built from them

mod cohort;
mod count_matrix;
mod gene;
mod sample;

pub use cohort::{build_cohorts, resolve_duplicate_symbols, Cohort, CohortParams};
pub use count_matrix::{check_alignment, required_samples, CountMatrix};
pub use gene::{GeneAnnotation, GeneRecord};
pub use sample::{QcMetrics, SampleRecord, SampleTable};
