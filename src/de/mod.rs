//! Result records shared by the bulk and single-cell pipelines

pub mod record;
pub mod volcano;

pub use record::{DeCall, DeRecord, DeSummary, Direction, EnrichmentRecord, GeneSet};
pub use volcano::{call_for, label_volcano, relabel, Thresholds, VolcanoPoint};
