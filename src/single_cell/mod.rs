//! Single-cell TCDD vs vehicle analysis: markers and signature scores

mod data;
mod de;
mod score;

pub use data::SingleCellData;
pub use de::{
    find_markers, markers_by_cluster, to_de_records, ClusterOutcome, ClusterResult, MarkerParams,
    MarkerRecord, ALL_CELLS,
};
pub use score::{expression_bins, score_signatures, ScoreParams, SignatureScore};
