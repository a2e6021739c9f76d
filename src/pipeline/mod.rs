//! End-to-end runs of the bulk and single-cell analyses
//!
//! Each run is a straight sequence of stages. The first error aborts the run;
//! tables already written stay on disk.

pub mod bulk;
pub mod single_cell;

use std::path::{Path, PathBuf};

use crate::de::GeneSet;
use crate::error::Result;
use crate::io::read_gene_sets;

pub use bulk::{BulkReport, CohortReport};
pub use single_cell::SingleCellReport;

/// Create `dir` (and parents) and return it
pub(crate) fn ensure_dir(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    Ok(dir.to_path_buf())
}

/// Load every gene set file, in order
pub(crate) fn load_gene_sets(paths: &[PathBuf]) -> Result<Vec<GeneSet>> {
    let mut sets = Vec::new();
    for path in paths {
        let loaded = read_gene_sets(path)?;
        log::info!("Loaded {} gene sets from {}", loaded.len(), path.display());
        sets.extend(loaded);
    }
    Ok(sets)
}

/// Replace characters that do not belong in file names
pub(crate) fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem_sanitised() {
        assert_eq!(file_stem("S1_airway"), "S1_airway");
        assert_eq!(file_stem("T cells/CD8+"), "T_cells_CD8_");
    }
}
