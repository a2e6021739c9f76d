//! Delimited text readers and the generic TSV writers
//!
//! Tab- and comma-delimited inputs are both accepted; the delimiter is taken
//! from the first line. Outputs are always tab-delimited.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::{Array2, ArrayView2};
use serde::Serialize;

use crate::data::CountMatrix;
use crate::de::{DeRecord, GeneSet};
use crate::error::{AnalysisError, Result};

fn detect_delimiter(path: &Path) -> Result<u8> {
    let mut first = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first)?;
    Ok(if first.contains('\t') { b'\t' } else { b',' })
}

/// Reader with a header row and the delimiter of the file
pub(crate) fn reader_for(path: &Path) -> Result<csv::Reader<File>> {
    let delimiter = detect_delimiter(path)?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_path(path)?)
}

pub(crate) fn tsv_writer(path: &Path) -> Result<csv::Writer<File>> {
    Ok(csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?)
}

/// A labelled numeric matrix: first column row ids, header column ids
#[derive(Debug, Clone)]
pub struct LabelledMatrix {
    pub row_ids: Vec<String>,
    pub col_ids: Vec<String>,
    pub values: Array2<f64>,
}

/// Read a numeric matrix with row identifiers in the first column
pub fn read_matrix<P: AsRef<Path>>(path: P) -> Result<LabelledMatrix> {
    let path = path.as_ref();
    let mut reader = reader_for(path)?;
    let header = reader.headers()?.clone();
    if header.len() < 2 {
        return Err(AnalysisError::InvalidInput {
            reason: format!("{}: not enough columns in header", path.display()),
        });
    }
    let col_ids: Vec<String> = header.iter().skip(1).map(|s| s.to_string()).collect();

    let mut row_ids = Vec::new();
    let mut data = Vec::new();
    for record in reader.records() {
        let record = record?;
        row_ids.push(record.get(0).unwrap_or_default().to_string());
        for field in record.iter().skip(1) {
            let value = if field.is_empty() || field == "NA" {
                f64::NAN
            } else {
                field.parse::<f64>().map_err(|_| AnalysisError::InvalidInput {
                    reason: format!("{}: invalid numeric value '{}'", path.display(), field),
                })?
            };
            data.push(value);
        }
    }

    if row_ids.is_empty() {
        return Err(AnalysisError::EmptyData {
            reason: format!("{}: no data rows", path.display()),
        });
    }

    let values = Array2::from_shape_vec((row_ids.len(), col_ids.len()), data).map_err(|e| {
        AnalysisError::InvalidInput {
            reason: format!("{}: {}", path.display(), e),
        }
    })?;
    log::debug!(
        "Read {} x {} matrix from {}",
        row_ids.len(),
        col_ids.len(),
        path.display()
    );
    Ok(LabelledMatrix {
        row_ids,
        col_ids,
        values,
    })
}

/// Read a genes x samples count matrix
pub fn read_count_matrix<P: AsRef<Path>>(path: P) -> Result<CountMatrix> {
    let m = read_matrix(path)?;
    CountMatrix::new(m.values, m.row_ids, m.col_ids)
}

/// Read gene sets in GMT format: name, description, then members
pub fn read_gmt<P: AsRef<Path>>(path: P) -> Result<Vec<GeneSet>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut sets = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let fields: Vec<&str> = line.split('\t').map(|f| f.trim()).collect();
        if fields.len() < 2 || fields[0].is_empty() {
            continue;
        }
        let genes = fields[2..].iter().map(|g| g.to_string()).collect();
        sets.push(GeneSet::new(fields[0], genes));
    }
    log::debug!("Read {} gene sets from {}", sets.len(), path.as_ref().display());
    Ok(sets)
}

/// Read one gene symbol per line; blank lines and `#` comments are skipped
pub fn read_gene_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut genes = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let gene = line.trim();
        if gene.is_empty() || gene.starts_with('#') {
            continue;
        }
        genes.push(gene.to_string());
    }
    Ok(genes)
}

/// Read gene sets from a `.gmt` file or a one-column list named by its file stem
pub fn read_gene_sets<P: AsRef<Path>>(path: P) -> Result<Vec<GeneSet>> {
    let path = path.as_ref();
    let is_gmt = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("gmt"))
        .unwrap_or(false);
    if is_gmt {
        return read_gmt(path);
    }
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "gene_set".to_string());
    Ok(vec![GeneSet::new(name, read_gene_list(path)?)])
}

/// Read a DE table previously written by [`super::write_de_table`]
pub fn read_de_table<P: AsRef<Path>>(path: P) -> Result<Vec<DeRecord>> {
    let mut reader = reader_for(path.as_ref())?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// Write serialisable rows as a TSV with a header
pub fn write_records<P: AsRef<Path>, T: Serialize>(path: P, rows: &[T]) -> Result<()> {
    let mut writer = tsv_writer(path.as_ref())?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a labelled matrix; `corner` names the row-id column
pub fn write_matrix<P: AsRef<Path>>(
    path: P,
    corner: &str,
    row_ids: &[String],
    col_ids: &[String],
    values: ArrayView2<f64>,
) -> Result<()> {
    if values.dim() != (row_ids.len(), col_ids.len()) {
        return Err(AnalysisError::DimensionMismatch {
            expected: format!("{} x {}", row_ids.len(), col_ids.len()),
            got: format!("{} x {}", values.nrows(), values.ncols()),
        });
    }
    let mut writer = tsv_writer(path.as_ref())?;
    let mut header = vec![corner.to_string()];
    header.extend(col_ids.iter().cloned());
    writer.write_record(&header)?;
    for (id, row) in row_ids.iter().zip(values.rows()) {
        let mut fields = Vec::with_capacity(row.len() + 1);
        fields.push(id.clone());
        fields.extend(row.iter().map(|v| format!("{:.6}", v)));
        writer.write_record(&fields)?;
    }
    writer.flush()?;
    Ok(())
}
