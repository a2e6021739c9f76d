//! Error types for ahr_rnaseq

use thiserror::Error;

/// Main error type for the analysis pipelines
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Alignment mismatch in {what}: {detail}")]
    AlignmentMismatch { what: String, detail: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Invalid count matrix: {reason}")]
    InvalidCountMatrix { reason: String },

    #[error("Invalid sample table: {reason}")]
    InvalidSampleTable { reason: String },

    #[error("Invalid design matrix: {reason}")]
    InvalidDesign { reason: String },

    #[error("Invalid contrast specification: {reason}")]
    InvalidContrast { reason: String },

    #[error("Trend fitting failed: {reason}")]
    TrendFitting { reason: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;
