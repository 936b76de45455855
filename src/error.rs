//! Error types for the loading and aggregation pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while locating, loading, aggregating or exporting data.
///
/// Every variant is fail-fast: nothing is retried and no partial dataset is
/// handed out when one of these is returned.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No file matched the discovery rule for a required school or dataset.
    #[error("{what}: no matching file in {}", dir.display())]
    FileNotFound { what: String, dir: PathBuf },

    /// A matched file exists but its content could not be parsed.
    #[error("failed to parse {}: {reason}", path.display())]
    ParseFailure { path: PathBuf, reason: String },

    /// A column referenced by aggregation or export is absent from a table.
    #[error("table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },

    /// A cell that must be numeric holds something else.
    #[error("table '{table}', column '{column}', row {row}: value '{value}' is not numeric")]
    NonNumeric {
        table: String,
        column: String,
        row: usize,
        value: String,
    },

    /// A school referenced by aggregation is absent from a dataset.
    #[error("school '{school}' is missing from the {dataset} dataset")]
    MissingSchool { school: String, dataset: String },

    /// A dataset was built but contains no entries.
    #[error("{what} is empty")]
    EmptyDataset { what: String },

    /// Two source files resolved to the same school.
    #[error("school '{school}' matched both {} and {}", first.display(), second.display())]
    DuplicateSource {
        school: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// Configuration is structurally valid JSON but semantically wrong.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Workbook writing error
    #[error("XLSX write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Arrow array error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet file error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PipelineError::ParseFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing_column(table: &str, column: &str) -> Self {
        PipelineError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, PipelineError>;
