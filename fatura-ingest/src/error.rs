use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("opening {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no header row containing column '{column}'")]
    HeaderNotFound { column: String },
    #[error("column '{column}' missing from header")]
    MissingColumn { column: String },
    #[error("invalid delimiter {0:?}: must be a single ASCII character")]
    Delimiter(char),
}

/// Why a single row was skipped. Never aborts the file.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("column '{column}' (position {index}) missing, row has {found} fields")]
    MissingField {
        column: String,
        index: usize,
        found: usize,
    },
    #[error("empty description")]
    EmptyDescription,
    #[error("invalid amount '{0}'")]
    InvalidAmount(String),
    #[error("invalid date '{value}' (expected {format})")]
    InvalidDate { value: String, format: String },
}
