//! fatura-ingest: statement CSV profiles, per-source row adapters, reader and
//! classified-output writer.

pub mod adapter;
pub mod error;
pub mod profile;
pub mod reader;
pub mod types;
pub mod writer;

pub use adapter::{ColumnAdapter, SourceAdapter, parse_amount};
pub use error::{IngestError, RowError};
pub use profile::SourceProfile;
pub use reader::{parse_statement, read_statement};
pub use types::{SkippedRow, Statement, StatementRow, StatementTransaction};
pub use writer::{write_classified, write_classified_file};
