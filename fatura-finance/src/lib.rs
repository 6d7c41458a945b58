//! fatura-finance: batch classification of statement files and spending summaries

pub mod batch;
pub mod summary;

pub use batch::{
    BatchInput, BatchOptions, BatchReport, BatchRunner, DEFAULT_CATEGORY_COLUMN, DEFAULT_OUTPUT_SUFFIX,
    FileReport, output_path,
};
pub use summary::{CategoryTotal, FallbackStats, Summary, summarize_file};
