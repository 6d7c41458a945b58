use chrono::NaiveDate;
use csv::StringRecord;
use serde::{Deserialize, Serialize};

/// Normalized view of one statement row (source-agnostic).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementTransaction {
    /// 1-based line in the source file.
    pub line: u64,
    pub date: Option<NaiveDate>,
    pub description: String,
    /// Sign as exported by the source.
    pub amount: f64,
    /// Category the source already assigned, if it has one.
    pub raw_category: Option<String>,
}

/// A parsed row plus the untouched record, so output can keep every column.
#[derive(Debug, Clone)]
pub struct StatementRow {
    pub record: StringRecord,
    pub transaction: StatementTransaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Statement {
    pub headers: StringRecord,
    pub delimiter: u8,
    pub rows: Vec<StatementRow>,
    pub skipped: Vec<SkippedRow>,
}
