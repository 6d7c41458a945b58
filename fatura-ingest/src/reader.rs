//! Statement reader.
//!
//! Exports often carry preamble rows (AMEX has six blank lines and account
//! info before the header), so the header is the first record containing the
//! profile's description column. Everything before it is ignored.

use csv::StringRecord;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::adapter::{ColumnAdapter, SourceAdapter, header_index};
use crate::error::IngestError;
use crate::profile::SourceProfile;
use crate::types::{SkippedRow, Statement, StatementRow};

pub fn read_statement(path: impl AsRef<Path>, profile: &SourceProfile) -> Result<Statement, IngestError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_statement(file, profile)
}

pub fn parse_statement<R: Read>(input: R, profile: &SourceProfile) -> Result<Statement, IngestError> {
    let delimiter = profile.delimiter_byte()?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(false)
        .from_reader(input);

    let mut headers: Option<StringRecord> = None;
    let mut adapter: Option<ColumnAdapter> = None;
    let mut rows = Vec::new();
    let mut skipped = Vec::new();

    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            // Latin-1 exports: the reader recovers after a bad record.
            Err(e) if matches!(e.kind(), csv::ErrorKind::Utf8 { .. }) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                if adapter.is_some() {
                    warn!(line, reason = %e, "skipping row that is not valid UTF-8");
                    skipped.push(SkippedRow {
                        line,
                        reason: e.to_string(),
                    });
                } else {
                    debug!(line, "skipping undecodable preamble row");
                }
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        if let Some(adapter) = adapter.as_ref() {
            match adapter.transaction(line, &record) {
                Ok(transaction) => rows.push(StatementRow { record, transaction }),
                Err(e) => {
                    warn!(line, reason = %e, "skipping malformed row");
                    skipped.push(SkippedRow {
                        line,
                        reason: e.to_string(),
                    });
                }
            }
            continue;
        }

        if header_index(&record, &profile.description_column).is_some() {
            adapter = Some(ColumnAdapter::bind(profile, &record)?);
            headers = Some(record);
        } else {
            debug!(line, "skipping preamble row");
        }
    }

    let headers = headers.ok_or_else(|| IngestError::HeaderNotFound {
        column: profile.description_column.clone(),
    })?;

    debug!(source = %profile.name, rows = rows.len(), skipped = skipped.len(), "statement parsed");

    Ok(Statement {
        headers,
        delimiter,
        rows,
        skipped,
    })
}
