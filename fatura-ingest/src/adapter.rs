//! Row adapters: read description/amount/category/date out of a CSV record
//! for one source format, so callers never index records by position.

use chrono::NaiveDate;
use csv::StringRecord;

use crate::error::{IngestError, RowError};
use crate::profile::SourceProfile;
use crate::types::StatementTransaction;

pub trait SourceAdapter {
    fn profile(&self) -> &SourceProfile;

    fn description<'r>(&self, record: &'r StringRecord) -> Result<&'r str, RowError>;

    fn amount(&self, record: &StringRecord) -> Result<f64, RowError>;

    fn raw_category<'r>(&self, record: &'r StringRecord) -> Option<&'r str>;

    fn date(&self, record: &StringRecord) -> Result<Option<NaiveDate>, RowError>;

    fn transaction(&self, line: u64, record: &StringRecord) -> Result<StatementTransaction, RowError> {
        let description = self.description(record)?.trim();
        if description.is_empty() {
            return Err(RowError::EmptyDescription);
        }
        Ok(StatementTransaction {
            line,
            date: self.date(record)?,
            description: description.to_string(),
            amount: self.amount(record)?,
            raw_category: self
                .raw_category(record)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        })
    }
}

/// Column positions resolved from a header row by name.
#[derive(Debug, Clone)]
pub struct ColumnAdapter {
    profile: SourceProfile,
    description: usize,
    amount: usize,
    date: Option<usize>,
    category: Option<usize>,
}

impl ColumnAdapter {
    pub fn bind(profile: &SourceProfile, headers: &StringRecord) -> Result<Self, IngestError> {
        let required = |column: &str| {
            header_index(headers, column).ok_or_else(|| IngestError::MissingColumn {
                column: column.to_string(),
            })
        };

        let description = required(&profile.description_column)?;
        let amount = required(&profile.amount_column)?;
        let date = profile.date_column.as_deref().map(required).transpose()?;
        let category = profile.category_column.as_deref().map(required).transpose()?;

        Ok(Self {
            profile: profile.clone(),
            description,
            amount,
            date,
            category,
        })
    }

    fn field<'r>(&self, record: &'r StringRecord, column: &str, index: usize) -> Result<&'r str, RowError> {
        record.get(index).ok_or_else(|| RowError::MissingField {
            column: column.to_string(),
            index,
            found: record.len(),
        })
    }
}

impl SourceAdapter for ColumnAdapter {
    fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    fn description<'r>(&self, record: &'r StringRecord) -> Result<&'r str, RowError> {
        self.field(record, &self.profile.description_column, self.description)
    }

    fn amount(&self, record: &StringRecord) -> Result<f64, RowError> {
        let raw = self.field(record, &self.profile.amount_column, self.amount)?;
        parse_amount(raw, self.profile.decimal_comma)
    }

    fn raw_category<'r>(&self, record: &'r StringRecord) -> Option<&'r str> {
        self.category.and_then(|i| record.get(i))
    }

    fn date(&self, record: &StringRecord) -> Result<Option<NaiveDate>, RowError> {
        let (Some(index), Some(column)) = (self.date, self.profile.date_column.as_deref()) else {
            return Ok(None);
        };
        let raw = self.field(record, column, index)?.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        NaiveDate::parse_from_str(raw, &self.profile.date_format)
            .map(Some)
            .map_err(|_| RowError::InvalidDate {
                value: raw.to_string(),
                format: self.profile.date_format.clone(),
            })
    }
}

/// Position of `column` in a header row, ignoring case, padding and a BOM.
pub(crate) fn header_index(headers: &StringRecord, column: &str) -> Option<usize> {
    let wanted = column.trim().to_lowercase();
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase() == wanted)
}

/// Parse a statement amount.
///
/// Accepts currency symbols (`R$`, `$`), inner spaces and `(x)` for negatives.
/// With `decimal_comma`, `1.234,56` reads as 1234.56; otherwise commas are
/// thousands separators.
pub fn parse_amount(raw: &str, decimal_comma: bool) -> Result<f64, RowError> {
    let invalid = || RowError::InvalidAmount(raw.to_string());

    let s = raw.trim();
    let (negative, s) = match s.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };

    let mut s: String = s
        .replace("R$", "")
        .chars()
        .filter(|c| *c != '$' && !c.is_whitespace())
        .collect();
    if decimal_comma {
        s = s.replace('.', "").replace(',', ".");
    } else {
        s = s.replace(',', "");
    }

    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+')) {
        return Err(invalid());
    }

    let value: f64 = s.parse().map_err(|_| invalid())?;
    Ok(if negative { -value } else { value })
}
