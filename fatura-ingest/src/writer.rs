//! Classified output: original columns plus a category column.
//!
//! If the header already has a column with the output name (re-running on a
//! classified file), that column is overwritten instead of duplicated.

use csv::StringRecord;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::adapter::header_index;
use crate::error::IngestError;

#[derive(Debug, Clone, Copy)]
enum Slot {
    Append { width: usize },
    Replace(usize),
}

impl Slot {
    fn fill(self, record: &StringRecord, category: &str) -> StringRecord {
        let mut fields: Vec<&str> = record.iter().collect();
        match self {
            Slot::Append { width } => {
                while fields.len() < width {
                    fields.push("");
                }
                fields.push(category);
            }
            Slot::Replace(i) => {
                while fields.len() <= i {
                    fields.push("");
                }
                fields[i] = category;
            }
        }
        StringRecord::from(fields)
    }
}

pub fn write_classified<'a, W, I>(
    out: W,
    headers: &StringRecord,
    rows: I,
    delimiter: u8,
    column: &str,
) -> Result<(), IngestError>
where
    W: Write,
    I: IntoIterator<Item = (&'a StringRecord, &'a str)>,
{
    let slot = match header_index(headers, column) {
        Some(i) => Slot::Replace(i),
        None => Slot::Append {
            width: headers.len(),
        },
    };

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(out);

    match slot {
        Slot::Replace(_) => wtr.write_record(headers)?,
        Slot::Append { .. } => wtr.write_record(&slot.fill(headers, column))?,
    }
    for (record, category) in rows {
        wtr.write_record(&slot.fill(record, category))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_classified_file<'a, I>(
    path: impl AsRef<Path>,
    headers: &StringRecord,
    rows: I,
    delimiter: u8,
    column: &str,
) -> Result<(), IngestError>
where
    I: IntoIterator<Item = (&'a StringRecord, &'a str)>,
{
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    write_classified(file, headers, rows, delimiter, column)
}
