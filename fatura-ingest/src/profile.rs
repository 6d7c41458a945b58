//! Statement source profiles: which columns hold what, per bank/card export.
//!
//! Built-ins cover the exports this tool has been used with; anything else
//! is declared in config under `[[sources]]`.

use serde::{Deserialize, Serialize};

use crate::error::IngestError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProfile {
    pub name: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    pub description_column: String,
    pub amount_column: String,
    #[serde(default)]
    pub date_column: Option<String>,
    /// Category already assigned by the source (AMEX "Category", etc).
    #[serde(default)]
    pub category_column: Option<String>,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Amounts written as `1.234,56`.
    #[serde(default)]
    pub decimal_comma: bool,
}

fn default_delimiter() -> char {
    ','
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

impl SourceProfile {
    pub fn new(
        name: impl Into<String>,
        description_column: impl Into<String>,
        amount_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            delimiter: default_delimiter(),
            description_column: description_column.into(),
            amount_column: amount_column.into(),
            date_column: None,
            category_column: None,
            date_format: default_date_format(),
            decimal_comma: false,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_date(mut self, column: impl Into<String>, format: impl Into<String>) -> Self {
        self.date_column = Some(column.into());
        self.date_format = format.into();
        self
    }

    pub fn with_category(mut self, column: impl Into<String>) -> Self {
        self.category_column = Some(column.into());
        self
    }

    pub fn with_decimal_comma(mut self, decimal_comma: bool) -> Self {
        self.decimal_comma = decimal_comma;
        self
    }

    /// Nubank credit card export: `date,title,amount`.
    pub fn nubank() -> Self {
        Self::new("nubank", "title", "amount").with_date("date", "%Y-%m-%d")
    }

    /// Nubank checking account export: `Data,Valor,Identificador,Descrição`.
    pub fn nubank_conta() -> Self {
        Self::new("nubank-conta", "Descrição", "Valor").with_date("Data", "%d/%m/%Y")
    }

    /// AMEX activity export (leading preamble rows, then the header).
    pub fn amex() -> Self {
        Self::new("amex", "Description", "Amount")
            .with_date("Date", "%m/%d/%Y")
            .with_category("Category")
    }

    pub fn builtins() -> Vec<SourceProfile> {
        vec![Self::nubank(), Self::nubank_conta(), Self::amex()]
    }

    pub fn builtin(name: &str) -> Option<SourceProfile> {
        Self::builtins()
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn delimiter_byte(&self) -> Result<u8, IngestError> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(IngestError::Delimiter(self.delimiter))
        }
    }
}
