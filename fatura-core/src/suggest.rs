//! Remote classification seam.
//!
//! A [`Suggester`] turns an unresolved description into free text naming a
//! category. The text is untrusted: [`Suggestion::parse`] cleans it up and
//! marks whether it names a category that already exists. Nothing here
//! writes to the dictionary; the operator decides.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::dictionary::CategoryDictionary;
use crate::reconcile::PendingItem;

static CATEGORY_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<categoria(?:_saida|_entrada)?>(.*?)</categoria(?:_saida|_entrada)?>")
        .expect("category tag pattern")
});

pub trait Suggester {
    /// Returns the raw model answer for one transaction.
    fn suggest(&mut self, request: &SuggestionRequest) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionRequest {
    pub categories: Vec<String>,
    pub description: String,
    pub raw_category: Option<String>,
    pub amount: f64,
}

impl SuggestionRequest {
    /// Context for one pending item: every non-fallback category plus the
    /// first sample's amount and source label.
    pub fn for_item(dict: &CategoryDictionary, item: &PendingItem) -> Self {
        let first = item.samples.first();
        Self {
            categories: dict
                .categories()
                .filter(|c| !dict.is_fallback(c))
                .map(str::to_string)
                .collect(),
            description: item.description.clone(),
            raw_category: item
                .samples
                .iter()
                .find_map(|s| s.raw_category.clone())
                .filter(|c| !c.trim().is_empty()),
            amount: first.map(|s| s.amount).unwrap_or(0.0),
        }
    }

    pub fn system_prompt(&self) -> String {
        format!(
            "You classify credit card and bank statement transactions for a personal budget.\n\
             Known categories: {}.\n\
             Descriptions are usually Brazilian Portuguese merchant names, lowercased and without accents.\n\
             Answer with the exact name of the single best-fitting category and nothing else.\n\
             If none fits, answer with a short new category name in lowercase Portuguese.",
            self.categories.join(", ")
        )
    }

    pub fn user_message(&self) -> String {
        let mut msg = format!("description: {}\namount: {:.2}", self.description, self.amount);
        if let Some(label) = &self.raw_category {
            msg.push_str(&format!("\nsource category: {label}"));
        }
        msg
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub category: String,
    /// True when `category` already exists in the dictionary.
    pub known: bool,
}

impl Suggestion {
    /// Extracts a category name from a model answer.
    ///
    /// Accepts a bare name, a quoted name, or `<categoria>name</categoria>`.
    /// Existing categories are matched case-insensitively and returned with
    /// their dictionary spelling. Empty answers yield `None`.
    pub fn parse(raw: &str, dict: &CategoryDictionary) -> Option<Self> {
        let candidate = match CATEGORY_TAG.captures(raw) {
            Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or_default().to_string(),
            None => raw
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or_default()
                .to_string(),
        };

        let cleaned = candidate
            .trim()
            .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '.' | ':' | ';' | ','))
            .trim()
            .to_lowercase();
        if cleaned.is_empty() {
            return None;
        }

        match dict.categories().find(|c| c.to_lowercase() == cleaned) {
            Some(existing) => Some(Self {
                category: existing.to_string(),
                known: true,
            }),
            None => Some(Self {
                category: cleaned,
                known: false,
            }),
        }
    }
}
