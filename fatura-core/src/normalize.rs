//! Description normalizer: turns a raw statement description into the
//! canonical key used for dictionary lookups.
//!
//! Steps, in order: lowercase, strip accents, NFKC, drop installment
//! suffixes (`- Parcela 2/3`), drop boilerplate phrases, optionally turn
//! every non-letter into a space, collapse whitespace, trim.

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Phrases removed by default. Written in normalized form (no accents).
pub const DEFAULT_BOILERPLATE: &[&str] = &[
    "desconto antecipacao",
    "cobranca",
    "estorno",
    "pagamento recebido",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    /// Replace every non-alphabetic character with a space.
    pub collapse_non_alpha: bool,
    /// Whole-word phrases removed anywhere in the description.
    pub boilerplate: Vec<String>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            collapse_non_alpha: true,
            boilerplate: DEFAULT_BOILERPLATE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    installment: Regex,
    boilerplate: Option<Regex>,
    collapse_non_alpha: bool,
}

impl Normalizer {
    pub fn new(options: &NormalizeOptions) -> Result<Self, regex::Error> {
        let installment = Regex::new(r"(?i)\s*-\s*parcela\s+\d+\s*/\s*\d+")?;

        let phrases: Vec<String> = options
            .boilerplate
            .iter()
            .map(|p| {
                p.split_whitespace()
                    .map(|w| regex::escape(&fold(w)))
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .filter(|p| !p.is_empty())
            .collect();

        let boilerplate = if phrases.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(r"(?i)\b(?:{})\b", phrases.join("|")))?)
        };

        Ok(Self {
            installment,
            boilerplate,
            collapse_non_alpha: options.collapse_non_alpha,
        })
    }

    /// Passes repeat until the output stops changing: a removal can expose a
    /// new boilerplate match ("desconto cobranca antecipacao"). After the first
    /// pass every change shortens the text, so the loop ends.
    pub fn normalize(&self, raw: &str) -> String {
        let mut current = self.pass(raw);
        loop {
            let next = self.pass(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn pass(&self, text: &str) -> String {
        let folded = fold(text);
        let text = self.installment.replace_all(&folded, " ").into_owned();
        let text = match &self.boilerplate {
            Some(re) => re.replace_all(&text, " ").into_owned(),
            None => text,
        };

        let text: String = if self.collapse_non_alpha {
            text.chars()
                .map(|c| if c.is_alphabetic() { c } else { ' ' })
                .collect()
        } else {
            text
        };

        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Lowercase, strip combining marks, then NFKC.
fn fold(text: &str) -> String {
    let lower = text.to_lowercase();
    lower
        .as_str()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .nfkc()
        .collect::<String>()
        .to_lowercase()
}
