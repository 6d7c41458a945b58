//! Dictionary lookup: normalized description -> category label.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::dictionary::CategoryDictionary;

/// How known descriptions are compared with the normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Whole-string equality.
    #[default]
    Exact,
    /// Known description is a case-insensitive, word-terminated prefix.
    Prefix,
}

impl std::str::FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(MatchPolicy::Exact),
            "prefix" | "regex" => Ok(MatchPolicy::Prefix),
            other => Err(format!("Unknown match policy: '{other}' (expected exact or prefix)")),
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPolicy::Exact => f.write_str("exact"),
            MatchPolicy::Prefix => f.write_str("prefix"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("invalid pattern '{pattern}' in category '{category}': {source}")]
    Pattern {
        category: String,
        pattern: String,
        source: regex::Error,
    },
}

enum Matcher {
    Exact(HashSet<String>),
    Prefix(Vec<Regex>),
}

struct CompiledCategory {
    name: String,
    matcher: Matcher,
}

/// Snapshot of a dictionary compiled for one policy.
///
/// Rebuild it after the dictionary changes; it does not track mutations.
pub struct Classifier {
    fallback: String,
    categories: Vec<CompiledCategory>,
}

impl Classifier {
    pub fn new(dict: &CategoryDictionary, policy: MatchPolicy) -> Result<Self, ClassifierError> {
        let mut categories = Vec::with_capacity(dict.len());

        for entry in dict.entries() {
            let matcher = match policy {
                MatchPolicy::Exact => Matcher::Exact(entry.descriptions.iter().cloned().collect()),
                MatchPolicy::Prefix => {
                    let mut patterns = Vec::with_capacity(entry.descriptions.len());
                    for known in entry.descriptions.iter().filter(|d| !d.trim().is_empty()) {
                        patterns.push(prefix_pattern(known).map_err(|source| {
                            ClassifierError::Pattern {
                                category: entry.name.clone(),
                                pattern: known.clone(),
                                source,
                            }
                        })?);
                    }
                    Matcher::Prefix(patterns)
                }
            };
            categories.push(CompiledCategory {
                name: entry.name.clone(),
                matcher,
            });
        }

        Ok(Self {
            fallback: dict.fallback().to_string(),
            categories,
        })
    }

    pub fn is_fallback(&self, label: &str) -> bool {
        label == self.fallback
    }

    /// First category (dictionary order) that matches, else the fallback.
    pub fn classify(&self, normalized: &str) -> &str {
        if normalized.trim().is_empty() {
            return &self.fallback;
        }
        self.categories
            .iter()
            .find(|c| match &c.matcher {
                Matcher::Exact(set) => set.contains(normalized),
                Matcher::Prefix(patterns) => patterns.iter().any(|re| re.is_match(normalized)),
            })
            .map(|c| c.name.as_str())
            .unwrap_or(self.fallback.as_str())
    }
}

/// `^<known>` followed by a word boundary or the end of the text.
fn prefix_pattern(known: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?i)^{}(?:\b|$)", regex::escape(known.trim())))
}
