//! Operator reconciliation of descriptions that fell through to the fallback.
//!
//! Each distinct description is shown once. A confirmed category is written
//! to the dictionary and persisted before the next prompt, so an interrupted
//! session never loses earlier decisions.

use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dictionary::{Assignment, CategoryDictionary, DictionaryError, DictionaryStore};
use crate::suggest::{Suggester, Suggestion, SuggestionRequest};

/// Samples kept per pending item for display.
pub const MAX_SAMPLES: usize = 3;

/// One occurrence of a pending description.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub date: Option<NaiveDate>,
    pub amount: f64,
    pub raw_category: Option<String>,
    pub raw_description: String,
}

/// A distinct unresolved normalized description.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingItem {
    pub description: String,
    pub occurrences: usize,
    pub samples: Vec<Sample>,
}

/// Collects unresolved descriptions in first-seen order, once each.
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: Vec<PendingItem>,
    index: HashMap<String, usize>,
}

impl PendingQueue {
    pub fn push(&mut self, description: &str, sample: Sample) {
        match self.index.get(description) {
            Some(&i) => {
                let item = &mut self.items[i];
                item.occurrences += 1;
                if item.samples.len() < MAX_SAMPLES {
                    item.samples.push(sample);
                }
            }
            None => {
                self.index.insert(description.to_string(), self.items.len());
                self.items.push(PendingItem {
                    description: description.to_string(),
                    occurrences: 1,
                    samples: vec![sample],
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[PendingItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<PendingItem> {
        self.items
    }
}

/// What the operator answered for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Confirmed(String),
    Skipped,
    Aborted,
}

pub trait Prompter {
    /// `categories` excludes the fallback.
    fn ask(
        &mut self,
        item: &PendingItem,
        categories: &[String],
        suggestion: Option<&Suggestion>,
    ) -> anyhow::Result<PromptOutcome>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Classified { category: String, created: bool },
    KeptUnclassified,
}

#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub decisions: Vec<(String, Resolution)>,
    pub aborted: bool,
}

impl ReconcileReport {
    pub fn category_for(&self, description: &str) -> Option<&str> {
        self.decisions.iter().find_map(|(d, r)| match r {
            Resolution::Classified { category, .. } if d == description => Some(category.as_str()),
            _ => None,
        })
    }

    pub fn classified_count(&self) -> usize {
        self.decisions
            .iter()
            .filter(|(_, r)| matches!(r, Resolution::Classified { .. }))
            .count()
    }

    pub fn kept_count(&self) -> usize {
        self.decisions.len() - self.classified_count()
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("saving dictionary: {0}")]
    Persist(#[from] DictionaryError),
    #[error("operator prompt failed: {0:#}")]
    Prompt(anyhow::Error),
}

pub struct Reconciler<'a> {
    prompter: &'a mut dyn Prompter,
    store: &'a dyn DictionaryStore,
    suggester: Option<&'a mut dyn Suggester>,
}

impl<'a> Reconciler<'a> {
    pub fn new(prompter: &'a mut dyn Prompter, store: &'a dyn DictionaryStore) -> Self {
        Self {
            prompter,
            store,
            suggester: None,
        }
    }

    pub fn with_suggester(mut self, suggester: &'a mut dyn Suggester) -> Self {
        self.suggester = Some(suggester);
        self
    }

    /// False once the remote classifier has failed during this session.
    pub fn remote_available(&self) -> bool {
        self.suggester.is_some()
    }

    pub fn run(
        &mut self,
        dict: &mut CategoryDictionary,
        items: &[PendingItem],
    ) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::default();

        for item in items {
            if item.description.trim().is_empty() {
                report
                    .decisions
                    .push((item.description.clone(), Resolution::KeptUnclassified));
                continue;
            }

            let categories: Vec<String> = dict
                .categories()
                .filter(|c| !dict.is_fallback(c))
                .map(str::to_string)
                .collect();
            let suggestion = self.suggestion_for(dict, item);

            let outcome = self
                .prompter
                .ask(item, &categories, suggestion.as_ref())
                .map_err(ReconcileError::Prompt)?;

            let resolution = match outcome {
                PromptOutcome::Aborted => {
                    info!(
                        decided = report.decisions.len(),
                        remaining = items.len() - report.decisions.len(),
                        "reconciliation stopped by operator"
                    );
                    report.aborted = true;
                    break;
                }
                PromptOutcome::Skipped => Resolution::KeptUnclassified,
                PromptOutcome::Confirmed(name) => {
                    // New categories are stored lowercased; existing ones keep their spelling.
                    let name = match name.trim() {
                        n if dict.contains_category(n) => n.to_string(),
                        n => n.to_lowercase(),
                    };
                    let name = name.as_str();
                    if name.is_empty() || dict.is_fallback(name) {
                        Resolution::KeptUnclassified
                    } else {
                        let assignment = dict.assign(&item.description, name);
                        if assignment.changed() {
                            self.store.save(dict)?;
                        }
                        info!(description = %item.description, category = name, ?assignment, "classified");
                        Resolution::Classified {
                            category: name.to_string(),
                            created: assignment == Assignment::Created,
                        }
                    }
                }
            };

            debug!(description = %item.description, ?resolution, "decision");
            report.decisions.push((item.description.clone(), resolution));
        }

        Ok(report)
    }

    fn suggestion_for(&mut self, dict: &CategoryDictionary, item: &PendingItem) -> Option<Suggestion> {
        let request = SuggestionRequest::for_item(dict, item);
        let result = self.suggester.as_mut()?.suggest(&request);
        match result {
            Ok(raw) => {
                debug!(description = %item.description, answer = %raw.trim(), "remote suggestion");
                Suggestion::parse(&raw, dict)
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "remote classifier failed, continuing without suggestions");
                self.suggester = None;
                None
            }
        }
    }
}
