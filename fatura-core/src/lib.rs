//! fatura-core: category dictionary, description normalization, classification
//! and operator reconciliation.

pub mod classifier;
pub mod dictionary;
pub mod normalize;
pub mod reconcile;
pub mod suggest;

pub use classifier::{Classifier, ClassifierError, MatchPolicy};
pub use dictionary::{
    Assignment, CategoryDictionary, CategoryEntry, DictionaryError, DictionaryStore, JsonFileStore,
    DEFAULT_FALLBACK,
};
pub use normalize::{NormalizeOptions, Normalizer, DEFAULT_BOILERPLATE};
pub use reconcile::{
    PendingItem, PendingQueue, PromptOutcome, Prompter, ReconcileError, ReconcileReport,
    Reconciler, Resolution, Sample,
};
pub use suggest::{Suggester, Suggestion, SuggestionRequest};
