//! Category dictionary: category name -> known descriptions, kept in file order.
//!
//! Persisted as a plain JSON object (`categorias.json`). Order matters because
//! classification is first-match-wins, so (de)serialization walks the map in
//! document order instead of going through a `HashMap`.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Label used when nothing else matches.
pub const DEFAULT_FALLBACK: &str = "outros";

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("serializing dictionary: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryEntry {
    pub name: String,
    pub descriptions: Vec<String>,
}

/// What [`CategoryDictionary::assign`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// A new category was created holding the description.
    Created,
    /// An existing category gained the description (or it left the fallback list).
    Updated,
    /// Nothing changed.
    Unchanged,
}

impl Assignment {
    pub fn changed(self) -> bool {
        !matches!(self, Assignment::Unchanged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDictionary {
    entries: Vec<CategoryEntry>,
    fallback: String,
}

impl CategoryDictionary {
    /// Empty dictionary holding only the fallback category.
    pub fn new(fallback: impl Into<String>) -> Self {
        Self::from_entries(Vec::new(), fallback)
    }

    /// Build from ordered entries; the fallback category is appended if absent.
    pub fn from_entries(entries: Vec<CategoryEntry>, fallback: impl Into<String>) -> Self {
        let fallback = fallback.into();
        let mut dict = Self { entries, fallback };
        if dict.position(&dict.fallback.clone()).is_none() {
            dict.entries.push(CategoryEntry {
                name: dict.fallback.clone(),
                descriptions: Vec::new(),
            });
        }
        dict
    }

    pub fn from_json(json: &str, fallback: impl Into<String>) -> Result<Self, serde_json::Error> {
        let OrderedEntries(entries) = serde_json::from_str(json)?;
        Ok(Self::from_entries(entries, fallback))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&OrderedEntriesRef(&self.entries))
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn is_fallback(&self, category: &str) -> bool {
        category == self.fallback
    }

    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    /// Category names in dictionary order, fallback included.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn contains_category(&self, category: &str) -> bool {
        self.position(category).is_some()
    }

    pub fn descriptions(&self, category: &str) -> Option<&[String]> {
        self.position(category)
            .map(|i| self.entries[i].descriptions.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Files `description` under `category`, creating the category if needed.
    ///
    /// When the target is not the fallback, the description is also dropped
    /// from the fallback list so it stops shadowing the new decision.
    pub fn assign(&mut self, description: &str, category: &str) -> Assignment {
        let mut changed = false;

        if !self.is_fallback(category) {
            if let Some(i) = self.position(&self.fallback.clone()) {
                let before = self.entries[i].descriptions.len();
                self.entries[i].descriptions.retain(|d| d != description);
                changed = self.entries[i].descriptions.len() != before;
            }
        }

        match self.position(category) {
            Some(i) => {
                let list = &mut self.entries[i].descriptions;
                if !list.iter().any(|d| d == description) {
                    list.push(description.to_string());
                    changed = true;
                }
                if changed {
                    Assignment::Updated
                } else {
                    Assignment::Unchanged
                }
            }
            None => {
                self.entries.push(CategoryEntry {
                    name: category.to_string(),
                    descriptions: vec![description.to_string()],
                });
                Assignment::Created
            }
        }
    }

    fn position(&self, category: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == category)
    }
}

struct OrderedEntries(Vec<CategoryEntry>);

struct OrderedEntriesRef<'a>(&'a [CategoryEntry]);

impl Serialize for OrderedEntriesRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in self.0 {
            map.serialize_entry(&entry.name, &entry.descriptions)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OrderedEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = OrderedEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping category names to lists of descriptions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries: Vec<CategoryEntry> = Vec::new();
                while let Some((name, descriptions)) = map.next_entry::<String, Vec<String>>()? {
                    if entries.iter().any(|e| e.name == name) {
                        return Err(de::Error::custom(format!("duplicate category '{name}'")));
                    }
                    entries.push(CategoryEntry { name, descriptions });
                }
                Ok(OrderedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// The single persistence boundary for dictionary mutations.
pub trait DictionaryStore {
    fn save(&self, dict: &CategoryDictionary) -> Result<(), DictionaryError>;
}

/// Dictionary stored as a JSON file, rewritten wholesale on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self, fallback: &str) -> Result<CategoryDictionary, DictionaryError> {
        let s = fs::read_to_string(&self.path).map_err(|source| DictionaryError::Read {
            path: self.path.clone(),
            source,
        })?;
        CategoryDictionary::from_json(&s, fallback).map_err(|source| DictionaryError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Like [`load`](Self::load), but a missing file yields an empty dictionary.
    pub fn load_or_empty(&self, fallback: &str) -> Result<CategoryDictionary, DictionaryError> {
        if !self.exists() {
            tracing::info!(path = %self.path.display(), "dictionary not found, starting empty");
            return Ok(CategoryDictionary::new(fallback));
        }
        self.load(fallback)
    }
}

impl DictionaryStore for JsonFileStore {
    fn save(&self, dict: &CategoryDictionary) -> Result<(), DictionaryError> {
        let json = dict.to_json()?;
        let write_err = |source| DictionaryError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        // Write next to the target and rename so an interrupted save never
        // leaves a truncated dictionary behind.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;

        tracing::debug!(path = %self.path.display(), categories = dict.len(), "dictionary saved");
        Ok(())
    }
}
