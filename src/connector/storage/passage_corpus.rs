use std::collections::HashMap;
use std::fs;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::atomic_file::write_atomic;
use crate::application::PassageLookup;
use crate::domain::{DomainError, Passage, PassageId};

pub const CORPUS_FILE: &str = "passages.json";

/// Full passage text keyed by passage id. Kept apart from the vector store
/// so the index artifacts stay small.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PassageCorpus {
    passages: HashMap<PassageId, String>,
}

impl PassageCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<PassageId>, text: impl Into<String>) -> Option<String> {
        self.passages.insert(id.into(), text.into())
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.passages.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.passages.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.passages.keys().map(String::as_str)
    }

    pub fn persist(&self, path: &Path) -> Result<(), DomainError> {
        let bytes = serde_json::to_vec(&self)
            .map_err(|e| DomainError::storage(format!("Failed to encode passages: {}", e)))?;
        write_atomic(path, &bytes)?;
        info!("Persisted {} passages to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, DomainError> {
        let file = fs::File::open(path)
            .map_err(|e| DomainError::corrupt(format!("Cannot open {}: {}", path.display(), e)))?;
        let corpus: Self = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            DomainError::corrupt(format!("Cannot decode {}: {}", path.display(), e))
        })?;
        info!("Loaded {} passages from {}", corpus.len(), path.display());
        Ok(corpus)
    }
}

impl FromIterator<Passage> for PassageCorpus {
    fn from_iter<I: IntoIterator<Item = Passage>>(iter: I) -> Self {
        let mut corpus = Self::new();
        for passage in iter {
            let (id, text) = passage.into_parts();
            corpus.insert(id, text);
        }
        corpus
    }
}

impl PassageLookup for PassageCorpus {
    fn passage(&self, id: &str) -> Option<&str> {
        self.get(id)
    }

    fn len(&self) -> usize {
        self.passages.len()
    }
}
