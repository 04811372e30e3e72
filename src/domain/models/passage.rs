use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a passage; the payload stored alongside each indexed vector.
pub type PassageId = String;

/// A unit of retrievable text produced from the source corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    id: PassageId,
    text: String,
}

impl Passage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
        }
    }

    pub fn with_id(id: impl Into<PassageId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_parts(self) -> (PassageId, String) {
        (self.id, self.text)
    }
}
