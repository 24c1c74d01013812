//! Kinds of entity that appear in the search index.
//!
//! Topics are not stored anywhere on their own; a topic entry is keyed by
//! the id of the document that contains it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchEntityType {
    Document,
    Topic,
    Person,
    GoverningBody,
}

impl SearchEntityType {
    pub const ALL: [SearchEntityType; 4] = [
        SearchEntityType::Document,
        SearchEntityType::Topic,
        SearchEntityType::Person,
        SearchEntityType::GoverningBody,
    ];

    /// String label for SQL storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchEntityType::Document => "document",
            SearchEntityType::Topic => "topic",
            SearchEntityType::Person => "person",
            SearchEntityType::GoverningBody => "governing_body",
        }
    }

    /// Strict parse; unknown labels are `None` so filters can drop them.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "document" => Some(SearchEntityType::Document),
            "topic" => Some(SearchEntityType::Topic),
            "person" => Some(SearchEntityType::Person),
            "governing_body" => Some(SearchEntityType::GoverningBody),
            _ => None,
        }
    }
}
