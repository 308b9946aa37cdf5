use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of the embedding function bound to a collection.
///
/// Two providers are interchangeable for a collection only if both the model
/// and the vector dimension match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EmbeddingSignature {
    pub model: String,
    pub dimension: usize,
}

impl EmbeddingSignature {
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            model: model.into(),
            dimension,
        }
    }
}

impl std::fmt::Display for EmbeddingSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}d", self.model, self.dimension)
    }
}

/// What the caller asks for when opening a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSpec {
    pub name: String,
    pub description: String,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Collection names become part of a table name, so only
    /// `[A-Za-z][A-Za-z0-9_]*` up to 64 characters is accepted.
    pub fn is_valid_name(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() => {}
            _ => return false,
        }
        name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
}

pub fn vector_table_name(collection: &str) -> String {
    format!("vec_{collection}")
}

/// A collection as persisted in the `collections` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionInfo {
    pub name: String,
    pub signature: EmbeddingSignature,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionStats {
    pub name: String,
    pub model: String,
    pub dimension: usize,
    pub description: String,
    pub record_count: usize,
    pub created_at: DateTime<Utc>,
}
