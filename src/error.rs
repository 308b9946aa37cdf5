use thiserror::Error;

use crate::config::ConfigError;
use crate::database::DatabaseError;
use crate::models::EmbeddingSignature;
use crate::services::embedding_service::EmbeddingError;

/// Failures of the similarity index. "No results" is never an error: a query
/// that finds nothing returns `Ok` with an empty list.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Issue `{id}` already exists in collection `{collection}`")]
    DuplicateId { collection: String, id: String },

    #[error("Vector has {actual} dimensions but collection expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(
        "Collection `{collection}` was built with {stored} but the configured embedder is \
         {requested}; rebuild the collection to switch (existing vectors will be dropped)"
    )]
    SignatureMismatch {
        collection: String,
        stored: EmbeddingSignature,
        requested: EmbeddingSignature,
    },

    #[error("Collection `{name}` no longer exists; reopen the index")]
    CollectionNotFound { name: String },

    #[error("Invalid collection name `{name}`: use letters, digits and underscores")]
    InvalidCollectionName { name: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Failed to (de)serialize metadata: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt record: {message}")]
    Corrupt { message: String },
}

impl IndexError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, IndexError::DuplicateId { .. })
    }

    pub fn is_signature_mismatch(&self) -> bool {
        matches!(self, IndexError::SignatureMismatch { .. })
    }

    pub fn is_embedding_error(&self) -> bool {
        matches!(self, IndexError::Embedding(_))
    }
}

#[derive(Debug, Error)]
pub enum IssueMatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

pub type Result<T> = std::result::Result<T, IssueMatchError>;
