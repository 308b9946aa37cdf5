use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::embedding_service::EmbeddingService;
use crate::database::{CollectionRepository, DatabaseManager, IssueRepository};
use crate::error::IndexError;
use crate::logging::log_performance;
use crate::models::{
    CollectionInfo, CollectionSpec, CollectionStats, EmbeddingSignature, IssueRecord, Metadata,
    SimilarIssue,
};

pub const DEFAULT_QUERY_K: usize = 5;

/// What to do when a stored collection was built with a different embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildPolicy {
    /// Fail with [`IndexError::SignatureMismatch`] and leave the data alone.
    #[default]
    Refuse,
    /// Delete every stored vector and recreate the collection.
    DropAndRecreate,
}

/// Persistent nearest-neighbour index over one named collection of issues.
///
/// Opening the index resolves the collection against the embedder's
/// signature; once open, every vector written or queried has the
/// collection's dimension.
pub struct SimilarityIndex {
    embedder: Arc<EmbeddingService>,
    collections: CollectionRepository,
    issues: IssueRepository,
    collection: CollectionInfo,
}

impl SimilarityIndex {
    #[instrument(skip(db, embedder, spec), fields(collection = %spec.name))]
    pub fn open(
        db: &DatabaseManager,
        embedder: Arc<EmbeddingService>,
        spec: CollectionSpec,
        policy: RebuildPolicy,
    ) -> Result<Self, IndexError> {
        let collections = CollectionRepository::new(db);
        let requested = embedder.signature();

        let collection = match collections.get(&spec.name)? {
            Some(stored) if stored.signature == requested => {
                debug!(signature = %requested, "Opened existing collection");
                stored
            }
            Some(stored) => match policy {
                RebuildPolicy::Refuse => {
                    return Err(IndexError::SignatureMismatch {
                        collection: stored.name,
                        stored: stored.signature,
                        requested,
                    });
                }
                RebuildPolicy::DropAndRecreate => {
                    warn!(
                        stored = %stored.signature,
                        requested = %requested,
                        "Embedding signature changed, dropping collection"
                    );
                    let spec = CollectionSpec::new(&spec.name)
                        .with_description(non_empty_or(&spec.description, &stored.description));
                    recreate(&collections, &spec, &requested)?.1
                }
            },
            None => collections.create(&spec, &requested)?,
        };

        Ok(Self {
            embedder,
            collections,
            issues: IssueRepository::new(db),
            collection,
        })
    }

    pub fn collection(&self) -> &CollectionInfo {
        &self.collection
    }

    pub fn signature(&self) -> &EmbeddingSignature {
        &self.collection.signature
    }

    /// Embed `text` and store it under `id`. Existing ids are rejected.
    #[instrument(skip(self, text, metadata), fields(collection = %self.collection.name))]
    pub async fn insert(
        &self,
        id: &str,
        text: &str,
        metadata: Metadata,
    ) -> Result<(), IndexError> {
        if id.trim().is_empty() {
            return Err(IndexError::InvalidArgument {
                message: "issue id cannot be empty".to_string(),
            });
        }

        let start = Instant::now();
        let vector = self.embedder.embed_one(text).await?;

        let result = self
            .issues
            .insert(&self.collection, id, text, &metadata, &vector);
        log_performance(
            "index.insert",
            start.elapsed().as_millis() as u64,
            result.is_ok(),
        );
        result?;

        debug!("Indexed issue");
        Ok(())
    }

    /// Up to `k` stored issues closest to `text`, nearest first.
    #[instrument(skip(self, text), fields(collection = %self.collection.name))]
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<SimilarIssue>, IndexError> {
        let start = Instant::now();
        let vector = self.embedder.embed_one(text).await?;

        let result = self.issues.search(&self.collection, &vector, k);
        log_performance(
            "index.query",
            start.elapsed().as_millis() as u64,
            result.is_ok(),
        );

        let hits = result?;
        debug!(hits = hits.len(), "Query finished");
        Ok(hits)
    }

    pub fn get(&self, id: &str) -> Result<Option<IssueRecord>, IndexError> {
        self.issues.get(&self.collection, id)
    }

    pub fn count(&self) -> Result<usize, IndexError> {
        self.issues.count(&self.collection.name)
    }

    pub fn stats(&self) -> Result<CollectionStats, IndexError> {
        Ok(CollectionStats {
            name: self.collection.name.clone(),
            model: self.collection.signature.model.clone(),
            dimension: self.collection.signature.dimension,
            description: self.collection.description.clone(),
            record_count: self.count()?,
            created_at: self.collection.created_at,
        })
    }

    /// Drop every record and recreate the collection with the current
    /// embedder's signature. Returns the number of records dropped.
    pub fn rebuild(&mut self) -> Result<usize, IndexError> {
        let spec = CollectionSpec::new(&self.collection.name)
            .with_description(&self.collection.description);
        let (dropped, collection) = recreate(&self.collections, &spec, &self.embedder.signature())?;
        self.collection = collection;
        Ok(dropped)
    }
}

fn non_empty_or<'a>(preferred: &'a str, fallback: &'a str) -> &'a str {
    if preferred.is_empty() {
        fallback
    } else {
        preferred
    }
}

/// Delete, confirm nothing is left behind, then create afresh.
fn recreate(
    collections: &CollectionRepository,
    spec: &CollectionSpec,
    signature: &EmbeddingSignature,
) -> Result<(usize, CollectionInfo), IndexError> {
    let dropped = collections.delete(&spec.name)?;

    if collections.has_residue(&spec.name)? {
        return Err(IndexError::Corrupt {
            message: format!("collection `{}` still has data after delete", spec.name),
        });
    }

    let collection = collections.create(spec, signature)?;
    info!(
        collection = %spec.name,
        dropped,
        signature = %signature,
        "Rebuilt collection"
    );
    Ok((dropped, collection))
}
