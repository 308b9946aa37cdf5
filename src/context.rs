//! Process-wide handles for one issuematch session.
//!
//! [`IssueMatchContext`] owns the database, the embedding service and the
//! opened similarity index. Build it once at startup, pass it to whatever
//! needs it, and [`close`](IssueMatchContext::close) it on shutdown.

use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::database::DatabaseManager;
use crate::error::Result;
use crate::services::{
    EmbeddingError, EmbeddingProvider, EmbeddingService, GatewayClient, HashEmbeddingProvider,
    RebuildPolicy, SimilarityIndex,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextOptions {
    /// Use deterministic local embeddings instead of the gateway.
    pub offline: bool,
    pub rebuild: RebuildPolicy,
}

impl ContextOptions {
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Default::default()
        }
    }

    pub fn with_rebuild(mut self, rebuild: RebuildPolicy) -> Self {
        self.rebuild = rebuild;
        self
    }
}

pub struct IssueMatchContext {
    config: Config,
    db: DatabaseManager,
    embedder: Arc<EmbeddingService>,
    index: SimilarityIndex,
}

impl IssueMatchContext {
    /// Validate `config`, open the store and bind the configured collection.
    ///
    /// Missing gateway settings fail here rather than at the first embedding call.
    pub fn initialize(config: Config, options: ContextOptions) -> Result<Self> {
        let provider: Arc<dyn EmbeddingProvider> = if options.offline {
            config.validate_storage()?;
            Arc::new(HashEmbeddingProvider::new(config.embedding.dimension))
        } else {
            config.validate()?;
            let client =
                GatewayClient::new(config.gateway_config()?).map_err(EmbeddingError::from)?;
            Arc::new(client)
        };

        Self::with_provider(config, provider, options.rebuild)
    }

    /// Same as [`initialize`](Self::initialize) with a caller-supplied provider.
    pub fn with_provider(
        config: Config,
        provider: Arc<dyn EmbeddingProvider>,
        rebuild: RebuildPolicy,
    ) -> Result<Self> {
        config.validate_storage()?;

        let db = DatabaseManager::new(config.database_path()?)?;
        let embedder = Arc::new(EmbeddingService::new(provider, config.embedding.fallback));
        let index = SimilarityIndex::open(
            &db,
            Arc::clone(&embedder),
            config.collection_spec(),
            rebuild,
        )?;

        info!(
            database = %db.get_db_path().display(),
            collection = %index.collection().name,
            signature = %index.signature(),
            fallback = %embedder.policy(),
            "Context initialized"
        );

        Ok(Self {
            config,
            db,
            embedder,
            index,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &DatabaseManager {
        &self.db
    }

    pub fn embedder(&self) -> &EmbeddingService {
        &self.embedder
    }

    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut SimilarityIndex {
        &mut self.index
    }

    /// Release the index and close the database connection.
    pub fn close(self) -> Result<()> {
        let Self { db, index, .. } = self;
        let collection = index.collection().name.clone();
        drop(index);

        db.close()?;
        info!(collection = %collection, "Context closed");
        Ok(())
    }
}
