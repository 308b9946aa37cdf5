pub mod embedding_service;
pub mod gateway;
pub mod similarity_index;

pub use embedding_service::{
    EmbeddingError, EmbeddingProvider, EmbeddingService, FallbackPolicy, HashEmbeddingProvider,
    FALLBACK_DIMENSION,
};
pub use gateway::{GatewayClient, GatewayConfig, GatewayError, ProxyConfig};
pub use similarity_index::{RebuildPolicy, SimilarityIndex, DEFAULT_QUERY_K};
