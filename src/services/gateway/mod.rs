//! Client for the remote model gateway that serves embeddings.

pub mod client;
pub mod errors;
pub mod models;
pub mod retry;

pub use client::{GatewayClient, GatewayConfig, ProxyConfig};
pub use errors::{GatewayError, RetryError};
pub use models::{EmbeddingData, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage};
pub use retry::{with_retry, RetryConfig, RetryHandler};
