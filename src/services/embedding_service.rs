//! Embedding service for turning issue text into vectors
//!
//! This service wraps an [`EmbeddingProvider`] and adds:
//! - input/output validation (same count and order, fixed dimension)
//! - an opt-in degraded mode that substitutes all-zero vectors when the
//!   provider fails, so writes and queries keep working without the gateway
//!
//! Providers:
//! - [`GatewayClient`](crate::services::gateway::GatewayClient): remote model gateway
//! - [`HashEmbeddingProvider`]: deterministic offline vectors for tests and demos

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::EmbeddingSignature;
use crate::services::gateway::GatewayError;

/// Dimension of the zero vectors produced in degraded mode with default settings.
pub const FALLBACK_DIMENSION: usize = 384;

/// Model name recorded for collections built from [`HashEmbeddingProvider`].
pub const HASH_MODEL_NAME: &str = "local/hash-embedding";

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("At least one text is required")]
    EmptyInput,

    #[error("Provider returned invalid output: {message}")]
    InvalidOutput { message: String },
}

/// What to do when the provider fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Surface the failure to the caller.
    #[default]
    Strict,
    /// Log, count, and return one all-zero vector per input.
    ZeroVector,
}

impl std::fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackPolicy::Strict => write!(f, "strict"),
            FallbackPolicy::ZeroVector => write!(f, "zero_vector"),
        }
    }
}

impl std::str::FromStr for FallbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(FallbackPolicy::Strict),
            "zero_vector" | "zero-vector" | "zero" => Ok(FallbackPolicy::ZeroVector),
            other => Err(format!(
                "Unknown fallback policy `{other}` (expected strict or zero_vector)"
            )),
        }
    }
}

/// Source of embeddings. Implementations return exactly one vector per
/// input, in input order, each of `signature().dimension` elements.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn signature(&self) -> EmbeddingSignature;
}

/// Deterministic, offline embeddings derived from a hash of the text.
///
/// Identical texts map to identical unit-length vectors, which is all the
/// similarity index needs to be exercised without a gateway.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimension: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        // FNV-1a, stable across Rust releases unlike DefaultHasher
        let mut seed: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.as_bytes() {
            seed ^= u64::from(*byte);
            seed = seed.wrapping_mul(0x0100_0000_01b3);
        }

        let mut embedding = Vec::with_capacity(self.dimension);
        let mut rng_state = seed;

        for _ in 0..self.dimension {
            // Simple LCG (Linear Congruential Generator)
            rng_state = rng_state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let value = (rng_state >> 32) as u32;
            // Normalize to [-1, 1] range
            embedding.push((value as f32 / u32::MAX as f32) * 2.0 - 1.0);
        }

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut embedding {
                *value /= magnitude;
            }
        }

        embedding
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(FALLBACK_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }

    fn signature(&self) -> EmbeddingSignature {
        EmbeddingSignature::new(HASH_MODEL_NAME, self.dimension)
    }
}

/// Validating front for an [`EmbeddingProvider`] with an explicit failure policy.
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    policy: FallbackPolicy,
    fallback_count: AtomicU64,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, policy: FallbackPolicy) -> Self {
        Self {
            provider,
            policy,
            fallback_count: AtomicU64::new(0),
        }
    }

    /// Strict service over the offline hash provider.
    pub fn offline(dimension: usize) -> Self {
        Self::new(
            Arc::new(HashEmbeddingProvider::new(dimension)),
            FallbackPolicy::Strict,
        )
    }

    pub fn signature(&self) -> EmbeddingSignature {
        self.provider.signature()
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    /// Number of calls answered with zero vectors since creation.
    pub fn fallback_count(&self) -> u64 {
        self.fallback_count.load(Ordering::Relaxed)
    }

    /// One vector per input text, in input order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let dimension = self.provider.signature().dimension;
        let result = self
            .provider
            .embed(texts)
            .await
            .and_then(|vectors| validate_output(vectors, texts.len(), dimension));

        match result {
            Ok(vectors) => {
                debug!(inputs = texts.len(), dimension, "Embedded texts");
                Ok(vectors)
            }
            Err(error) => match self.policy {
                FallbackPolicy::Strict => Err(error),
                FallbackPolicy::ZeroVector => {
                    let total = self.fallback_count.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(
                        error = %error,
                        inputs = texts.len(),
                        dimension,
                        fallback_total = total,
                        "Embedding failed, substituting zero vectors; similarity results are meaningless for these texts"
                    );
                    Ok(vec![vec![0.0; dimension]; texts.len()])
                }
            },
        }
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| EmbeddingError::InvalidOutput {
            message: "provider returned no vector".to_string(),
        })
    }
}

fn validate_output(
    vectors: Vec<Vec<f32>>,
    expected: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if vectors.len() != expected {
        return Err(EmbeddingError::InvalidOutput {
            message: format!("expected {expected} vectors, got {}", vectors.len()),
        });
    }
    if let Some((position, vector)) = vectors
        .iter()
        .enumerate()
        .find(|(_, v)| v.len() != dimension)
    {
        return Err(EmbeddingError::InvalidOutput {
            message: format!(
                "vector {position} has {} dimensions, expected {dimension}",
                vector.len()
            ),
        });
    }
    if let Some(position) = vectors
        .iter()
        .position(|v| v.iter().any(|x| !x.is_finite()))
    {
        return Err(EmbeddingError::InvalidOutput {
            message: format!("vector {position} contains non-finite values"),
        });
    }
    Ok(vectors)
}
