use async_trait::async_trait;
use reqwest::{Client, NoProxy, Proxy, Response};
use std::time::Duration;
use tracing::debug;

use super::errors::{GatewayError, RetryError};
use super::models::{EmbeddingRequest, EmbeddingResponse};
use super::retry::{with_retry, RetryConfig};
use crate::models::EmbeddingSignature;
use crate::services::embedding_service::{EmbeddingError, EmbeddingProvider};

#[derive(Debug, Clone, PartialEq)]
pub struct ProxyConfig {
    pub url: String,
    pub credentials: Option<(String, String)>,
    /// Comma-separated hosts, domains and CIDR ranges reached directly
    pub no_proxy: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub timeout: Duration,
    pub max_retries: usize,
    pub accept_invalid_certs: bool,
    pub proxy: Option<ProxyConfig>,
}

impl GatewayConfig {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            dimension,
            timeout: Duration::from_secs(60),
            max_retries: 3,
            accept_invalid_certs: false,
            proxy: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// The initial request plus one per retry.
    pub fn attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }

    /// Wall-clock budget for one embedding call: every attempt may run to its
    /// own timeout. Saturates instead of overflowing on extreme settings.
    pub fn retry_budget(&self) -> Duration {
        let attempts = u32::try_from(self.attempts()).unwrap_or(u32::MAX);
        self.timeout
            .saturating_mul(attempts)
            .saturating_add(Duration::from_secs(10))
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.api_key.is_empty() {
            return Err(GatewayError::ConfigurationError {
                message: "Gateway API key is required".to_string(),
            });
        }

        if self.base_url.is_empty() {
            return Err(GatewayError::ConfigurationError {
                message: "Base URL cannot be empty".to_string(),
            });
        }

        if self.model.is_empty() {
            return Err(GatewayError::ConfigurationError {
                message: "Model name cannot be empty".to_string(),
            });
        }

        if self.dimension == 0 {
            return Err(GatewayError::ConfigurationError {
                message: "Embedding dimension must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }
}

/// HTTP client for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct GatewayClient {
    config: GatewayConfig,
    client: Client,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;

        let mut builder = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        builder = match &config.proxy {
            Some(proxy_config) => {
                let mut proxy =
                    Proxy::all(&proxy_config.url).map_err(|e| GatewayError::ConfigurationError {
                        message: format!("Invalid proxy URL: {e}"),
                    })?;
                if let Some((username, password)) = &proxy_config.credentials {
                    proxy = proxy.basic_auth(username, password);
                }
                if let Some(no_proxy) = &proxy_config.no_proxy {
                    proxy = proxy.no_proxy(NoProxy::from_string(no_proxy));
                }
                builder.proxy(proxy)
            }
            // Ignore HTTP(S)_PROXY from the environment unless configured here
            None => builder.no_proxy(),
        };

        let client = builder
            .build()
            .map_err(|e| GatewayError::ConfigurationError {
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self { config, client })
    }

    fn timeout_ms(&self) -> u64 {
        self.config.timeout.as_millis() as u64
    }

    /// Embed `texts`, retrying transient failures with exponential backoff.
    pub async fn create_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, GatewayError> {
        let request = EmbeddingRequest::new(self.config.model.clone(), texts.to_vec());

        let retry_config = RetryConfig::new(self.config.attempts())
            .with_total_timeout(self.config.retry_budget());

        with_retry(retry_config, || self.create_embeddings_once(&request))
            .await
            .map_err(|retry_error| match retry_error {
                RetryError::NonRetryable { source } => source,
                RetryError::Exhausted { source, .. } => source,
                RetryError::TimeoutExceeded => GatewayError::Timeout {
                    timeout_ms: self.timeout_ms(),
                },
            })
    }

    async fn create_embeddings_once(
        &self,
        request: &EmbeddingRequest,
    ) -> Result<Vec<Vec<f32>>, GatewayError> {
        debug!(
            model = %request.model,
            inputs = request.input.len(),
            "Requesting embeddings"
        );

        let response = self
            .client
            .post(self.config.embeddings_url())
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| GatewayError::from_reqwest_error(e, self.timeout_ms()))?;

        let parsed = self.handle_response(response).await?;

        parsed
            .into_vectors(request.input.len(), self.config.dimension)
            .map_err(|message| GatewayError::InvalidResponse { message })
    }

    async fn handle_response(&self, response: Response) -> Result<EmbeddingResponse, GatewayError> {
        let status = response.status();

        if status.is_success() {
            let response_text = response
                .text()
                .await
                .map_err(|e| GatewayError::from_reqwest_error(e, self.timeout_ms()))?;

            serde_json::from_str(&response_text).map_err(|e| GatewayError::ParseError {
                message: format!("Failed to parse response: {e}"),
            })
        } else {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            Err(GatewayError::from_status_and_body(status, &error_body))
        }
    }
}

#[async_trait]
impl EmbeddingProvider for GatewayClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(self.create_embeddings(texts).await?)
    }

    fn signature(&self) -> EmbeddingSignature {
        EmbeddingSignature::new(self.config.model.clone(), self.config.dimension)
    }
}
