use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Network error: {source}")]
    NetworkError { source: reqwest::Error },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Parse error: {message}")]
    ParseError { message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::RateLimitExceeded { .. } => true,
            GatewayError::Timeout { .. } => true,
            GatewayError::NetworkError { .. } => true,
            GatewayError::ServerError { status, .. } => *status >= 500,
            GatewayError::ServiceUnavailable { .. } => true,
            _ => false,
        }
    }

    pub fn is_authentication_error(&self) -> bool {
        matches!(self, GatewayError::AuthenticationFailed { .. })
    }

    pub fn is_timeout_error(&self) -> bool {
        matches!(self, GatewayError::Timeout { .. })
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, GatewayError::NetworkError { .. })
    }

    pub fn is_invalid_response_error(&self) -> bool {
        matches!(
            self,
            GatewayError::InvalidResponse { .. } | GatewayError::ParseError { .. }
        )
    }

    pub fn from_reqwest_error(error: reqwest::Error, timeout_ms: u64) -> Self {
        if error.is_timeout() {
            GatewayError::Timeout { timeout_ms }
        } else if error.is_connect() {
            GatewayError::NetworkError { source: error }
        } else if let Some(status) = error.status() {
            let status_code = status.as_u16();
            let message = error.to_string();

            match status_code {
                401 | 403 => GatewayError::AuthenticationFailed { message },
                429 => GatewayError::RateLimitExceeded { message },
                500..=599 => GatewayError::ServerError {
                    status: status_code,
                    message,
                },
                _ => GatewayError::InvalidRequest { message },
            }
        } else if error.is_decode() {
            GatewayError::ParseError {
                message: error.to_string(),
            }
        } else {
            GatewayError::NetworkError { source: error }
        }
    }

    /// Map a non-success HTTP response. OpenAI-compatible gateways put the
    /// human readable reason under `error.message`.
    pub fn from_status_and_body(status: reqwest::StatusCode, body: &str) -> Self {
        let status_code = status.as_u16();

        let error_message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                value
                    .get("error")
                    .and_then(|e| e.get("message").or(Some(e)))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.to_string());

        match status_code {
            400 | 404 | 422 => GatewayError::InvalidRequest {
                message: error_message,
            },
            401 | 403 => GatewayError::AuthenticationFailed {
                message: error_message,
            },
            429 => GatewayError::RateLimitExceeded {
                message: error_message,
            },
            503 => GatewayError::ServiceUnavailable {
                message: error_message,
            },
            500..=599 => GatewayError::ServerError {
                status: status_code,
                message: error_message,
            },
            _ => GatewayError::InvalidRequest {
                message: format!("HTTP {status_code}: {error_message}"),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum RetryError {
    #[error("Giving up after {attempts} attempts: {source}")]
    Exhausted { attempts: usize, source: GatewayError },

    #[error("Retry timeout exceeded")]
    TimeoutExceeded,

    #[error("Non-retryable error: {source}")]
    NonRetryable { source: GatewayError },
}
