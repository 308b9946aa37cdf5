//! Environment variable constants used throughout the application
//!
//! This module centralizes all environment variable names to ensure consistency
//! and make it easier to manage configuration across the codebase.

/// Logging configuration
pub mod logging {
    /// Log level configuration (e.g., "debug", "info", "warn", "error")
    pub const LOG_LEVEL: &str = "ISSUEMATCH_LOG_LEVEL";

    /// Log file path for file-based logging
    pub const LOG_FILE: &str = "ISSUEMATCH_LOG_FILE";

    /// Emit JSON formatted log lines
    pub const LOG_JSON: &str = "ISSUEMATCH_LOG_JSON";

    /// Disable colored output (follows the NO_COLOR standard)
    pub const NO_COLOR: &str = "NO_COLOR";
}

/// Embedding gateway configuration
pub mod embedding {
    /// Bearer token for the model gateway
    pub const API_KEY: &str = "ISSUEMATCH_API_KEY";

    /// Base URL of the OpenAI-compatible gateway (without `/embeddings`)
    pub const BASE_URL: &str = "ISSUEMATCH_EMBEDDING_BASE_URL";

    /// Model identifier requested from the gateway
    pub const MODEL: &str = "ISSUEMATCH_EMBEDDING_MODEL";

    /// Vector dimension produced by the model
    pub const DIMENSION: &str = "ISSUEMATCH_EMBEDDING_DIMENSION";

    /// Request timeout in seconds
    pub const TIMEOUT_SECS: &str = "ISSUEMATCH_EMBEDDING_TIMEOUT_SECS";

    /// Skip TLS certificate validation ("true"/"1")
    pub const ACCEPT_INVALID_CERTS: &str = "ISSUEMATCH_ACCEPT_INVALID_CERTS";

    /// Failure policy: "strict" or "zero_vector"
    pub const FALLBACK: &str = "ISSUEMATCH_EMBEDDING_FALLBACK";
}

/// Outbound proxy configuration
pub mod proxy {
    /// Proxy endpoint, e.g. `http://10.0.0.1:8080`
    pub const URL: &str = "ISSUEMATCH_PROXY_URL";

    pub const USERNAME: &str = "ISSUEMATCH_PROXY_USERNAME";

    pub const PASSWORD: &str = "ISSUEMATCH_PROXY_PASSWORD";

    /// Comma-separated hosts, domains and CIDR ranges that bypass the proxy
    pub const NO_PROXY: &str = "ISSUEMATCH_NO_PROXY";
}

/// Vector store configuration
pub mod storage {
    /// SQLite database file backing the vector index
    pub const DB_PATH: &str = "ISSUEMATCH_DB_PATH";

    /// Collection name
    pub const COLLECTION: &str = "ISSUEMATCH_COLLECTION";
}
