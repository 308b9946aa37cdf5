//! Configuration file management for issuematch
//!
//! Values are read from `~/.issuematch/config.toml` and can be overridden by
//! environment variables (see [`crate::env`]). Everything the embedding
//! gateway needs is checked by [`Config::validate`] so that a missing
//! credential fails at startup instead of at the first embedding call.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::env::{embedding as env_embedding, proxy as env_proxy, storage as env_storage};
use crate::models::CollectionSpec;
use crate::services::embedding_service::{FallbackPolicy, FALLBACK_DIMENSION};
use crate::services::gateway::{GatewayConfig, ProxyConfig};

pub const DEFAULT_COLLECTION: &str = "customer_issues";
pub const DEFAULT_COLLECTION_DESCRIPTION: &str = "Customer complaints and issues";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: usize = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting `{field}` (set it in config.toml or via {env})")]
    Missing { field: String, env: &'static str },

    #[error("Invalid value for `{field}`: {message}")]
    Invalid { field: String, message: String },

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not find home directory")]
    HomeDirNotFound,
}

/// Configuration structure matching config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxySettings>,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub dimension: usize,
    pub timeout_secs: u64,
    pub max_retries: usize,
    /// Skip TLS certificate validation for the gateway. Off by default, so
    /// gateways behind a self-signed certificate (which older deployments
    /// reached with verification disabled) fail at the TLS handshake until
    /// this is set or the CA is trusted.
    pub accept_invalid_certs: bool,
    pub fallback: FallbackPolicy,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            api_key: None,
            dimension: FALLBACK_DIMENSION,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            accept_invalid_certs: false,
            fallback: FallbackPolicy::Strict,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxySettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    pub collection: String,
    pub description: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: None,
            collection: DEFAULT_COLLECTION.to_string(),
            description: DEFAULT_COLLECTION_DESCRIPTION.to_string(),
        }
    }
}

impl Config {
    /// Directory holding the config file and the default database (~/.issuematch)
    pub fn app_dir() -> Result<PathBuf, ConfigError> {
        let home_dir = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
        Ok(home_dir.join(".issuematch"))
    }

    /// Get the config file path (~/.issuematch/config.toml)
    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::app_dir()?.join("config.toml"))
    }

    /// Load configuration from the default location.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        // The file carries the gateway key and proxy password
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|source| {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
        }

        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    ///
    /// Blank values are ignored so that an exported-but-empty variable does
    /// not wipe a value from the config file.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = get(env_embedding::API_KEY) {
            self.embedding.api_key = Some(value);
        }
        if let Some(value) = get(env_embedding::BASE_URL) {
            self.embedding.base_url = Some(value);
        }
        if let Some(value) = get(env_embedding::MODEL) {
            self.embedding.model = Some(value);
        }
        if let Some(value) = get(env_embedding::DIMENSION) {
            self.embedding.dimension = parse_number(env_embedding::DIMENSION, &value)?;
        }
        if let Some(value) = get(env_embedding::TIMEOUT_SECS) {
            self.embedding.timeout_secs = parse_number(env_embedding::TIMEOUT_SECS, &value)?;
        }
        if let Some(value) = get(env_embedding::ACCEPT_INVALID_CERTS) {
            self.embedding.accept_invalid_certs =
                parse_bool(env_embedding::ACCEPT_INVALID_CERTS, &value)?;
        }
        if let Some(value) = get(env_embedding::FALLBACK) {
            self.embedding.fallback =
                value
                    .parse()
                    .map_err(|message: String| ConfigError::Invalid {
                        field: env_embedding::FALLBACK.to_string(),
                        message,
                    })?;
        }

        let proxy_url = get(env_proxy::URL);
        let proxy_username = get(env_proxy::USERNAME);
        let proxy_password = get(env_proxy::PASSWORD);
        let no_proxy = get(env_proxy::NO_PROXY);
        if proxy_url.is_some()
            || proxy_username.is_some()
            || proxy_password.is_some()
            || no_proxy.is_some()
        {
            let proxy = self.proxy.get_or_insert_with(ProxySettings::default);
            if proxy_url.is_some() {
                proxy.url = proxy_url;
            }
            if proxy_username.is_some() {
                proxy.username = proxy_username;
            }
            if proxy_password.is_some() {
                proxy.password = proxy_password;
            }
            if no_proxy.is_some() {
                proxy.no_proxy = no_proxy;
            }
        }

        if let Some(value) = get(env_storage::DB_PATH) {
            self.storage.database_path = Some(PathBuf::from(value));
        }
        if let Some(value) = get(env_storage::COLLECTION) {
            self.storage.collection = value;
        }

        Ok(self)
    }

    /// Check everything needed to talk to the embedding gateway and open the store.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gateway_config().map(|_| ())?;
        self.validate_storage()
    }

    pub fn validate_storage(&self) -> Result<(), ConfigError> {
        if !CollectionSpec::is_valid_name(&self.storage.collection) {
            return Err(ConfigError::Invalid {
                field: "storage.collection".to_string(),
                message: format!(
                    "`{}` must start with a letter and contain only letters, digits and underscores (max 64)",
                    self.storage.collection
                ),
            });
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid {
                field: "embedding.dimension".to_string(),
                message: "dimension must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Build the gateway client configuration, failing on any missing value.
    pub fn gateway_config(&self) -> Result<GatewayConfig, ConfigError> {
        let settings = &self.embedding;

        let api_key = required(&settings.api_key, "embedding.api_key", env_embedding::API_KEY)?;
        let base_url = required(
            &settings.base_url,
            "embedding.base_url",
            env_embedding::BASE_URL,
        )?;
        let model = required(&settings.model, "embedding.model", env_embedding::MODEL)?;

        if settings.dimension == 0 {
            return Err(ConfigError::Invalid {
                field: "embedding.dimension".to_string(),
                message: "dimension must be greater than zero".to_string(),
            });
        }
        if settings.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "embedding.timeout_secs".to_string(),
                message: "timeout must be greater than zero".to_string(),
            });
        }

        let proxy = match &self.proxy {
            Some(proxy) => Some(proxy.to_proxy_config()?),
            None => None,
        };

        Ok(GatewayConfig {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            dimension: settings.dimension,
            timeout: Duration::from_secs(settings.timeout_secs),
            max_retries: settings.max_retries,
            accept_invalid_certs: settings.accept_invalid_certs,
            proxy,
        })
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::app_dir()?.join("issues.db")),
        }
    }

    pub fn collection_spec(&self) -> CollectionSpec {
        CollectionSpec::new(&self.storage.collection).with_description(&self.storage.description)
    }
}

impl ProxySettings {
    fn to_proxy_config(&self) -> Result<ProxyConfig, ConfigError> {
        let url = required(&self.url, "proxy.url", env_proxy::URL)?;

        let credentials = match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some((username.clone(), password.clone())),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Missing {
                    field: "proxy.password".to_string(),
                    env: env_proxy::PASSWORD,
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Missing {
                    field: "proxy.username".to_string(),
                    env: env_proxy::USERNAME,
                })
            }
        };

        Ok(ProxyConfig {
            url,
            credentials,
            no_proxy: self.no_proxy.clone(),
        })
    }
}

fn required(value: &Option<String>, field: &str, env: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::Missing {
            field: field.to_string(),
            env,
        }),
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        field: field.to_string(),
        message: e.to_string(),
    })
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            field: field.to_string(),
            message: format!("expected a boolean, got `{other}`"),
        }),
    }
}
