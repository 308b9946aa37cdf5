use issuematch::config::{Config, ConfigError};
use issuematch::env::{embedding as env_embedding, proxy as env_proxy, storage as env_storage};
use issuematch::services::embedding_service::FallbackPolicy;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn lookup(vars: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<&str, &str> = vars.iter().copied().collect();
    move |key| map.get(key).map(|v| v.to_string())
}

const FULL_CONFIG: &str = r#"
[embedding]
base_url = "https://models.callcenter.internal/v1"
model = "multilingual-e5-small"
api_key = "sk-test"
dimension = 384
timeout_secs = 30
max_retries = 2
accept_invalid_certs = true
fallback = "zero_vector"

[proxy]
url = "http://10.40.0.1:3128"
username = "svc-issuematch"
password = "hunter2"
no_proxy = "localhost,.callcenter.internal,10.0.0.0/8"

[storage]
database_path = "/var/lib/issuematch/issues.db"
collection = "support_tickets"
description = "Escalated support tickets"
"#;

#[test]
fn test_parse_full_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, FULL_CONFIG).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.embedding.fallback, FallbackPolicy::ZeroVector);
    assert_eq!(config.storage.collection, "support_tickets");
    assert_eq!(
        config.database_path().unwrap(),
        PathBuf::from("/var/lib/issuematch/issues.db")
    );

    let gateway = config.gateway_config().unwrap();
    assert_eq!(gateway.base_url, "https://models.callcenter.internal/v1");
    assert_eq!(gateway.model, "multilingual-e5-small");
    assert_eq!(gateway.timeout, Duration::from_secs(30));
    assert_eq!(gateway.max_retries, 2);
    assert!(gateway.accept_invalid_certs);

    let proxy = gateway.proxy.unwrap();
    assert_eq!(proxy.url, "http://10.40.0.1:3128");
    assert_eq!(
        proxy.credentials,
        Some(("svc-issuematch".to_string(), "hunter2".to_string()))
    );
    assert_eq!(
        proxy.no_proxy.as_deref(),
        Some("localhost,.callcenter.internal,10.0.0.0/8")
    );

    let spec = config.collection_spec();
    assert_eq!(spec.name, "support_tickets");
    assert_eq!(spec.description, "Escalated support tickets");
}

#[test]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
    assert!(config.proxy.is_none());
}

#[test]
fn test_malformed_file_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[embedding\nmodel = ").unwrap();

    assert!(matches!(
        Config::load_from(&path),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.embedding.model = Some("embed-small".to_string());
    config.embedding.api_key = Some("sk-test".to_string());
    config.storage.description = "Night shift complaints".to_string();
    config.save_to(&path).unwrap();

    let reloaded = Config::load_from(&path).unwrap();
    assert_eq!(reloaded, config);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn test_env_overrides_file_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, FULL_CONFIG).unwrap();

    let config = Config::load_from(&path)
        .unwrap()
        .with_overrides(lookup(&[
            (env_embedding::MODEL, "bge-m3"),
            (env_embedding::DIMENSION, "1024"),
            (env_embedding::FALLBACK, "strict"),
            (env_proxy::NO_PROXY, "*.corp"),
            (env_storage::COLLECTION, "tickets_v2"),
        ]))
        .unwrap();

    assert_eq!(config.embedding.model.as_deref(), Some("bge-m3"));
    assert_eq!(config.embedding.dimension, 1024);
    assert_eq!(config.embedding.fallback, FallbackPolicy::Strict);
    assert_eq!(config.storage.collection, "tickets_v2");

    let proxy = config.proxy.as_ref().unwrap();
    assert_eq!(proxy.no_proxy.as_deref(), Some("*.corp"));
    assert_eq!(proxy.username.as_deref(), Some("svc-issuematch"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_env_only_configuration() {
    let config = Config::default()
        .with_overrides(lookup(&[
            (env_embedding::API_KEY, "sk-env"),
            (env_embedding::BASE_URL, "https://gateway.local/v1"),
            (env_embedding::MODEL, "embed-small"),
            (env_embedding::ACCEPT_INVALID_CERTS, "yes"),
        ]))
        .unwrap();

    let gateway = config.gateway_config().unwrap();
    assert_eq!(gateway.api_key, "sk-env");
    assert_eq!(gateway.dimension, 384);
    assert!(gateway.accept_invalid_certs);
    assert!(gateway.proxy.is_none());
}

#[test]
fn test_validation_failures() {
    let base = Config::default()
        .with_overrides(lookup(&[
            (env_embedding::API_KEY, "sk-env"),
            (env_embedding::BASE_URL, "https://gateway.local/v1"),
            (env_embedding::MODEL, "embed-small"),
        ]))
        .unwrap();
    assert!(base.validate().is_ok());

    let mut no_model = base.clone();
    no_model.embedding.model = None;
    assert!(matches!(
        no_model.validate(),
        Err(ConfigError::Missing { env, .. }) if env == env_embedding::MODEL
    ));

    let mut bad_name = base.clone();
    bad_name.storage.collection = "1st collection".to_string();
    assert!(matches!(
        bad_name.validate(),
        Err(ConfigError::Invalid { .. })
    ));

    let mut no_proxy_url = base.clone();
    no_proxy_url.proxy = Some(Default::default());
    assert!(matches!(
        no_proxy_url.validate(),
        Err(ConfigError::Missing { env, .. }) if env == env_proxy::URL
    ));

    let bad_fallback = base.with_overrides(lookup(&[(env_embedding::FALLBACK, "silent")]));
    assert!(matches!(bad_fallback, Err(ConfigError::Invalid { .. })));
}
