//! Configuration validation.

use super::Config;
use crate::core::StoreKind;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.index.is_empty() {
        return Err(MigrateError::Config("source.index is required".into()));
    }
    if config.source.kind != StoreKind::Pinecone && config.source.url.is_empty() {
        return Err(MigrateError::Config(format!(
            "source.url is required for {} stores",
            config.source.kind
        )));
    }

    // Target validation
    if config.target.index.is_empty() {
        return Err(MigrateError::Config("target.index is required".into()));
    }
    if config.target.kind != StoreKind::Pinecone && config.target.url.is_empty() {
        return Err(MigrateError::Config(format!(
            "target.url is required for {} stores",
            config.target.kind
        )));
    }

    // Cannot migrate an index onto itself
    if config.source.kind == config.target.kind
        && config.source.url == config.target.url
        && config.source.index == config.target.index
    {
        return Err(MigrateError::Config(
            "source and target cannot be the same index".into(),
        ));
    }

    if config.migration.batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    if config.migration.validate_every == 0 {
        return Err(MigrateError::Config(
            "migration.validate_every must be at least 1".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationOptions, StoreConfig};
    use std::collections::HashMap;

    fn valid_config() -> Config {
        Config {
            source: StoreConfig {
                kind: StoreKind::Pinecone,
                url: String::new(),
                api_key: "src-key".to_string(),
                index: "articles".to_string(),
                timeout_secs: 30,
                extra: HashMap::new(),
            },
            target: StoreConfig {
                kind: StoreKind::Qdrant,
                url: "http://localhost:6333".to_string(),
                api_key: "tgt-key".to_string(),
                index: "articles".to_string(),
                timeout_secs: 30,
                extra: HashMap::new(),
            },
            migration: MigrationOptions::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_source_index() {
        let mut config = valid_config();
        config.source.index = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_target_url() {
        let mut config = valid_config();
        config.target.url = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_same_index_rejected() {
        let mut config = valid_config();
        config.target = config.source.clone();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = valid_config();
        config.migration.batch_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_store_config_debug_redacts_api_key() {
        let mut config = valid_config();
        config.source.api_key = "super_secret_key_123".to_string();
        let debug_output = format!("{:?}", config.source);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_key_123"));
    }

    #[test]
    fn test_server_config_debug_redacts_api_key() {
        let server = crate::config::ServerConfig {
            addr: "127.0.0.1:8080".to_string(),
            api_key: "server_secret_456".to_string(),
            requests_per_minute: 100,
            burst: 20,
            db_path: ":memory:".to_string(),
        };
        let debug_output = format!("{:?}", server);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("server_secret_456"));
    }
}
