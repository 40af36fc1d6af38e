//! Configuration module for wallet-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::{FileConfig, SeedAccount};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use wallet_core::config::SettlementConfig;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub settlement: SettlementConfig,
    pub accounts: Vec<SeedAccount>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_from_str(&config_content)
    }

    fn load_from_str(&self, content: &str) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;

        Ok(LoadedConfig {
            listen: file_config.server.listen,
            settlement: file_config.settlement,
            accounts: file_config.accounts,
        })
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.settlement.queue_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "settlement.queue_capacity must be at least 1".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for account in &config.accounts {
        if account.balance < 0 {
            return Err(ConfigError::ValidationError(format!(
                "account {} has a negative balance",
                account.id
            )));
        }
        if !seen.insert(account.id) {
            return Err(ConfigError::ValidationError(format!(
                "account {} is listed twice",
                account.id
            )));
        }
    }
    Ok(())
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(listen_override: Option<SocketAddr>) -> ConfigLoader {
        ConfigLoader::new("./wallet-config.toml", listen_override)
    }

    #[test]
    fn test_listen_override_wins() {
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let loaded = loader(Some(addr))
            .load_from_str("[server]\nlisten = \"0.0.0.0:8080\"\n")
            .unwrap();
        assert_eq!(loaded.listen, addr);
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let err = loader(None)
            .load_from_str("[server]\n[settlement]\nqueue_capacity = 0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_negative_seed_balance_rejected() {
        let toml_str = r#"
[server]

[[accounts]]
id = "0192f7a0-0000-7000-8000-000000000001"
balance = -5
"#;
        let err = loader(None).load_from_str(toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_duplicate_seed_account_rejected() {
        let toml_str = r#"
[server]

[[accounts]]
id = "0192f7a0-0000-7000-8000-000000000001"

[[accounts]]
id = "0192f7a0-0000-7000-8000-000000000001"
balance = 10
"#;
        let err = loader(None).load_from_str(toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ConfigLoader::new("./does-not-exist.toml", None)
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
