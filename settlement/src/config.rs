//! Configuration for the settlement workers

use anchor_core::FeeSchedule;
use custody::CustodyConfig;
use serde::{Deserialize, Serialize};

/// Settlement service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Seconds between worker passes
    pub poll_interval_secs: u64,

    /// Maximum records claimed per worker pass
    pub batch_limit: usize,

    /// Postgres connection string; `None` selects the in-memory store
    pub database_url: Option<String>,

    /// Custody submission settings
    pub custody: CustodyConfig,

    /// Fee schedule applied when a record has no pre-computed fee
    pub fees: FeeSchedule,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "anchor-settlement".to_string(),
            poll_interval_secs: 30,
            batch_limit: 100,
            database_url: None,
            custody: CustodyConfig::default(),
            fees: FeeSchedule::new(),
        }
    }
}

impl Config {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables, starting from defaults
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(url) = std::env::var("ANCHOR_DATABASE_URL") {
            config.database_url = Some(url);
        }

        if let Ok(interval) = std::env::var("ANCHOR_POLL_INTERVAL_SECS") {
            config.poll_interval_secs = interval
                .parse()
                .map_err(|_| crate::Error::Config("Invalid ANCHOR_POLL_INTERVAL_SECS".into()))?;
        }

        if let Ok(limit) = std::env::var("ANCHOR_BATCH_LIMIT") {
            config.batch_limit = limit
                .parse()
                .map_err(|_| crate::Error::Config("Invalid ANCHOR_BATCH_LIMIT".into()))?;
        }

        if let Ok(seeds) = std::env::var("ANCHOR_SIGNING_SEEDS") {
            config.custody.signing_seeds =
                seeds.split(',').map(|s| s.trim().to_string()).collect();
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.batch_limit, 100);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
service_name = "anchor-settlement"
poll_interval_secs = 5
batch_limit = 25

[custody]
signing_seeds = []
max_base_fee = 500
starting_balance = "2"
claimable_balances_supported = false
account_creation_supported = true

[fees]
rules = []
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.batch_limit, 25);
        assert_eq!(config.custody.max_base_fee, 500);
        assert!(!config.custody.claimable_balances_supported);
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not valid toml [[[").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }
}
