use serde::{Deserialize, Serialize};
use std::fs;
use std::str::FromStr;
use std::time::Duration;

use crate::persistence::{ReadConcern, TxOptions, WriteConcern};
use crate::transfer::{RetryConfig, RetryConfigError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Invalid retry settings: {0}")]
    Retry(#[from] RetryConfigError),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    /// hourly | daily | never
    pub rotation: String,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Postgres,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(BackendKind::Memory),
            "postgres" | "postgresql" => Ok(BackendKind::Postgres),
            _ => Err(ConfigError::InvalidEnv {
                var: "TRANSFER_BACKEND",
                value: s.to_string(),
            }),
        }
    }
}

/// Account store settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// PostgreSQL connection URL (required for the postgres backend)
    pub postgres_url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    /// How long an outside write waits for a record locked by a transaction
    pub lock_wait_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            postgres_url: None,
            max_connections: 10,
            acquire_timeout_ms: 5000,
            lock_wait_ms: 5000,
        }
    }
}

impl StoreConfig {
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

/// Transfer retry and transaction settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TransferConfig {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter: bool,
    /// Budget for one attempt's transaction context; unbounded when absent
    pub max_time_ms: Option<u64>,
    pub read_concern: ReadConcern,
    pub write_concern: WriteConcern,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 10,
            max_backoff_ms: 500,
            jitter: true,
            max_time_ms: None,
            read_concern: ReadConcern::default(),
            write_concern: WriteConcern::default(),
        }
    }
}

impl TransferConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            jitter: self.jitter,
        }
    }

    pub fn tx_options(&self) -> TxOptions {
        TxOptions {
            read_concern: self.read_concern,
            write_concern: self.write_concern,
            max_time: self.max_time_ms.map(Duration::from_millis),
        }
    }
}

impl AppConfig {
    /// Load `config/{env}.yaml`, then apply process environment overrides
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_env_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// `DATABASE_URL`, `PORT` and `TRANSFER_BACKEND` win over the file
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
            self.store.postgres_url = Some(url);
        }
        if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
            self.gateway.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                var: "PORT",
                value: port.clone(),
            })?;
        }
        if let Some(backend) = lookup("TRANSFER_BACKEND").filter(|v| !v.is_empty()) {
            self.store.backend = backend.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.transfer.retry_config().validate()?;
        if self.store.backend == BackendKind::Postgres && self.store.postgres_url.is_none() {
            return Err(ConfigError::Invalid(
                "store.backend is postgres but no postgres_url / DATABASE_URL is set".to_string(),
            ));
        }
        Ok(())
    }
}
