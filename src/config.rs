//! Configuration management with validation and defaults
//!
//! Loaded from a TOML file; every section falls back to its defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete engine configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub storage: StorageConfig,
    pub draws: DrawConfig,
    pub retry: RetryConfig,
    pub scheduler: SchedulerConfig,
    pub api: ApiConfig,
    pub monitoring: MonitoringConfig,
}

/// RocksDB location and tuning
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_directory: String,
    pub write_buffer_size_mb: usize,
    pub max_write_buffer_number: i32,
    /// Whether to clear the store on startup (testing only!)
    pub clear_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: "./DB/bingo_data".to_string(),
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            clear_on_start: false, // Production default: preserve data
        }
    }
}

/// Draw-level behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    /// Interval between automatic draws of a number
    pub auto_tick_interval_ms: u64,
    pub max_cards_per_purchase: u32,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            auto_tick_interval_ms: 3_000,
            max_cards_per_purchase: 40,
        }
    }
}

/// Bounded retry for optimistic transaction conflicts
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_backoff_ms: 5,
            max_backoff_ms: 200,
        }
    }
}

/// Background sweeps
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Safety-net settlement of every active draw
    pub settlement_sweep_interval_secs: u64,
    /// Promotion of due waiting draws to active
    pub auto_start_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settlement_sweep_interval_secs: 60,
            auto_start_interval_secs: 60,
        }
    }
}

/// HTTP API
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

/// Logging and metrics exposition
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_filter: String,
    /// Serve the Prometheus text format at `GET /metrics`
    pub enable_metrics: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_filter: "bingo_settlement=info,bingo_engine=info,tower_http=info".to_string(),
            enable_metrics: true,
        }
    }
}

impl EngineConfig {
    /// Local development: fast ticks and sweeps, fresh store on every start
    pub fn development() -> Self {
        Self {
            storage: StorageConfig {
                data_directory: "./DB/bingo_dev".to_string(),
                clear_on_start: true, // Testing mode: clear DB
                ..Default::default()
            },
            draws: DrawConfig {
                auto_tick_interval_ms: 1_000,
                ..Default::default()
            },
            scheduler: SchedulerConfig {
                settlement_sweep_interval_secs: 10,
                auto_start_interval_secs: 5,
                ..Default::default()
            },
            monitoring: MonitoringConfig {
                log_filter: "bingo_settlement=debug,bingo_engine=debug,tower_http=debug".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn production() -> Self {
        Self {
            storage: StorageConfig {
                data_directory: "./DB/bingo_data".to_string(),
                write_buffer_size_mb: 128,
                max_write_buffer_number: 6,
                clear_on_start: false,
            },
            api: ApiConfig {
                allowed_origins: vec![],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigValidationError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigValidationError::LoadFailed(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigValidationError> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| ConfigValidationError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.storage.data_directory.trim().is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "storage.data_directory".to_string(),
            ));
        }

        if self.draws.auto_tick_interval_ms == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "auto_tick_interval_ms must be > 0".to_string(),
            ));
        }

        if self.draws.max_cards_per_purchase == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "max_cards_per_purchase must be > 0".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "retry.max_attempts must be > 0".to_string(),
            ));
        }

        if self.retry.base_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigValidationError::LogicalInconsistency(
                "retry.base_backoff_ms exceeds retry.max_backoff_ms".to_string(),
            ));
        }

        if self.scheduler.settlement_sweep_interval_secs == 0 || self.scheduler.auto_start_interval_secs == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "scheduler intervals must be > 0".to_string(),
            ));
        }

        // A sweep that fires faster than numbers are drawn only burns transactions
        if self.scheduler.settlement_sweep_interval_secs * 1000 < self.draws.auto_tick_interval_ms {
            return Err(ConfigValidationError::LogicalInconsistency(
                "settlement sweep runs more often than the automatic ticker".to_string(),
            ));
        }

        Ok(())
    }

    pub fn auto_tick_interval(&self) -> Duration {
        Duration::from_millis(self.draws.auto_tick_interval_ms)
    }

    pub fn settlement_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.settlement_sweep_interval_secs)
    }

    pub fn auto_start_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.auto_start_interval_secs)
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
    #[error("Configuration logical inconsistency: {0}")]
    LogicalInconsistency(String),
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),
}

impl From<ConfigValidationError> for crate::errors::BingoError {
    fn from(e: ConfigValidationError) -> Self {
        crate::errors::BingoError::Configuration(e.to_string())
    }
}
