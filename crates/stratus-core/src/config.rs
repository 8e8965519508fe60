use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::http::TransportOptions;
use crate::object::TransferOptions;
use crate::retry::{RetryOptions, DEFAULT_RETRY_STATUS_CODES};

/// Retry policy parameters (`[retry]` in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
    /// Read replica host for GET/HEAD failover.
    pub secondary_host_for_reads: Option<String>,
    /// Statuses treated as transient.
    pub status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let d = RetryOptions::default();
        Self {
            max_retries: d.max_retries,
            base_delay_ms: d.base_delay.as_millis() as u64,
            max_delay_secs: d.max_delay.as_secs(),
            secondary_host_for_reads: None,
            status_codes: DEFAULT_RETRY_STATUS_CODES.to_vec(),
        }
    }
}

impl RetryConfig {
    pub fn to_options(&self) -> RetryOptions {
        RetryOptions {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_secs(self.max_delay_secs),
            secondary_host_for_reads: self.secondary_host_for_reads.clone(),
            status_codes: self.status_codes.clone(),
        }
    }
}

/// Chunking defaults (`[transfer]`); unset values are derived per transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub chunk_size: Option<u64>,
    pub initial_chunk_size: Option<u64>,
    pub concurrency: Option<usize>,
}

impl TransferConfig {
    pub fn to_options(&self) -> TransferOptions {
        TransferOptions {
            chunk_size: self.chunk_size,
            concurrency: self.concurrency,
            progress: None,
        }
    }
}

/// Connection knobs (`[transport]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub connect_timeout_secs: u64,
    /// Abort a request whose throughput stays below this (bytes/s)...
    pub low_speed_limit: u32,
    /// ...for this many seconds.
    pub low_speed_time_secs: u64,
    /// Overall per-request limit; 0 disables it.
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        let d = TransportOptions::default();
        Self {
            connect_timeout_secs: d.connect_timeout.as_secs(),
            low_speed_limit: d.low_speed_limit,
            low_speed_time_secs: d.low_speed_time.as_secs(),
            timeout_secs: d.timeout.map_or(0, |t| t.as_secs()),
        }
    }
}

impl TransportConfig {
    pub fn to_options(&self) -> TransportOptions {
        TransportOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            low_speed_limit: self.low_speed_limit,
            low_speed_time: Duration::from_secs(self.low_speed_time_secs),
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
            ..TransportOptions::default()
        }
    }
}

/// Global configuration loaded from `~/.config/stratus/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StratusConfig {
    pub retry: RetryConfig,
    pub transfer: TransferConfig,
    pub transport: TransportConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("stratus")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<StratusConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = StratusConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: StratusConfig = toml::from_str(&data)?;
    Ok(cfg)
}
