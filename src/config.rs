//! Configuration file parsing for the relayer.
//!
//! This module loads the optional `config.toml` with HTTP, RPC transport, and relay policy
//! settings. Secrets and endpoints come from the environment instead (see
//! [`crate::from_env`]).
//!
//! Every section is optional and falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete relayer configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayerConfig {
    pub cors: CorsConfig,
    pub request: RequestConfig,
    pub transaction: TransactionConfig,
    pub relay: RelayConfig,
}

impl RelayerConfig {
    /// Load configuration from a TOML file.
    ///
    /// If the file doesn't exist, returns the default configuration.
    /// If the file exists but is malformed, returns an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()
    }

    /// Load configuration from environment variable CONFIG_FILE or default path.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::from_file(config_path)
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// List of allowed origins. Empty list means allow all (*).
    pub allowed_origins: Vec<String>,
}

/// Request validation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Maximum request body size in bytes (default 1MB).
    pub max_body_size_bytes: usize,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_body_size_bytes: 1_048_576, // 1MB
        }
    }
}

/// RPC transport and transaction lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Timeout for individual RPC requests in seconds.
    pub rpc_timeout_seconds: u64,
    /// HTTP connection establishment timeout in seconds.
    pub connection_timeout_seconds: u64,
    /// Maximum idle connections per host in the connection pool.
    pub pool_max_idle_per_host: usize,
    /// How long to keep idle connections alive in seconds.
    pub pool_idle_timeout_seconds: u64,
    /// Upper bound on waiting for the `execute` receipt.
    pub receipt_timeout_seconds: u64,
    /// Confirmations required before a receipt counts.
    pub confirmations: u64,
    /// Override the receipt poll interval in milliseconds.
    /// Alloy's default is 7000ms; fast chains benefit from 200-1000ms.
    pub poll_interval_ms: Option<u64>,
    /// Retries for rate-limited RPC responses. 0 disables the retry layer.
    pub rpc_max_retries: u32,
    /// Initial backoff between rate-limit retries.
    pub rpc_initial_backoff_ms: u64,
    /// Compute-unit budget per second advertised to the retry layer.
    pub rpc_compute_units_per_second: u64,
    /// Price transactions with `eth_gasPrice` instead of EIP-1559 fees.
    pub legacy_gas_price: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_seconds: 30,
            connection_timeout_seconds: 10,
            pool_max_idle_per_host: 100,
            pool_idle_timeout_seconds: 90,
            receipt_timeout_seconds: 120,
            confirmations: 1,
            poll_interval_ms: None,
            rpc_max_retries: 3,
            rpc_initial_backoff_ms: 500,
            rpc_compute_units_per_second: 300,
            legacy_gas_price: false,
        }
    }
}

impl TransactionConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_seconds)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_seconds)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_seconds)
    }
}

/// Relay policy: fast-fail checks performed before paying for a transaction.
///
/// The forwarder contract enforces signature and nonce rules on its own; these only save
/// gas on requests that would revert anyway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Compare `request.nonce` with `getNonce(from)` before submitting.
    pub precheck_nonce: bool,
    /// Reject requests whose `gas` exceeds this limit.
    pub max_gas_limit: Option<u64>,
    /// Gas added on top of `request.gas` for the forwarder's own bookkeeping.
    pub execute_gas_overhead: u64,
    /// Refuse to relay when the RPC reports a different chain id.
    pub expected_chain_id: Option<u64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            precheck_nonce: true,
            max_gas_limit: None,
            execute_gas_overhead: 0,
            expected_chain_id: None,
        }
    }
}
