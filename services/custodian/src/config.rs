//! Custodian configuration
//!
//! Loaded from a JSON file; every field has a default so a file only
//! needs the values that differ.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CustodianError, CustodianResult};

pub const DEFAULT_EXPORT_PIN: &str = "watchExports";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CustodianConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Main-ledger network passphrase; binds transaction hashes to one network.
    pub network_passphrase: String,
    /// First reconnect delay after a stream failure.
    pub backoff_base_ms: u64,
    /// Reconnect delay ceiling.
    pub backoff_max_ms: u64,
    /// How often retry-state peg-outs are resubmitted while any exist.
    pub retry_interval_secs: u64,
    /// How often the finalizer rescans for unsettled terminal records.
    pub sweep_interval_secs: u64,
    /// Bound on terminal records queued from the peg-out engine to the finalizer.
    pub pegout_queue_capacity: usize,
    /// Pin name under which export-watcher progress is stored.
    pub export_pin_name: String,
    /// Main-ledger fee per operation.
    pub base_fee: u32,
}

impl Default for CustodianConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("custodian.db"),
            network_passphrase: "Test SDF Network ; September 2015".to_string(),
            backoff_base_ms: 100,
            backoff_max_ms: 60_000,
            retry_interval_secs: 5,
            sweep_interval_secs: 60,
            pegout_queue_capacity: 256,
            export_pin_name: DEFAULT_EXPORT_PIN.to_string(),
            base_fee: 100,
        }
    }
}

impl CustodianConfig {
    pub fn load(path: impl AsRef<Path>) -> CustodianResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CustodianError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> CustodianResult<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| CustodianError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CustodianResult<()> {
        if self.network_passphrase.is_empty() {
            return Err(CustodianError::Config("network_passphrase is empty".into()));
        }
        if self.backoff_base_ms == 0 || self.backoff_base_ms > self.backoff_max_ms {
            return Err(CustodianError::Config(format!(
                "backoff range {}..{}ms is invalid",
                self.backoff_base_ms, self.backoff_max_ms
            )));
        }
        if self.retry_interval_secs == 0 || self.sweep_interval_secs == 0 {
            return Err(CustodianError::Config("intervals must be non-zero".into()));
        }
        if self.pegout_queue_capacity == 0 {
            return Err(CustodianError::Config("pegout_queue_capacity must be non-zero".into()));
        }
        if self.export_pin_name.is_empty() {
            return Err(CustodianError::Config("export_pin_name is empty".into()));
        }
        Ok(())
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
