//! Engine configuration, loadable from TOML.
//!
//! ```toml
//! operation_timeout_ms = 2000
//! asset_cache_bytes = 33554432
//!
//! [dispatcher]
//! thread_name = "audio-dispatcher"
//! shutdown_retries = 2
//! ```

use std::path::Path;
use std::time::Duration;

use asset_manager::DEFAULT_CACHE_BUDGET_BYTES;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Bound on every playback operation; `None` waits indefinitely.
    pub operation_timeout_ms: Option<u64>,
    /// Byte budget of the decoded asset cache.
    pub asset_cache_bytes: usize,
    pub dispatcher: DispatcherConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: None,
            asset_cache_bytes: DEFAULT_CACHE_BUDGET_BYTES,
            dispatcher: DispatcherConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}

/// Worker thread settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherConfig {
    pub thread_name: String,
    /// Wait for the worker's ready signal and for backend initialisation.
    pub startup_timeout_ms: u64,
    /// Graceful drain wait after the first shutdown signal.
    pub shutdown_timeout_ms: u64,
    pub shutdown_retry_timeout_ms: u64,
    /// Abort attempts after the graceful wait before the worker is detached.
    pub shutdown_retries: u32,
    /// How often an idle worker checks the abort flag.
    pub poll_interval_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            thread_name: "audio-dispatcher".to_string(),
            startup_timeout_ms: 5000,
            shutdown_timeout_ms: 5000,
            shutdown_retry_timeout_ms: 1000,
            shutdown_retries: 1,
            poll_interval_ms: 100,
        }
    }
}

impl DispatcherConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn shutdown_retry_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_retry_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        // a zero interval would spin
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
