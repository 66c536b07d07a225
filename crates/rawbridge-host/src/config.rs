//! Host configuration.
//!
//! Every field is optional in TOML; missing keys keep their defaults and
//! unknown keys are rejected.
//!
//! ```toml
//! worker_threads = 2
//! max_blocking_threads = 4
//! thread_name = "raw-decode"
//!
//! [params]
//! output_color = "Adobe"
//! output_bps = 8
//! half_size = true
//! ```

use std::path::Path;

use rawbridge_core::ProcessingParams;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Async worker threads driving the per-context drain loops.
    pub worker_threads: usize,
    /// Upper bound on threads running engine calls at the same time.
    pub max_blocking_threads: usize,
    pub thread_name: String,
    /// Parameters new processors start with.
    pub params: ProcessingParams,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            worker_threads: 1,
            max_blocking_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            thread_name: "rawbridge-worker".to_string(),
            params: ProcessingParams::default(),
        }
    }
}

impl HostConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, BridgeError> {
        let config: HostConfig =
            toml::from_str(source).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, BridgeError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.worker_threads == 0 {
            return Err(BridgeError::Config(
                "worker_threads must be at least 1".into(),
            ));
        }
        if self.max_blocking_threads == 0 {
            return Err(BridgeError::Config(
                "max_blocking_threads must be at least 1".into(),
            ));
        }
        let gamma = self.params.gamma;
        if !(gamma.power.is_finite() && gamma.power > 0.0 && gamma.slope.is_finite() && gamma.slope > 0.0)
        {
            return Err(BridgeError::Config(
                "params.gamma values must be finite and positive".into(),
            ));
        }
        Ok(())
    }
}
