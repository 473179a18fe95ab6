//! Engine configuration and validation.
//!
//! [`EngineConfig`] is plain data with serde support so it can be loaded
//! from a JSON file. [`validate()`](EngineConfig::validate) checks it before
//! a worker thread is spawned.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── EngineConfig ───────────────────────────────────────────────────

/// Pipeline engine settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run a full preflight pass before executing, and refuse to execute
    /// if it fails. Default: true.
    pub preflight_before_execute: bool,
    /// After each executed stage, re-check the data-model invariants and
    /// fail that stage if they are broken. Default: true.
    pub validate_after_stage: bool,
    /// Capacity of the worker's event channel. Must be at least 1.
    /// Default: 256.
    pub event_capacity: usize,
    /// Name of the worker thread. Must be non-empty.
    /// Default: `"grainflow-pipeline"`.
    pub thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preflight_before_execute: true,
            validate_after_stage: true,
            event_capacity: 256,
            thread_name: "grainflow-pipeline".to_string(),
        }
    }
}

impl EngineConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroEventCapacity);
        }
        if self.thread_name.trim().is_empty() {
            return Err(ConfigError::EmptyThreadName);
        }
        Ok(())
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected by [`EngineConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `event_capacity` is zero.
    #[error("event channel capacity must be at least 1")]
    ZeroEventCapacity,
    /// `thread_name` is empty or whitespace.
    #[error("worker thread name must not be empty")]
    EmptyThreadName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.preflight_before_execute);
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = EngineConfig {
            event_capacity: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroEventCapacity));
    }

    #[test]
    fn blank_thread_name_rejected() {
        let config = EngineConfig {
            thread_name: "  ".into(),
            ..EngineConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyThreadName));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"preflight_before_execute": false}"#).unwrap();
        assert!(!config.preflight_before_execute);
        assert!(config.validate_after_stage);
        assert_eq!(config.thread_name, "grainflow-pipeline");
    }
}
