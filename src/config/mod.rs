//! Configuration module
//!
//! Engine settings, loaded from a config file and overridden by environment
//! variables and command-line flags, in that order.

pub mod env;
pub mod file;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::executor::LockSettings;
use crate::utils::LogLevel;

pub use env::{EnvBuilder, EnvConfig, EnvGuard};
pub use file::ConfigFile;

/// Engine configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on concurrently running tests; unbounded when absent
    pub max_parallel_tests: Option<usize>,

    /// Cancel the run after the first failing test
    pub fail_fast: bool,

    /// Timeout for tests that declare none
    pub default_test_timeout_ms: Option<u64>,

    /// Delay between key lock attempts
    pub lock_poll_interval_ms: u64,

    /// How long to retry key locks before backing off
    pub lock_acquire_window_ms: u64,

    /// Pause after an unsuccessful acquire window
    pub lock_backoff_ms: u64,

    pub log_level: LogLevel,

    /// Output format (table, json, json-pretty, csv, summary)
    pub output_format: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let locks = LockSettings::default();
        Self {
            max_parallel_tests: None,
            fail_fast: false,
            default_test_timeout_ms: None,
            lock_poll_interval_ms: locks.poll_interval.as_millis() as u64,
            lock_acquire_window_ms: locks.acquire_window.as_millis() as u64,
            lock_backoff_ms: locks.backoff.as_millis() as u64,
            log_level: LogLevel::Info,
            output_format: "table".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn lock_settings(&self) -> LockSettings {
        LockSettings {
            poll_interval: Duration::from_millis(self.lock_poll_interval_ms),
            acquire_window: Duration::from_millis(self.lock_acquire_window_ms),
            backoff: Duration::from_millis(self.lock_backoff_ms),
        }
    }

    pub fn default_test_timeout(&self) -> Option<Duration> {
        self.default_test_timeout_ms.map(Duration::from_millis)
    }

    /// Apply environment overrides on top of file values
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(max) = env.max_parallel_tests {
            self.max_parallel_tests = Some(max);
        }
        if let Some(fail_fast) = env.fail_fast {
            self.fail_fast = fail_fast;
        }
        if let Some(level) = env.log_level.as_deref().and_then(LogLevel::parse) {
            self.log_level = level;
        }
        if let Some(format) = &env.format {
            self.output_format = format.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.max_parallel_tests.is_none());
        assert!(!config.fail_fast);
        assert_eq!(config.lock_settings(), LockSettings::default());
        assert!(config.default_test_timeout().is_none());
        assert_eq!(config.output_format, "table");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: EngineConfig =
            serde_yaml::from_str("max_parallel_tests: 8\ndefault_test_timeout_ms: 1500\n").unwrap();
        assert_eq!(config.max_parallel_tests, Some(8));
        assert_eq!(config.default_test_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.lock_backoff_ms, 500);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EngineConfig::default();
        let env = EnvConfig {
            max_parallel_tests: Some(2),
            fail_fast: Some(true),
            log_level: Some("debug".to_string()),
            format: Some("json".to_string()),
            ..Default::default()
        };

        config.apply_env(&env);
        assert_eq!(config.max_parallel_tests, Some(2));
        assert!(config.fail_fast);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.output_format, "json");
    }
}
