//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "TESTGRID";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Concurrency limit from TESTGRID_MAX_PARALLEL_TESTS
    pub max_parallel_tests: Option<usize>,
    /// Fail-fast from TESTGRID_FAIL_FAST
    pub fail_fast: Option<bool>,
    /// Config file from TESTGRID_CONFIG
    pub config_file: Option<String>,
    /// Log level from TESTGRID_LOG
    pub log_level: Option<String>,
    /// Output format from TESTGRID_FORMAT
    pub format: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            max_parallel_tests: get_env_parse("MAX_PARALLEL_TESTS"),
            fail_fast: get_env_bool("FAIL_FAST"),
            config_file: get_env("CONFIG"),
            log_level: get_env("LOG"),
            format: get_env("FORMAT"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.max_parallel_tests.is_some()
            || self.fail_fast.is_some()
            || self.config_file.is_some()
            || self.log_level.is_some()
            || self.format.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_MAX_PARALLEL_TESTS: {:?}", ENV_PREFIX, self.max_parallel_tests);
        println!("  {}_FAIL_FAST:          {:?}", ENV_PREFIX, self.fail_fast);
        println!("  {}_CONFIG:             {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_LOG:                {:?}", ENV_PREFIX, self.log_level);
        println!("  {}_FORMAT:             {:?}", ENV_PREFIX, self.format);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables (useful for testing)
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    /// Create a new environment builder
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    pub fn max_parallel_tests(mut self, max: usize) -> Self {
        self.vars
            .push((format!("{ENV_PREFIX}_MAX_PARALLEL_TESTS"), max.to_string()));
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.vars
            .push((format!("{ENV_PREFIX}_FAIL_FAST"), fail_fast.to_string()));
        self
    }

    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_CONFIG"), path.into()));
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_LOG"), level.into()));
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_FORMAT"), format.into()));
        self
    }

    /// Apply environment variables
    pub fn apply(self) {
        for (key, value) in self.vars {
            env::set_var(key, value);
        }
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        self.apply();

        EnvGuard { previous }
    }
}

impl Default for EnvBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all TESTGRID environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_MAX_PARALLEL_TESTS  Maximum concurrently running tests");
    println!("  {ENV_PREFIX}_FAIL_FAST           Cancel the run on the first failure (true/false)");
    println!("  {ENV_PREFIX}_CONFIG              Path to configuration file");
    println!("  {ENV_PREFIX}_LOG                 Log level (trace, debug, info, warn, error)");
    println!("  {ENV_PREFIX}_FORMAT              Output format (table, json, csv)");
    println!("  RUST_LOG                      Full tracing filter, overrides {ENV_PREFIX}_LOG");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_MAX_PARALLEL_TESTS=8");
    println!("  testgrid run suite.yaml");
}
