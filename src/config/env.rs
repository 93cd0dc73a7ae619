//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "PROVING_GROUND";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Phase timeout from PROVING_GROUND_TIMEOUT (milliseconds)
    pub timeout_ms: Option<u64>,
    /// Operand timeout from PROVING_GROUND_ARGUMENT_TIMEOUT (milliseconds)
    pub argument_timeout_ms: Option<u64>,
    /// Comma-separated reporters from PROVING_GROUND_REPORTER
    pub reporters: Option<Vec<String>>,
    /// JUnit file from PROVING_GROUND_JUNIT_OUTPUT
    pub junit_output: Option<String>,
    /// PROVING_GROUND_STOP_ON_FAILURE
    pub stop_on_failure: Option<bool>,
    /// PROVING_GROUND_ALL
    pub show_passed: Option<bool>,
    /// PROVING_GROUND_COLOR
    pub color: Option<bool>,
    /// Config file from PROVING_GROUND_CONFIG
    pub config_file: Option<String>,
    /// PROVING_GROUND_VERBOSE
    pub verbose: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            timeout_ms: get_env_parse("TIMEOUT"),
            argument_timeout_ms: get_env_parse("ARGUMENT_TIMEOUT"),
            reporters: get_env("REPORTER").map(|v| split_list(&v)),
            junit_output: get_env("JUNIT_OUTPUT"),
            stop_on_failure: get_env_bool("STOP_ON_FAILURE"),
            show_passed: get_env_bool("ALL"),
            color: get_env_bool("COLOR"),
            config_file: get_env("CONFIG"),
            verbose: get_env_bool("VERBOSE"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        *self != Self::default()
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

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builder for setting environment variables (useful for testing)
#[derive(Default)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    pub fn timeout(self, ms: u64) -> Self {
        self.set("TIMEOUT", ms.to_string())
    }

    pub fn argument_timeout(self, ms: u64) -> Self {
        self.set("ARGUMENT_TIMEOUT", ms.to_string())
    }

    pub fn reporter(self, reporters: impl Into<String>) -> Self {
        self.set("REPORTER", reporters)
    }

    pub fn junit_output(self, path: impl Into<String>) -> Self {
        self.set("JUNIT_OUTPUT", path)
    }

    pub fn stop_on_failure(self, stop: bool) -> Self {
        self.set("STOP_ON_FAILURE", stop.to_string())
    }

    pub fn color(self, color: bool) -> Self {
        self.set("COLOR", color.to_string())
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
