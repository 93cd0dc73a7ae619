//! Configuration module
//!
//! Handles loading and managing configuration. Values come from a config
//! file, then `PROVING_GROUND_*` environment variables, then CLI flags.

mod env;
mod file;

pub use env::{EnvBuilder, EnvConfig, EnvGuard};
pub use file::{expand_path, is_yaml_file, CONFIG_LOCATIONS};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::executor::CaseSettings;
use crate::output::ReporterKind;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Time allowed for each test phase, in milliseconds
    pub timeout_ms: u64,

    /// Time allowed for deferred assertion operands, in milliseconds
    pub argument_timeout_ms: u64,

    /// Reporters to run after the tests (console, junit)
    pub reporters: Vec<String>,

    /// Where the JUnit reporter writes
    pub junit_output: String,

    /// Stop after the first failing suite or test
    pub stop_on_failure: bool,

    /// Show passing suites and tests in the console report
    pub show_passed: bool,

    /// Colorize console output
    pub color: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            argument_timeout_ms: 3000,
            reporters: vec!["console".to_string()],
            junit_output: "testlog.xml".to_string(),
            stop_on_failure: false,
            show_passed: false,
            color: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load from the first standard location that exists, or defaults
    pub fn load_default() -> Result<Self> {
        match file::find() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            bail!("timeout_ms must be greater than zero");
        }
        if self.argument_timeout_ms == 0 {
            bail!("argument_timeout_ms must be greater than zero");
        }
        if let Some(unknown) = self
            .reporters
            .iter()
            .find(|name| ReporterKind::from_str(name).is_none())
        {
            bail!("Unknown reporter '{}' in config", unknown);
        }
        Ok(())
    }

    /// Overlay values set in the environment
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(timeout) = env.timeout_ms {
            self.timeout_ms = timeout;
        }
        if let Some(timeout) = env.argument_timeout_ms {
            self.argument_timeout_ms = timeout;
        }
        if let Some(reporters) = &env.reporters {
            self.reporters = reporters.clone();
        }
        if let Some(output) = &env.junit_output {
            self.junit_output = output.clone();
        }
        if let Some(stop) = env.stop_on_failure {
            self.stop_on_failure = stop;
        }
        if let Some(all) = env.show_passed {
            self.show_passed = all;
        }
        if let Some(color) = env.color {
            self.color = color;
        }
    }

    pub fn case_settings(&self) -> CaseSettings {
        CaseSettings {
            timeout: Duration::from_millis(self.timeout_ms),
            argument_timeout: Duration::from_millis(self.argument_timeout_ms),
        }
    }

    pub fn junit_path(&self) -> PathBuf {
        expand_path(&self.junit_output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.reporters, ["console"]);
        assert!(config.color);
        assert_eq!(config.case_settings(), CaseSettings::default());
    }

    #[test]
    fn test_yaml_roundtrip_with_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("proving-ground.yaml");
        std::fs::write(&path, "timeout_ms: 250\nreporters: [console, junit]\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.argument_timeout_ms, 3000);
        assert_eq!(config.reporters.len(), 2);

        let copy = dir.path().join("nested").join("copy.json");
        config.save(&copy).unwrap();
        assert_eq!(AppConfig::load(&copy).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_unknown_reporter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"reporters": ["tap"]}"#).unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("tap"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = AppConfig {
            timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_env() {
        let mut config = AppConfig::default();
        let env = EnvConfig {
            timeout_ms: Some(100),
            reporters: Some(vec!["junit".to_string()]),
            color: Some(false),
            ..Default::default()
        };

        config.apply_env(&env);
        assert_eq!(config.timeout_ms, 100);
        assert_eq!(config.reporters, ["junit"]);
        assert!(!config.color);
        assert_eq!(config.argument_timeout_ms, 3000);
    }
}
