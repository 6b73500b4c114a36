use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::models::job::{MAX_RETRY_LIMIT, MIN_RETRY_LIMIT};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid port: 0")]
    InvalidPort,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid retry default: {0}. Must be between {MIN_RETRY_LIMIT} and {MAX_RETRY_LIMIT}")]
    InvalidRetryDefault(u32),

    #[error("Invalid poll interval: {0}s. Must be positive and no greater than the poll timeout ({1}s)")]
    InvalidPollInterval(u64, u64),

    #[error("Invalid test timeout: 0. Must be positive")]
    InvalidTestTimeout,

    #[error("Workspace root cannot be empty")]
    EmptyWorkspaceRoot,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. mender.yaml in the working directory
    /// 3. Environment variables (MENDER_* prefix, `__` nesting separator)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("mender.yaml"))
            .merge(Env::prefixed("MENDER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("MENDER_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(ConfigError::InvalidLogLevel(other.to_string())),
        }

        match config.logging.format.as_str() {
            "json" | "pretty" => {}
            other => return Err(ConfigError::InvalidLogFormat(other.to_string())),
        }

        if !(MIN_RETRY_LIMIT..=MAX_RETRY_LIMIT).contains(&config.retry.default_limit) {
            return Err(ConfigError::InvalidRetryDefault(config.retry.default_limit));
        }

        if config.github.poll_interval_secs == 0
            || config.github.poll_interval_secs > config.github.poll_timeout_secs
        {
            return Err(ConfigError::InvalidPollInterval(
                config.github.poll_interval_secs,
                config.github.poll_timeout_secs,
            ));
        }

        if config.runner.test_timeout_secs == 0 {
            return Err(ConfigError::InvalidTestTimeout);
        }

        if config.workspace.root.trim().is_empty() {
            return Err(ConfigError::EmptyWorkspaceRoot);
        }

        Ok(())
    }
}
