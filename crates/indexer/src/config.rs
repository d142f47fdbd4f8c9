//! Configuration management for the CreditNet indexer.
//!
//! This module handles loading configuration from:
//! - TOML files
//! - Environment variables referenced as `${VAR_NAME}` inside the file
//! - Default values (fallbacks)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use creditnet_core::constants::{CURRENCY_CODE_LEN, DEFAULT_MAX_HOPS, MAX_HOPS_LIMIT};
use creditnet_core::error::CoreError;

/// Main configuration for the indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ledger network configuration
    pub ledger: LedgerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Ingestion pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ledger network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Feed URL of the ledger transaction subscription (informational; the
    /// transport wiring the feed owns the connection lifecycle).
    pub feed_url: String,

    /// The single in-scope 3-character currency code (e.g. "WFI").
    pub currency: String,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://creditnet.db")
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Ingestion pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Timeout applied to each graph/history store call, in milliseconds.
    /// A timed-out graph mutation is treated as a store failure.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Default hop bound for capacity queries.
    #[serde(default = "default_max_hops")]
    pub max_hops: u32,

    /// Buffer size of the feed channel between transport and pipeline.
    #[serde(default = "default_feed_buffer")]
    pub feed_buffer: usize,
}

impl PipelineConfig {
    /// The store timeout as a [`Duration`].
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: default_store_timeout_ms(),
            max_hops: default_max_hops(),
            feed_buffer: default_feed_buffer(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_store_timeout_ms() -> u64 {
    5000
}

fn default_max_hops() -> u32 {
    DEFAULT_MAX_HOPS
}

fn default_feed_buffer() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables can be referenced using `${VAR_NAME}` syntax.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let expanded = expand_env_vars(&contents)?;

        let config: Config = toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml).context("Failed to parse TOML configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.ledger.feed_url.is_empty() {
            anyhow::bail!("Ledger feed_url cannot be empty");
        }

        if self.ledger.currency.len() != CURRENCY_CODE_LEN {
            return Err(CoreError::InvalidCurrency(self.ledger.currency.clone()).into());
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be > 0");
        }
        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot exceed max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.pipeline.store_timeout_ms == 0 {
            anyhow::bail!("Pipeline store_timeout_ms must be > 0");
        }
        if self.pipeline.max_hops == 0 || self.pipeline.max_hops > MAX_HOPS_LIMIT {
            anyhow::bail!(
                "Pipeline max_hops must be between 1 and {} (got {})",
                MAX_HOPS_LIMIT,
                self.pipeline.max_hops
            );
        }
        if self.pipeline.feed_buffer == 0 {
            anyhow::bail!("Pipeline feed_buffer must be > 0");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Logging level must be one of: {} (got '{}')",
                valid_levels.join(", "),
                self.logging.level
            );
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!(
                "Logging format must be one of: {} (got '{}')",
                valid_formats.join(", "),
                self.logging.format
            );
        }

        Ok(())
    }
}

/// Expand `${VAR_NAME}` placeholders against the process environment.
///
/// Fails if a referenced variable is unset; a literal `$` not followed by
/// `{` passes through untouched.
fn expand_env_vars(input: &str) -> Result<String> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'{') {
            result.push(ch);
            continue;
        }
        chars.next(); // consume '{'

        let mut name = String::new();
        for inner in chars.by_ref() {
            if inner == '}' {
                break;
            }
            name.push(inner);
        }

        if name.is_empty() {
            anyhow::bail!("Empty environment variable reference `${{}}` in config");
        }

        let value = std::env::var(&name)
            .with_context(|| format!("Environment variable {name} referenced in config is not set"))?;
        result.push_str(&value);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> String {
        r#"
            [ledger]
            feed_url = "wss://feed.example.net"
            currency = "WFI"

            [database]
            url = "sqlite://creditnet.db"
        "#
        .to_string()
    }

    #[test]
    fn minimal_config_applies_defaults() {
        let config = Config::from_toml_str(&minimal_toml()).unwrap();

        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.min_connections, 1);
        assert_eq!(config.pipeline.store_timeout_ms, 5000);
        assert_eq!(config.pipeline.max_hops, 3);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(
            config.pipeline.store_timeout(),
            Duration::from_millis(5000)
        );
    }

    #[test]
    fn rejects_bad_currency_code() {
        let toml = minimal_toml().replace("\"WFI\"", "\"WUFI\"");
        let err = Config::from_toml_str(&toml).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::InvalidCurrency(code)) if code == "WUFI"
        ));
    }

    #[test]
    fn rejects_out_of_range_hop_bound() {
        let mut toml = minimal_toml();
        toml.push_str("\n[pipeline]\nmax_hops = 40\n");
        assert!(Config::from_toml_str(&toml).is_err());
    }

    #[test]
    fn rejects_inverted_pool_sizes() {
        let toml = minimal_toml().replace(
            "url = \"sqlite://creditnet.db\"",
            "url = \"sqlite://creditnet.db\"\nmax_connections = 2\nmin_connections = 5",
        );
        assert!(Config::from_toml_str(&toml).is_err());
    }

    #[test]
    fn expands_env_vars() {
        std::env::set_var("CREDITNET_TEST_DB", "sqlite://expanded.db");
        let expanded = expand_env_vars("url = \"${CREDITNET_TEST_DB}\"").unwrap();
        assert_eq!(expanded, "url = \"sqlite://expanded.db\"");
    }

    #[test]
    fn missing_env_var_is_an_error() {
        assert!(expand_env_vars("url = \"${CREDITNET_DEFINITELY_UNSET}\"").is_err());
    }
}
