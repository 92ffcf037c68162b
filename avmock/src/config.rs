//! Application configuration management.
//!
//! Configuration is loaded from an optional YAML file with environment variable overrides. The
//! configuration file path defaults to `config.yaml` but can be specified via the `-f` flag or the
//! `AVMOCK_CONFIG` environment variable. A missing file is not an error: every field has a default
//! matching the behaviour integration tests expect from the mock.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `AVMOCK_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `AVMOCK_CALLBACK__MAX_ATTEMPTS=5` sets the `callback.max_attempts` field.
//!
//! ## Example
//!
//! ```yaml
//! host: 0.0.0.0
//! port: 8081
//! scan:
//!   infection_probability: 0.01
//!   min_delay: 500ms
//!   max_delay: 2s
//! callback:
//!   timeout: 5m
//!   max_attempts: 3
//!   initial_backoff: 1s
//!   backoff_factor: 2
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "AVMOCK_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Largest request body accepted by `/scan` and `/debug`, in bytes.
    /// Anything bigger is reported as a body read error.
    pub max_body_size: usize,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
    /// Console log output format
    pub log_format: LogFormat,
    /// Simulated scan behaviour
    pub scan: ScanConfig,
    /// Callback delivery behaviour
    pub callback: CallbackConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Knobs for the simulated scan: how long it takes and how often it finds something.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Probability that a scan reports the file as infected
    pub infection_probability: f64,
    /// Lower bound of the simulated scan duration
    #[serde(with = "humantime_serde")]
    pub min_delay: Duration,
    /// Upper bound of the simulated scan duration
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            infection_probability: 0.01,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
        }
    }
}

/// Outbound callback configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CallbackConfig {
    /// Timeout applied to each individual delivery attempt
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Total number of delivery attempts, including the first one
    pub max_attempts: u32,
    /// Backoff before the second attempt
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Multiplier applied to the backoff after each failed attempt
    pub backoff_factor: u32,
    /// User-Agent sent with callback requests
    pub user_agent: String,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            backoff_factor: 2,
            user_agent: "AVScan-Mock/1.0".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            max_body_size: 100 * 1024 * 1024,
            enable_metrics: false,
            log_format: LogFormat::default(),
            scan: ScanConfig::default(),
            callback: CallbackConfig::default(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<(), Error> {
        let probability = self.scan.infection_probability;
        if !(0.0..=1.0).contains(&probability) {
            return Err(Error::InvalidConfig {
                message: format!("scan.infection_probability ({probability}) must be between 0 and 1"),
            });
        }

        if self.scan.min_delay > self.scan.max_delay {
            return Err(Error::InvalidConfig {
                message: format!(
                    "scan.min_delay ({:?}) cannot be greater than scan.max_delay ({:?})",
                    self.scan.min_delay, self.scan.max_delay
                ),
            });
        }

        if self.callback.max_attempts == 0 {
            return Err(Error::InvalidConfig {
                message: "callback.max_attempts must be at least 1".to_string(),
            });
        }

        if self.callback.backoff_factor == 0 {
            return Err(Error::InvalidConfig {
                message: "callback.backoff_factor must be at least 1".to_string(),
            });
        }

        if self.callback.timeout.is_zero() {
            return Err(Error::InvalidConfig {
                message: "callback.timeout must be positive".to_string(),
            });
        }

        if self.max_body_size == 0 {
            return Err(Error::InvalidConfig {
                message: "max_body_size cannot be 0".to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables override specific values
            .merge(Env::prefixed("AVMOCK_").split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
