//! Configuration management for tracelight.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "tracelight";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "documents.db";

/// Environment variable prefix.
const ENV_PREFIX: &str = "TRACELIGHT_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `TRACELIGHT_`, sections split by `__`)
/// 2. TOML config file at `~/.config/tracelight/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Trace retention bounds.
    pub trace: TraceConfig,
    /// Adaptive dispatch configuration.
    pub dispatch: DispatchConfig,
    /// Speech recognition session configuration.
    pub recognition: RecognitionConfig,
    /// Document storage configuration.
    pub storage: StorageConfig,
}

/// Bounds for trail and merged-stream retention.
///
/// Once a sequence grows past its capacity it is trimmed down to the most
/// recent `retain` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Per-trail length that triggers trimming.
    pub trail_capacity: usize,
    /// Per-trail length kept after trimming.
    pub trail_retain: usize,
    /// Merged stream length that triggers trimming.
    pub global_capacity: usize,
    /// Merged stream length kept after trimming.
    pub global_retain: usize,
}

/// Fallback catalog configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Lower bound of the simulated fallback latency.
    pub min_latency_ms: u64,
    /// Upper bound of the simulated fallback latency.
    pub max_latency_ms: u64,
}

/// Recognition session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// BCP 47 language tag passed to the platform recognizer.
    pub language: String,
    /// Keep listening across pauses instead of stopping after one phrase.
    pub continuous: bool,
    /// Ask the platform for interim (non-final) results.
    pub interim_results: bool,
    /// Delay before the first restart after an unexpected end.
    pub restart_delay_ms: u64,
    /// Delay before the single retry when a restart attempt fails.
    pub retry_delay_ms: u64,
}

/// Document storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/tracelight/documents.db`
    pub database_path: Option<PathBuf>,
    /// Maximum chunk size in bytes when splitting documents.
    pub max_chunk_size: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            trail_capacity: 100,
            trail_retain: 50,
            global_capacity: 1000,
            global_retain: 500,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            min_latency_ms: 100,
            max_latency_ms: 400,
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            continuous: true,
            interim_results: true,
            restart_delay_ms: 500,
            retry_delay_ms: 2000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_chunk_size: 1000,
        }
    }
}

impl DispatchConfig {
    /// A configuration with no simulated latency.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            min_latency_ms: 0,
            max_latency_ms: 0,
        }
    }
}

impl RecognitionConfig {
    /// Delay before the first restart attempt.
    #[must_use]
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    /// Delay before the retry that follows a failed restart.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails, or if the
    /// resulting configuration does not validate.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        check_bounds("trail", self.trace.trail_retain, self.trace.trail_capacity)?;
        check_bounds("global", self.trace.global_retain, self.trace.global_capacity)?;

        if self.dispatch.min_latency_ms > self.dispatch.max_latency_ms {
            return Err(Error::ConfigValidation {
                message: format!(
                    "min_latency_ms ({}) cannot be greater than max_latency_ms ({})",
                    self.dispatch.min_latency_ms, self.dispatch.max_latency_ms
                ),
            });
        }

        if self.recognition.restart_delay_ms == 0 || self.recognition.retry_delay_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "restart_delay_ms and retry_delay_ms must be greater than 0".to_string(),
            });
        }

        if self.recognition.language.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "recognition language must not be empty".to_string(),
            });
        }

        if self.storage.max_chunk_size == 0 {
            return Err(Error::ConfigValidation {
                message: "max_chunk_size must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }
}

fn check_bounds(name: &str, retain: usize, capacity: usize) -> Result<()> {
    if retain == 0 || retain > capacity {
        return Err(Error::ConfigValidation {
            message: format!(
                "{name}_retain ({retain}) must be between 1 and {name}_capacity ({capacity})"
            ),
        });
    }
    Ok(())
}
