//! Configuration management for Bitext Server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub translation: TranslationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root for per-session uploads and outputs
    pub data_dir: PathBuf,
    /// Root for the on-disk translation cache
    pub cache_dir: PathBuf,
    /// Entries kept in the in-memory cache layer
    pub cache_memory_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Inactivity window after which a session expires
    pub timeout_hours: i64,
    /// How often the background sweep runs
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationConfig {
    /// Timeout for a single outbound provider call
    pub provider_timeout_secs: u64,
    /// Attempts per block, including the first one
    pub retry_attempts: u32,
    /// Base delay for exponential backoff between attempts
    pub retry_base_delay_ms: u64,
    /// Pause after every provider call within one task
    pub inter_call_delay_ms: u64,
    /// Minimum fraction of fragments the integrity check must recover
    pub integrity_threshold: f64,
}

impl SessionConfig {
    pub fn timeout(&self) -> chrono::Duration {
        chrono::Duration::hours(self.timeout_hours)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl TranslationConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn inter_call_delay(&self) -> Duration {
        Duration::from_millis(self.inter_call_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("./data"),
                cache_dir: PathBuf::from("./data/cache"),
                cache_memory_entries: 10_000,
            },
            session: SessionConfig {
                timeout_hours: 24,
                sweep_interval_secs: 600,
            },
            translation: TranslationConfig {
                provider_timeout_secs: 120,
                retry_attempts: 3,
                retry_base_delay_ms: 1000,
                inter_call_delay_ms: 0,
                integrity_threshold: 0.6,
            },
        }
    }
}

impl Config {
    /// Build the configuration from environment variables.
    ///
    /// Every variable is optional; unset ones keep their default. A variable
    /// that is set but fails to parse is an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage.data_dir);
        let cache_dir = env::var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("cache"));

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
            },
            storage: StorageConfig {
                data_dir,
                cache_dir,
                cache_memory_entries: parse_var(
                    "CACHE_MEMORY_ENTRIES",
                    defaults.storage.cache_memory_entries,
                )?,
            },
            session: SessionConfig {
                timeout_hours: parse_var("SESSION_TIMEOUT_HOURS", defaults.session.timeout_hours)?,
                sweep_interval_secs: parse_var(
                    "SESSION_SWEEP_INTERVAL_SECS",
                    defaults.session.sweep_interval_secs,
                )?,
            },
            translation: TranslationConfig {
                provider_timeout_secs: parse_var(
                    "PROVIDER_TIMEOUT_SECS",
                    defaults.translation.provider_timeout_secs,
                )?,
                retry_attempts: parse_var("RETRY_ATTEMPTS", defaults.translation.retry_attempts)?,
                retry_base_delay_ms: parse_var(
                    "RETRY_BASE_DELAY_MS",
                    defaults.translation.retry_base_delay_ms,
                )?,
                inter_call_delay_ms: parse_var(
                    "INTER_CALL_DELAY_MS",
                    defaults.translation.inter_call_delay_ms,
                )?,
                integrity_threshold: parse_var(
                    "INTEGRITY_THRESHOLD",
                    defaults.translation.integrity_threshold,
                )?,
            },
        })
    }

    /// Configuration rooted in a scratch directory, with no retry delays.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let mut config = Config::default();
        config.storage.cache_dir = data_dir.join("cache");
        config.storage.data_dir = data_dir;
        config.translation.retry_base_delay_ms = 0;
        config
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.session.timeout_hours, 24);
        assert_eq!(config.translation.retry_attempts, 3);
        assert!((config.translation.integrity_threshold - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_for_data_dir() {
        let config = Config::for_data_dir("/tmp/bitext");
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/bitext"));
        assert_eq!(config.storage.cache_dir, PathBuf::from("/tmp/bitext/cache"));
        assert_eq!(config.translation.retry_base_delay(), Duration::ZERO);
    }

    #[test]
    fn test_parse_var_missing_uses_default() {
        let value: u16 = parse_var("BITEXT_TEST_SURELY_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }
}
