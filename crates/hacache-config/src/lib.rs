//! # hacache Configuration
//!
//! Environment-based configuration for applications embedding the cache
//! client. Values are read once, parsed into typed settings and rejected
//! early when malformed; the HA toggle becomes a [`HaMode`] here so nothing
//! downstream compares strings.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod logging;

use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::num::{NonZeroU64, NonZeroUsize};
use std::str::FromStr;
use std::time::Duration;

use hacache_domain::{
    CacheSettings, Credentials, HaMode, NodeAddress, SentinelSettings, SentinelValidation,
    SettingsError, DEFAULT_MAX_CONNECTIONS, DEFAULT_NODE_PORT, DEFAULT_OPERATION_TIMEOUT,
    DEFAULT_SENTINEL_PORT,
};
use thiserror::Error;

pub use logging::{LoggingError, init as init_logging, log_file_path};

/// Files read by [`Config::load`] before the process environment
pub const ENV_FILES: [&str; 2] = ["configs/config.env", ".env"];

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache client settings
    pub cache: CacheSettings,

    /// Database section
    pub db: DbConfig,

    /// Log file settings
    pub logger: LoggerConfig,
}

/// Database connection settings carried alongside the cache settings
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DbConfig {
    pub driver: String,
    pub host: String,
    pub port: String,
    pub name: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Log file configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Directory of the daily log file; empty means the working directory
    pub path: String,

    /// Filter used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {source}")]
    Invalid {
        var: &'static str,
        #[source]
        source: SettingsError,
    },

    #[error("Invalid number for {var}: '{value}'")]
    InvalidNumber { var: &'static str, value: String },
}

impl Config {
    /// Load `.env` files, then read the process environment
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is present but malformed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("."))
    }

    /// Read [`ENV_FILES`] relative to `dir` and resolve every variable
    /// against the process environment first, then the files in order.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is present but malformed.
    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let mut files = HashMap::new();
        for file in ENV_FILES {
            let path = dir.join(file);
            let Ok(entries) = dotenvy::from_path_iter(&path) else {
                continue;
            };
            for (name, value) in entries.flatten() {
                files.entry(name).or_insert(value);
            }
            tracing::debug!(file = %path.display(), "Loaded environment file");
        }

        Self::from_lookup(|name| env::var(name).ok().or_else(|| files.get(name).cloned()))
    }

    /// Read configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is present but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).unwrap_or_default();

        let ha_mode = parse_setting::<HaMode, _>(&lookup, "REDIS_ENABLE_HA")?.unwrap_or_default();

        let sentinel = SentinelSettings {
            master_name: var("REDIS_MASTER_NAME"),
            hosts: [
                var("REDIS_SENTINEL_IP1"),
                var("REDIS_SENTINEL_IP2"),
                var("REDIS_SENTINEL_IP3"),
            ],
            port: port_setting(&lookup, "REDIS_SENTINEL_PORT")?.unwrap_or(DEFAULT_SENTINEL_PORT),
            password: lookup("REDIS_AUTH_HA").filter(|p| !p.is_empty()),
            query_host: lookup("CACHE_SENTINEL_QUERY_HOST").filter(|h| !h.is_empty()),
            validation: parse_setting::<SentinelValidation, _>(&lookup, "CACHE_SENTINEL_VALIDATION")?
                .unwrap_or_default(),
        };

        let host = lookup("REDIS_HOST")
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| NodeAddress::default().host);

        let cache = CacheSettings {
            node: NodeAddress::new(
                host,
                port_setting(&lookup, "REDIS_PORT")?.unwrap_or(DEFAULT_NODE_PORT),
            ),
            credentials: Credentials::new(lookup("REDIS_USER"), lookup("REDIS_PASSWORD")),
            ha_mode,
            sentinel,
            default_expiry_secs: number_setting(&lookup, "REDIS_DEFAULT_EXPIRY")?.unwrap_or(0),
            max_connections: number_setting(&lookup, "REDIS_MAX_CONNECTIONS")?
                .map_or(DEFAULT_MAX_CONNECTIONS, NonZeroUsize::get),
            operation_timeout: number_setting::<NonZeroU64, _>(&lookup, "CACHE_OPERATION_TIMEOUT_MS")?
                .map_or(DEFAULT_OPERATION_TIMEOUT, |ms| Duration::from_millis(ms.get())),
        };

        Ok(Self {
            cache,
            db: DbConfig {
                driver: var("DB_DRIVER"),
                host: var("DB_HOST"),
                port: var("DB_PORT"),
                name: var("DB_DATABASE"),
                username: var("DB_USERNAME"),
                password: var("DB_PASSWORD"),
            },
            logger: LoggerConfig {
                path: var("LOG_PATH"),
                level: lookup("LOG_LEVEL")
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| LoggerConfig::default().level),
            },
        })
    }
}

fn parse_setting<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr<Err = SettingsError>,
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| value.parse().map_err(|source| ConfigError::Invalid { var, source }))
        .transpose()
}

fn port_setting<F>(lookup: &F, var: &'static str) -> Result<Option<u16>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .filter(|v| !v.is_empty())
        .map(|value| {
            hacache_domain::parse_port(&value).map_err(|source| ConfigError::Invalid { var, source })
        })
        .transpose()
}

fn number_setting<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .filter(|v| !v.is_empty())
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber { var, value })
        })
        .transpose()
}
