//! Cache client error types

use std::fmt;

use hacache_domain::SettingsError;
use thiserror::Error;

/// Facade operation an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Set,
    Get,
    FindKeys,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Get => "get",
            Self::FindKeys => "find_keys",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification used by callers to branch on failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TopologyResolution,
    Connection,
    Pool,
    Operation,
    Timeout,
    InvalidSettings,
}

/// Cache client errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Topology resolution for master '{master_name}' via sentinel {sentinel} failed: {reason}")]
    TopologyResolution {
        master_name: String,
        sentinel: String,
        reason: String,
    },

    #[error("Connection to {address} failed: {reason}")]
    Connection { address: String, reason: String },

    #[error("Connection pool for {address} exhausted ({max_size} connections)")]
    PoolExhausted { address: String, max_size: usize },

    #[error("Connection pool for {address} unavailable: {reason}")]
    Pool { address: String, reason: String },

    #[error("Error occurred during {operation} of key '{key}'{} on {address}: {reason}", value_context(.value))]
    Operation {
        operation: Operation,
        key: String,
        value: Option<String>,
        address: String,
        reason: String,
    },

    #[error("{operation} of key '{key}' timed out after {timeout_ms}ms")]
    Timeout {
        operation: Operation,
        key: String,
        timeout_ms: u64,
    },

    #[error("Invalid cache settings: {0}")]
    InvalidSettings(#[from] SettingsError),
}

fn value_context(value: &Option<String>) -> String {
    value
        .as_ref()
        .map(|v| format!(" with value '{v}'"))
        .unwrap_or_default()
}

impl CacheError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::TopologyResolution { .. } => ErrorKind::TopologyResolution,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::PoolExhausted { .. } | Self::Pool { .. } => ErrorKind::Pool,
            Self::Operation { .. } => ErrorKind::Operation,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidSettings(_) => ErrorKind::InvalidSettings,
        }
    }

    pub(crate) fn connection(address: impl fmt::Display, err: &redis::RedisError) -> Self {
        Self::Connection {
            address: address.to_string(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn operation(
        operation: Operation,
        key: &str,
        value: Option<String>,
        address: impl fmt::Display,
        err: &redis::RedisError,
    ) -> Self {
        Self::Operation {
            operation,
            key: key.to_string(),
            value,
            address: address.to_string(),
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
