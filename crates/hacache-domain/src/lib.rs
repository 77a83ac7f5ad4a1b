//! # hacache - Domain Model
//!
//! Settings snapshot and value objects shared by the configuration provider
//! and the HA-aware cache client. A [`CacheSettings`] value is built once
//! (usually by `hacache-config`) and never mutated afterwards; the client
//! only reads it.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// DEFAULTS
// =============================================================================

/// Default port of a standalone cache node
pub const DEFAULT_NODE_PORT: u16 = 6379;

/// Default port shared by the sentinel processes
pub const DEFAULT_SENTINEL_PORT: u16 = 26379;

/// Upper bound of concurrently open direct connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 12_000;

/// Deadline applied to every cache operation
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of sentinel endpoints a master set is monitored by
pub const SENTINEL_COUNT: usize = 3;

const LOOPBACK_HOST: &str = "127.0.0.1";

// =============================================================================
// ENUMS
// =============================================================================

/// Cache deployment mode, parsed once from the HA toggle.
///
/// Only the literal `"true"` selects HA; `"false"` or an empty value selects
/// standalone. Matching is case-sensitive and anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaMode {
    /// Single node at a fixed address
    #[default]
    Standalone,
    /// Primary resolved through the sentinel quorum on every call
    HighAvailability,
}

impl HaMode {
    #[must_use]
    pub const fn is_high_availability(self) -> bool {
        matches!(self, Self::HighAvailability)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standalone => "standalone",
            Self::HighAvailability => "high_availability",
        }
    }
}

impl FromStr for HaMode {
    type Err = SettingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "true" => Ok(Self::HighAvailability),
            "false" | "" => Ok(Self::Standalone),
            other => Err(SettingsError::InvalidHaMode(other.to_string())),
        }
    }
}

impl fmt::Display for HaMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How sentinel settings are checked before a topology lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentinelValidation {
    /// Attempt the lookup anyway and surface whatever the network reports
    #[default]
    BestEffort,
    /// Reject an empty master name or sentinel host before any I/O
    Strict,
}

impl FromStr for SentinelValidation {
    type Err = SettingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().replace('-', "_").as_str() {
            "" | "best_effort" => Ok(Self::BestEffort),
            "strict" => Ok(Self::Strict),
            _ => Err(SettingsError::InvalidValidation(value.to_string())),
        }
    }
}

// =============================================================================
// VALUE OBJECTS
// =============================================================================

/// Host and port of a cache or sentinel node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl Default for NodeAddress {
    fn default() -> Self {
        Self::new(LOOPBACK_HOST, DEFAULT_NODE_PORT)
    }
}

/// Parse a TCP port.
///
/// # Errors
///
/// Returns [`SettingsError::InvalidPort`] for anything that is not a `u16`.
pub fn parse_port(value: &str) -> Result<u16, SettingsError> {
    value
        .trim()
        .parse()
        .map_err(|_| SettingsError::InvalidPort(value.to_string()))
}

/// Node credentials. Empty strings are treated as absent.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: Option<String>,
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
}

/// Authentication handshake derived from [`Credentials`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth<'a> {
    None,
    Password(&'a str),
    UserPassword { username: &'a str, password: &'a str },
}

impl Credentials {
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        Self {
            username: username.filter(|u| !u.is_empty()),
            password: password.filter(|p| !p.is_empty()),
        }
    }

    /// Username and password when both are set, password alone when only it
    /// is set, otherwise no authentication.
    #[must_use]
    pub fn auth(&self) -> Auth<'_> {
        let username = self.username.as_deref().filter(|u| !u.is_empty());
        let password = self.password.as_deref().filter(|p| !p.is_empty());

        match (username, password) {
            (Some(username), Some(password)) => Auth::UserPassword { username, password },
            (None, Some(password)) => Auth::Password(password),
            _ => Auth::None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Sentinel quorum settings for HA mode
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentinelSettings {
    /// Logical master set name known to the sentinels
    pub master_name: String,
    /// Sentinel hosts; all share [`Self::port`]
    pub hosts: [String; SENTINEL_COUNT],
    pub port: u16,
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
    /// Host the primary lookup is sent to; loopback when unset
    pub query_host: Option<String>,
    pub validation: SentinelValidation,
}

impl SentinelSettings {
    pub fn new(
        master_name: impl Into<String>,
        hosts: [String; SENTINEL_COUNT],
        port: u16,
    ) -> Self {
        Self {
            master_name: master_name.into(),
            hosts,
            port,
            ..Self::default()
        }
    }

    /// Every sentinel endpoint as `host:port`, in configured order
    #[must_use]
    pub fn addresses(&self) -> Vec<NodeAddress> {
        self.hosts
            .iter()
            .map(|host| NodeAddress::new(host.clone(), self.port))
            .collect()
    }

    /// Endpoint that answers the primary lookup
    #[must_use]
    pub fn query_address(&self) -> NodeAddress {
        let host = self
            .query_host
            .as_deref()
            .filter(|h| !h.is_empty())
            .unwrap_or(LOOPBACK_HOST);
        NodeAddress::new(host, self.port)
    }

    /// Check that the master name and every sentinel host are set.
    ///
    /// # Errors
    ///
    /// Returns the first missing field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.master_name.trim().is_empty() {
            return Err(SettingsError::MissingMasterName);
        }
        if let Some(index) = self.hosts.iter().position(|h| h.trim().is_empty()) {
            return Err(SettingsError::MissingSentinelHost { index: index + 1 });
        }
        Ok(())
    }
}

impl Default for SentinelSettings {
    fn default() -> Self {
        Self {
            master_name: String::new(),
            hosts: Default::default(),
            port: DEFAULT_SENTINEL_PORT,
            password: None,
            query_host: None,
            validation: SentinelValidation::default(),
        }
    }
}

impl fmt::Debug for SentinelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentinelSettings")
            .field("master_name", &self.master_name)
            .field("hosts", &self.hosts)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("query_host", &self.query_host)
            .field("validation", &self.validation)
            .finish()
    }
}

// =============================================================================
// CACHE SETTINGS
// =============================================================================

/// Immutable snapshot consumed by the cache client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Direct node, used in standalone mode
    pub node: NodeAddress,
    pub credentials: Credentials,
    pub ha_mode: HaMode,
    pub sentinel: SentinelSettings,
    /// Applied when a write asks for the default expiry; `0` disables expiry
    pub default_expiry_secs: u64,
    /// Bound of the direct connection pool
    pub max_connections: usize,
    pub operation_timeout: Duration,
}

impl CacheSettings {
    /// Standalone settings for a single node
    pub fn standalone(host: impl Into<String>, port: u16) -> Self {
        Self {
            node: NodeAddress::new(host, port),
            ..Self::default()
        }
    }

    /// HA settings resolved through the given sentinel quorum
    pub fn high_availability(sentinel: SentinelSettings) -> Self {
        Self {
            ha_mode: HaMode::HighAvailability,
            sentinel,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn with_default_expiry(mut self, secs: u64) -> Self {
        self.default_expiry_secs = secs;
        self
    }

    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Effective TTL for a write, `None` meaning no expiry
    #[must_use]
    pub fn resolve_expiry(&self, expiry: Expiry) -> Option<u64> {
        expiry.resolve(self.default_expiry_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            node: NodeAddress::default(),
            credentials: Credentials::default(),
            ha_mode: HaMode::Standalone,
            sentinel: SentinelSettings::default(),
            default_expiry_secs: 0,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

// =============================================================================
// CACHE ENTRIES
// =============================================================================

/// Expiry requested for a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Expiry {
    /// Use the process-wide default
    #[default]
    Default,
    After(NonZeroU64),
}

impl Expiry {
    /// `0` maps to [`Expiry::Default`]
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        match NonZeroU64::new(secs) {
            Some(secs) => Self::After(secs),
            None => Self::Default,
        }
    }

    #[must_use]
    pub const fn resolve(self, default_secs: u64) -> Option<u64> {
        match self {
            Self::After(secs) => Some(secs.get()),
            Self::Default if default_secs > 0 => Some(default_secs),
            Self::Default => None,
        }
    }
}

impl From<u64> for Expiry {
    fn from(secs: u64) -> Self {
        Self::from_secs(secs)
    }
}

/// A value to be written to the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Vec<u8>,
    pub expiry: Expiry,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>, expiry_secs: u64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expiry: Expiry::from_secs(expiry_secs),
        }
    }

    /// Value rendered for diagnostics
    #[must_use]
    pub fn value_lossy(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Settings-level errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid HA mode '{0}': expected \"true\" or \"false\"")]
    InvalidHaMode(String),

    #[error("Invalid sentinel validation policy '{0}': expected best_effort or strict")]
    InvalidValidation(String),

    #[error("Invalid port '{0}'")]
    InvalidPort(String),

    #[error("Sentinel master name is empty")]
    MissingMasterName,

    #[error("Sentinel host #{index} is empty")]
    MissingSentinelHost { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::{Fake, Faker};

    fn sentinels() -> [String; SENTINEL_COUNT] {
        ["10.0.0.1".into(), "10.0.0.2".into(), "10.0.0.3".into()]
    }

    #[test]
    fn test_ha_mode_only_literal_true_enables_ha() {
        assert_eq!("true".parse::<HaMode>(), Ok(HaMode::HighAvailability));
        assert_eq!("false".parse::<HaMode>(), Ok(HaMode::Standalone));
        assert_eq!("".parse::<HaMode>(), Ok(HaMode::Standalone));
        assert_eq!(
            "True".parse::<HaMode>(),
            Err(SettingsError::InvalidHaMode("True".into()))
        );
        assert!("yes".parse::<HaMode>().is_err());
    }

    #[test]
    fn test_validation_policy_parsing() {
        assert_eq!("strict".parse(), Ok(SentinelValidation::Strict));
        assert_eq!("best-effort".parse(), Ok(SentinelValidation::BestEffort));
        assert_eq!("".parse(), Ok(SentinelValidation::BestEffort));
        assert!("lenient".parse::<SentinelValidation>().is_err());
    }

    #[test]
    fn test_auth_selection() {
        let both = Credentials::new(Some("app".into()), Some("secret".into()));
        assert_eq!(
            both.auth(),
            Auth::UserPassword {
                username: "app",
                password: "secret"
            }
        );

        let password_only = Credentials::new(Some(String::new()), Some("secret".into()));
        assert_eq!(password_only.auth(), Auth::Password("secret"));

        let user_only = Credentials::new(Some("app".into()), None);
        assert_eq!(user_only.auth(), Auth::None);

        assert_eq!(Credentials::default().auth(), Auth::None);
    }

    #[test]
    fn test_password_never_serialized_or_debugged() {
        let password: String = Faker.fake();
        let password = format!("pw-{password}");
        let mut settings = CacheSettings::standalone("localhost", 6379)
            .with_credentials(Credentials::new(None, Some(password.clone())));
        settings.sentinel.password = Some(password.clone());

        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains(&password));

        let debug = format!("{settings:?}");
        assert!(!debug.contains(&password));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_expiry_resolution() {
        assert_eq!(Expiry::from_secs(60).resolve(300), Some(60));
        assert_eq!(Expiry::from_secs(0).resolve(300), Some(300));
        assert_eq!(Expiry::from_secs(0).resolve(0), None);

        let settings = CacheSettings::default().with_default_expiry(120);
        assert_eq!(settings.resolve_expiry(Expiry::Default), Some(120));
    }

    #[test]
    fn test_node_address_display() {
        assert_eq!(NodeAddress::new("10.0.0.5", 6379).to_string(), "10.0.0.5:6379");
        assert_eq!(NodeAddress::new("::1", 6379).to_string(), "[::1]:6379");
        assert_eq!(NodeAddress::default().to_string(), "127.0.0.1:6379");
        assert_eq!(parse_port(" 26379 "), Ok(26379));
        assert_eq!(parse_port("port"), Err(SettingsError::InvalidPort("port".into())));
    }

    #[test]
    fn test_sentinel_addresses_share_port() {
        let sentinel = SentinelSettings::new("mymaster", sentinels(), 26380);
        let addresses: Vec<String> = sentinel.addresses().iter().map(ToString::to_string).collect();

        assert_eq!(
            addresses,
            vec!["10.0.0.1:26380", "10.0.0.2:26380", "10.0.0.3:26380"]
        );
    }

    #[test]
    fn test_query_address_defaults_to_loopback() {
        let mut sentinel = SentinelSettings::new("mymaster", sentinels(), 26379);
        assert_eq!(sentinel.query_address(), NodeAddress::new("127.0.0.1", 26379));

        sentinel.query_host = Some("10.0.0.2".into());
        assert_eq!(sentinel.query_address(), NodeAddress::new("10.0.0.2", 26379));
    }

    #[test]
    fn test_sentinel_validation_reports_missing_fields() {
        let mut sentinel = SentinelSettings::new("", sentinels(), 26379);
        assert_eq!(sentinel.validate(), Err(SettingsError::MissingMasterName));

        sentinel.master_name = "mymaster".into();
        sentinel.hosts[1] = String::new();
        assert_eq!(
            sentinel.validate(),
            Err(SettingsError::MissingSentinelHost { index: 2 })
        );

        sentinel.hosts[1] = "10.0.0.2".into();
        assert_eq!(sentinel.validate(), Ok(()));
    }

    #[test]
    fn test_cache_entry_from_zero_expiry_uses_default() {
        let entry = CacheEntry::new("user:1", "alice", 0);
        assert_eq!(entry.expiry, Expiry::Default);
        assert_eq!(entry.value_lossy(), "alice");
    }
}
