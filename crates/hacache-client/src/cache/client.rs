//! # Cache Client
//!
//! Facade over the connection strategies. Every operation follows the same
//! path: obtain a strategy, run one command on the authoritative connection,
//! normalize the reply and release the lease.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use hacache_domain::{CacheEntry, CacheSettings};
use redis::{AsyncCommands, RedisResult};
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, Instrument, Span};

use super::KeyMatches;
use crate::error::{CacheError, Operation, Result};
use crate::strategy::{ConnectionFactory, Lease};

/// Cache client usable against a standalone node or an HA master set.
///
/// Cloning is cheap; clones share the settings snapshot and the direct pool.
#[derive(Clone)]
pub struct CacheClient {
    settings: Arc<CacheSettings>,
    factory: Arc<ConnectionFactory>,
    timeout: Duration,
    logger: Option<Dispatch>,
}

impl CacheClient {
    /// Create a client; no connection is opened until the first call.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Pool`] if the direct pool cannot be configured.
    pub fn new(settings: CacheSettings) -> Result<Self> {
        let settings = Arc::new(settings);
        let factory = ConnectionFactory::new(settings.clone())?;

        tracing::info!(
            mode = %settings.ha_mode,
            node = %settings.node,
            master = %settings.sentinel.master_name,
            "Cache client created"
        );

        Ok(Self {
            timeout: settings.operation_timeout,
            settings,
            factory: Arc::new(factory),
            logger: None,
        })
    }

    /// Route this client's spans and events to `logger` instead of the
    /// global subscriber.
    #[must_use]
    pub fn with_logger(mut self, logger: impl Into<Dispatch>) -> Self {
        self.logger = Some(logger.into());
        self
    }

    /// Override the per-operation deadline
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Write `value` under `key`.
    ///
    /// `expiry_secs == 0` applies the configured default expiry; when that is
    /// also zero the key is written without expiry. In HA mode the write goes
    /// to the resolved primary.
    ///
    /// # Errors
    ///
    /// Topology, connection and pool failures, or [`CacheError::Operation`]
    /// carrying key, value and node address.
    pub async fn set(&self, key: &str, value: impl Into<Vec<u8>>, expiry_secs: u64) -> Result<()> {
        self.set_entry(&CacheEntry::new(key, value, expiry_secs)).await
    }

    /// Write a [`CacheEntry`]
    ///
    /// # Errors
    ///
    /// See [`CacheClient::set`].
    pub async fn set_entry(&self, entry: &CacheEntry) -> Result<()> {
        let ttl = self.settings.resolve_expiry(entry.expiry);
        let span = self.span(|| tracing::info_span!("cache_set", key = %entry.key, ttl = ?ttl));

        self.run(Operation::Set, &entry.key, span, |mut lease| async move {
            let mut command = redis::cmd("SET");
            command.arg(&entry.key).arg(entry.value.as_slice());
            if let Some(secs) = ttl {
                command.arg("EX").arg(secs);
            }
            let written: RedisResult<()> = command.query_async(lease.connection()).await;

            let address = lease.address().clone();
            lease.release();

            written.map_err(|e| {
                CacheError::operation(
                    Operation::Set,
                    &entry.key,
                    Some(entry.value_lossy()),
                    &address,
                    &e,
                )
            })?;

            tracing::debug!(%address, "Key written");
            Ok(())
        })
        .await
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Read `key`. A missing or expired key is not an error and yields `""`.
    ///
    /// # Errors
    ///
    /// Topology, connection and pool failures, or [`CacheError::Operation`].
    pub async fn get(&self, key: &str) -> Result<String> {
        Ok(self.fetch(key).await?.unwrap_or_default())
    }

    /// Read `key`, distinguishing a miss (`None`) from an empty value.
    ///
    /// # Errors
    ///
    /// See [`CacheClient::get`].
    pub async fn fetch(&self, key: &str) -> Result<Option<String>> {
        let span = self.span(|| tracing::info_span!("cache_get", key));

        self.run(Operation::Get, key, span, |mut lease| async move {
            let value: RedisResult<Option<String>> = lease.connection().get(key).await;

            let address = lease.address().clone();
            lease.release();

            match value {
                Ok(Some(value)) => {
                    tracing::debug!(%address, "Cache hit");
                    Ok(Some(value))
                }
                Ok(None) => {
                    tracing::debug!(%address, "Cache miss");
                    Ok(None)
                }
                Err(e) => Err(CacheError::operation(Operation::Get, key, None, &address, &e)),
            }
        })
        .await
    }

    // =========================================================================
    // KEY SCANS
    // =========================================================================

    /// Keys matching a glob `pattern` (for example `user:*`).
    ///
    /// Runs `KEYS`, which walks the whole keyspace and blocks the node while
    /// doing so. Meant for administrative use, not request paths. No match
    /// yields an empty vector.
    ///
    /// # Errors
    ///
    /// Topology, connection and pool failures, or [`CacheError::Operation`].
    pub async fn find_keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.find_keys_marked(pattern).await.map(KeyMatches::into_keys)
    }

    /// Same scan as [`CacheClient::find_keys`], keeping the pattern and the
    /// `"keys found"` marker alongside the matches.
    ///
    /// # Errors
    ///
    /// See [`CacheClient::find_keys`].
    pub async fn find_keys_marked(&self, pattern: &str) -> Result<KeyMatches> {
        let span = self.span(|| tracing::info_span!("cache_find_keys", pattern));

        self.run(Operation::FindKeys, pattern, span, |mut lease| async move {
            let keys: RedisResult<Vec<String>> = lease.connection().keys(pattern).await;

            let address = lease.address().clone();
            lease.release();

            let matches = KeyMatches::new(
                pattern,
                keys.map_err(|e| {
                    CacheError::operation(Operation::FindKeys, pattern, None, &address, &e)
                })?,
            );

            if matches.is_empty() {
                tracing::debug!(%address, "No key matches pattern");
            } else {
                tracing::debug!(%address, marker = matches.marker(), count = matches.len(), "Keys matched");
            }
            Ok(matches)
        })
        .await
    }

    // =========================================================================
    // PLUMBING
    // =========================================================================

    fn span(&self, make: impl FnOnce() -> Span) -> Span {
        match &self.logger {
            Some(logger) => tracing::dispatcher::with_default(logger, make),
            None => make(),
        }
    }

    /// Obtain a lease and run `op` on it under the operation deadline.
    ///
    /// A timed-out call drops its future, which releases whatever it had
    /// acquired so far.
    async fn run<T, F, Fut>(&self, operation: Operation, key: &str, span: Span, op: F) -> Result<T>
    where
        F: FnOnce(Lease) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout = self.timeout;
        let factory = &self.factory;

        let guarded = async move {
            let work = async move {
                let strategy = factory.obtain().await.inspect_err(|e| {
                    tracing::warn!(error = %e, "Failed to obtain connection");
                })?;
                tracing::trace!(strategy = strategy.name(), address = %strategy.address(), "Connection obtained");
                op(strategy.into_lease()).await
            };

            tokio::time::timeout(timeout, work).await.unwrap_or_else(|_| {
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(timeout_ms, "Cache operation timed out");
                Err(CacheError::Timeout {
                    operation,
                    key: key.to_string(),
                    timeout_ms,
                })
            })
        }
        .instrument(span);

        match &self.logger {
            Some(logger) => guarded.with_subscriber(logger.clone()).await,
            None => guarded.await,
        }
    }
}

impl fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheClient")
            .field("settings", &self.settings)
            .field("timeout", &self.timeout)
            .field("custom_logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}
