//! Selects and builds the connection strategy for each call.

use std::fmt;
use std::sync::Arc;

use deadpool_redis::{Manager, Pool, PoolError, Runtime};
use hacache_domain::{CacheSettings, HaMode};

use super::ConnectionStrategy;
use crate::error::{CacheError, Result};
use crate::node::connection_info;
use crate::topology::TopologyResolver;

/// Produces a [`ConnectionStrategy`] per call.
///
/// The bounded pool is the only state shared between calls; HA handles are
/// resolved per call and never pooled.
pub struct ConnectionFactory {
    settings: Arc<CacheSettings>,
    pool: Pool,
    resolver: TopologyResolver,
}

impl ConnectionFactory {
    /// Create the factory and its (initially empty) direct pool.
    ///
    /// No connection is opened here; the pool dials on demand.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Pool`] if the pool cannot be configured.
    pub fn new(settings: Arc<CacheSettings>) -> Result<Self> {
        let address = settings.node.to_string();
        let manager = Manager::new(connection_info(&settings.node, settings.credentials.auth()))
            .map_err(|e| CacheError::Pool {
                address: address.clone(),
                reason: e.to_string(),
            })?;

        let pool = Pool::builder(manager)
            .max_size(settings.max_connections)
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(settings.operation_timeout))
            .build()
            .map_err(|e| CacheError::Pool {
                address,
                reason: e.to_string(),
            })?;

        Ok(Self {
            resolver: TopologyResolver::new(settings.clone()),
            settings,
            pool,
        })
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Maximum number of concurrently open direct connections
    pub fn pool_size(&self) -> usize {
        self.pool.status().max_size
    }

    /// Pick the strategy for the configured mode and acquire its handles.
    ///
    /// # Errors
    ///
    /// Propagates topology resolution, dial and pool failures.
    pub async fn obtain(&self) -> Result<ConnectionStrategy> {
        match self.settings.ha_mode {
            HaMode::HighAvailability => self
                .resolver
                .resolve()
                .await
                .map(ConnectionStrategy::HaFailover),
            HaMode::Standalone => self.direct().await,
        }
    }

    async fn direct(&self) -> Result<ConnectionStrategy> {
        let address = self.settings.node.clone();

        let connection = self.pool.get().await.map_err(|e| match e {
            PoolError::Backend(err) => CacheError::connection(&address, &err),
            PoolError::Timeout(_) => {
                tracing::warn!(%address, max_size = self.settings.max_connections, "Connection pool exhausted");
                CacheError::PoolExhausted {
                    address: address.to_string(),
                    max_size: self.settings.max_connections,
                }
            }
            other => CacheError::Pool {
                address: address.to_string(),
                reason: other.to_string(),
            },
        })?;

        Ok(ConnectionStrategy::Direct {
            connection,
            address,
        })
    }
}

impl fmt::Debug for ConnectionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionFactory")
            .field("ha_mode", &self.settings.ha_mode)
            .field("node", &self.settings.node)
            .field("pool_size", &self.pool_size())
            .finish_non_exhaustive()
    }
}
