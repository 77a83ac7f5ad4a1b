//! Primary lookup through the sentinel quorum.

use std::sync::Arc;

use hacache_domain::{CacheSettings, Credentials, NodeAddress, SentinelValidation};
use redis::RedisResult;
use redis::aio::MultiplexedConnection;

use super::FailoverHandle;
use crate::error::{CacheError, Result};
use crate::node::dial;

/// Topology obtained for a single HA call.
///
/// Both handles belong to the call that resolved them.
pub struct ResolvedTopology {
    pub primary_address: NodeAddress,
    pub failover: FailoverHandle,
    pub primary: MultiplexedConnection,
}

/// Resolves the current primary of the configured master set
#[derive(Debug, Clone)]
pub struct TopologyResolver {
    settings: Arc<CacheSettings>,
}

impl TopologyResolver {
    pub const fn new(settings: Arc<CacheSettings>) -> Self {
        Self { settings }
    }

    /// Build the failover handle, look up the primary and dial it.
    ///
    /// # Errors
    ///
    /// - [`CacheError::InvalidSettings`] under strict validation when the
    ///   master name or a sentinel host is empty
    /// - [`CacheError::TopologyResolution`] when the sentinel lookup fails
    /// - [`CacheError::Connection`] when the resolved primary cannot be dialed
    pub async fn resolve(&self) -> Result<ResolvedTopology> {
        let sentinel = &self.settings.sentinel;
        if sentinel.validation == SentinelValidation::Strict {
            sentinel.validate()?;
        }

        let failover = FailoverHandle::build(&self.settings)?;
        let primary_address = self.query_primary().await?;

        let primary = dial(&primary_address, self.settings.credentials.auth())
            .await
            .map_err(|e| {
                tracing::warn!(primary = %primary_address, error = %e, "Failed to dial resolved primary");
                CacheError::connection(&primary_address, &e)
            })?;

        tracing::debug!(
            master = %sentinel.master_name,
            primary = %primary_address,
            "Primary resolved"
        );

        Ok(ResolvedTopology {
            primary_address,
            failover,
            primary,
        })
    }

    /// Ask one sentinel for the primary address of the master set.
    ///
    /// The query connection is closed before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::TopologyResolution`] when the sentinel is
    /// unreachable, does not know the master, or sends a malformed reply.
    pub async fn query_primary(&self) -> Result<NodeAddress> {
        let sentinel = &self.settings.sentinel;
        let query = sentinel.query_address();
        let fail = |reason: String| CacheError::TopologyResolution {
            master_name: sentinel.master_name.clone(),
            sentinel: query.to_string(),
            reason,
        };

        let sentinel_auth = Credentials::new(None, sentinel.password.clone());
        let reply = match dial(&query, sentinel_auth.auth()).await {
            Ok(mut conn) => {
                let reply: RedisResult<Option<(String, String)>> = redis::cmd("SENTINEL")
                    .arg("get-master-addr-by-name")
                    .arg(&sentinel.master_name)
                    .query_async(&mut conn)
                    .await;
                reply.map_err(|e| e.to_string())
            }
            Err(e) => Err(format!("sentinel unreachable: {e}")),
        };

        reply.and_then(parse_primary_reply).map_err(|reason| {
            tracing::warn!(master = %sentinel.master_name, sentinel = %query, %reason, "Primary lookup failed");
            fail(reason)
        })
    }
}

fn parse_primary_reply(reply: Option<(String, String)>) -> std::result::Result<NodeAddress, String> {
    let (host, port) = reply.ok_or_else(|| "unknown master name".to_string())?;
    let port = hacache_domain::parse_port(&port).map_err(|e| e.to_string())?;
    Ok(NodeAddress::new(host, port))
}
