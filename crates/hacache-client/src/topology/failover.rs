//! Failover-aware client handle held for the duration of an HA call.

use std::fmt;

use hacache_domain::{CacheSettings, Credentials, NodeAddress};
use redis::ConnectionInfo;
use redis::sentinel::{SentinelClient, SentinelNodeConnectionInfo, SentinelServerType};

use crate::error::{CacheError, Result};
use crate::node::connection_info;

/// Sentinel-backed client for a master set.
///
/// Building one performs no I/O. It is owned by exactly one call and dropped
/// with the lease that carries it.
pub struct FailoverHandle {
    _client: SentinelClient,
    master_name: String,
    sentinels: Vec<NodeAddress>,
}

impl FailoverHandle {
    /// Configure a failover client over all sentinel endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::TopologyResolution`] if the sentinel parameters
    /// are rejected by the client library.
    pub fn build(settings: &CacheSettings) -> Result<Self> {
        let sentinel = &settings.sentinel;
        let sentinels = sentinel.addresses();
        let sentinel_auth = Credentials::new(None, sentinel.password.clone());

        let params: Vec<ConnectionInfo> = sentinels
            .iter()
            .map(|address| connection_info(address, sentinel_auth.auth()))
            .collect();

        let node_info = SentinelNodeConnectionInfo {
            redis_connection_info: Some(
                connection_info(&NodeAddress::default(), settings.credentials.auth()).redis,
            ),
            ..Default::default()
        };

        let client = SentinelClient::build(
            params,
            sentinel.master_name.clone(),
            Some(node_info),
            SentinelServerType::Master,
        )
        .map_err(|e| CacheError::TopologyResolution {
            master_name: sentinel.master_name.clone(),
            sentinel: join(&sentinels),
            reason: e.to_string(),
        })?;

        Ok(Self {
            _client: client,
            master_name: sentinel.master_name.clone(),
            sentinels,
        })
    }

    pub fn master_name(&self) -> &str {
        &self.master_name
    }

    pub fn sentinels(&self) -> &[NodeAddress] {
        &self.sentinels
    }
}

impl fmt::Debug for FailoverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailoverHandle")
            .field("master_name", &self.master_name)
            .field("sentinels", &join(&self.sentinels))
            .finish_non_exhaustive()
    }
}

impl Drop for FailoverHandle {
    fn drop(&mut self) {
        tracing::trace!(master = %self.master_name, "Failover handle released");
    }
}

fn join(addresses: &[NodeAddress]) -> String {
    addresses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
