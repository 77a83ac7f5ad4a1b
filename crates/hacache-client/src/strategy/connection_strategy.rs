//! Connection strategies and the per-call lease built from them.

use hacache_domain::NodeAddress;
use redis::aio::{ConnectionLike, MultiplexedConnection};
use redis::{Cmd, Pipeline, RedisFuture, Value};

use crate::topology::{FailoverHandle, ResolvedTopology};

/// How a single call reaches the cache
pub enum ConnectionStrategy {
    /// Pooled connection to the configured node
    Direct {
        connection: deadpool_redis::Connection,
        address: NodeAddress,
    },
    /// Sentinel-resolved primary
    HaFailover(ResolvedTopology),
}

impl ConnectionStrategy {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Direct { .. } => "direct",
            Self::HaFailover(_) => "ha_failover",
        }
    }

    /// Node reads and writes are sent to
    pub const fn address(&self) -> &NodeAddress {
        match self {
            Self::Direct { address, .. } => address,
            Self::HaFailover(topology) => &topology.primary_address,
        }
    }

    /// Keep only the authoritative connection, holding the failover handle
    /// until the lease is released.
    pub fn into_lease(self) -> Lease {
        let strategy = self.name();
        match self {
            Self::Direct {
                connection,
                address,
            } => Lease {
                connection: NodeConnection::Pooled(connection),
                address,
                failover: None,
                strategy,
            },
            Self::HaFailover(ResolvedTopology {
                primary_address,
                failover,
                primary,
            }) => Lease {
                connection: NodeConnection::Primary(primary),
                address: primary_address,
                failover: Some(failover),
                strategy,
            },
        }
    }
}

/// Connection an operation is executed on
pub enum NodeConnection {
    /// Returned to the pool on drop
    Pooled(deadpool_redis::Connection),
    /// Closed on drop
    Primary(MultiplexedConnection),
}

impl ConnectionLike for NodeConnection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        match self {
            Self::Pooled(conn) => conn.req_packed_command(cmd),
            Self::Primary(conn) => conn.req_packed_command(cmd),
        }
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        cmd: &'a Pipeline,
        offset: usize,
        count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        match self {
            Self::Pooled(conn) => conn.req_packed_commands(cmd, offset, count),
            Self::Primary(conn) => conn.req_packed_commands(cmd, offset, count),
        }
    }

    fn get_db(&self) -> i64 {
        match self {
            Self::Pooled(conn) => conn.get_db(),
            Self::Primary(conn) => conn.get_db(),
        }
    }
}

/// Resources acquired by one call
pub struct Lease {
    connection: NodeConnection,
    address: NodeAddress,
    failover: Option<FailoverHandle>,
    strategy: &'static str,
}

impl Lease {
    pub const fn address(&self) -> &NodeAddress {
        &self.address
    }

    pub fn connection(&mut self) -> &mut NodeConnection {
        &mut self.connection
    }

    pub const fn strategy(&self) -> &'static str {
        self.strategy
    }

    pub const fn failover(&self) -> Option<&FailoverHandle> {
        self.failover.as_ref()
    }

    /// Return the connection and drop the failover handle
    pub fn release(self) {
        tracing::trace!(
            address = %self.address,
            strategy = self.strategy,
            "Lease released"
        );
    }
}
