//! # Topology Module
//!
//! Sentinel-based discovery of the current primary for HA mode.
//!
//! Every HA operation resolves the primary afresh, so a failover performed by
//! the sentinels is picked up by the next call without restarting anything.

pub mod failover;
pub mod resolver;

pub use failover::FailoverHandle;
pub use resolver::{ResolvedTopology, TopologyResolver};
