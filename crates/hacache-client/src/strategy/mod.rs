//! # Strategy Module
//!
//! Per-call choice of the node an operation runs against.
//!
//! ## Strategies
//!
//! - `Direct` - a lease from the bounded pool bound to the configured node
//! - `HaFailover` - a freshly resolved primary plus the failover handle
//!
//! Either strategy is turned into a [`Lease`] exposing a single
//! [`NodeConnection`]; dropping the lease releases everything it holds.

pub mod connection_strategy;
pub mod factory;

pub use connection_strategy::{ConnectionStrategy, Lease, NodeConnection};
pub use factory::ConnectionFactory;
