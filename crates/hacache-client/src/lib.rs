//! # hacache Client
//!
//! Key-value cache client that works against a single node or a
//! sentinel-managed master set without the caller noticing the difference.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Application Layer                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 CacheClient (set / get / find_keys)          │
//! │       deadline, span, result normalization, lease release    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ConnectionFactory                        │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                   │
//!            Standalone                  HighAvailability
//!                    ▼                   ▼
//! ┌─────────────────────────┐   ┌──────────────────────────────┐
//! │   Bounded direct pool   │   │      TopologyResolver        │
//! │     (deadpool-redis)    │   │ sentinel lookup → primary    │
//! └─────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hacache_client::CacheClient;
//! use hacache_domain::CacheSettings;
//!
//! let cache = CacheClient::new(CacheSettings::standalone("localhost", 6379))?;
//!
//! cache.set("user:1", "alice", 0).await?;
//! assert_eq!(cache.get("user:1").await?, "alice");
//! assert_eq!(cache.get("user:2").await?, "");
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod error;
mod node;
pub mod strategy;
pub mod topology;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use cache::{CacheClient, KeyMatches, KeyValueCache, SharedCache, shared_cache};
pub use error::{CacheError, ErrorKind, Operation, Result};
pub use hacache_domain::{CacheEntry, CacheSettings, HaMode};
pub use strategy::{ConnectionFactory, ConnectionStrategy, Lease, NodeConnection};
pub use topology::{FailoverHandle, ResolvedTopology, TopologyResolver};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build a shared client from a settings snapshot
///
/// # Errors
///
/// Returns an error if the direct pool cannot be configured.
pub fn init(settings: CacheSettings) -> Result<SharedCache> {
    CacheClient::new(settings).map(shared_cache)
}
