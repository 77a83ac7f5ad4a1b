//! # Cache Module
//!
//! Public operation surface of the cache client.

pub mod client;
pub mod keys;

use std::sync::Arc;

use async_trait::async_trait;

pub use client::CacheClient;
pub use keys::KeyMatches;

use crate::error::Result;

/// Key-value operations the rest of the application depends on.
///
/// Implementations can be swapped (live client, test doubles) behind
/// [`SharedCache`].
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Write `value` under `key`; `expiry_secs == 0` uses the default expiry
    async fn set(&self, key: &str, value: &[u8], expiry_secs: u64) -> Result<()>;

    /// Read `key`; a missing key yields an empty string
    async fn get(&self, key: &str) -> Result<String>;

    /// Keys matching a glob pattern
    async fn find_keys(&self, pattern: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl KeyValueCache for CacheClient {
    async fn set(&self, key: &str, value: &[u8], expiry_secs: u64) -> Result<()> {
        Self::set(self, key, value, expiry_secs).await
    }

    async fn get(&self, key: &str) -> Result<String> {
        Self::get(self, key).await
    }

    async fn find_keys(&self, pattern: &str) -> Result<Vec<String>> {
        Self::find_keys(self, pattern).await
    }
}

/// Shared cache handle
pub type SharedCache = Arc<dyn KeyValueCache>;

/// Share a client behind the [`KeyValueCache`] trait
pub fn shared_cache(client: CacheClient) -> SharedCache {
    Arc::new(client)
}
