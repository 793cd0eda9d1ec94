//! Injected cache abstraction.
//!
//! Adapters that fetch coarse-grained payloads (an FStream season listing
//! covers every episode of that season) cache them behind this trait so the
//! episode-prefetch path does not refetch. The abstraction is injected so
//! tests substitute a fake and deployments can swap in a real store with
//! eviction.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

#[async_trait]
pub trait SourceCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<serde_json::Value>;
    async fn set(&self, key: &str, value: serde_json::Value);
    async fn invalidate(&self, key: &str);
}

/// Process-lifetime in-memory cache. No TTL and no eviction: entries live
/// until invalidated or the process restarts. Writers racing on the same
/// key overwrite with identical recomputed values, which is harmless.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SourceCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: serde_json::Value) {
        self.entries.write().await.insert(key.to_string(), value);
    }

    async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_invalidate_roundtrip() {
        let cache = MemoryCache::new();
        assert!(cache.get("fstream:1399:s1").await.is_none());

        cache.set("fstream:1399:s1", json!({"episodes": {}})).await;
        assert_eq!(
            cache.get("fstream:1399:s1").await,
            Some(json!({"episodes": {}}))
        );

        cache.invalidate("fstream:1399:s1").await;
        assert!(cache.get("fstream:1399:s1").await.is_none());
    }

    #[tokio::test]
    async fn overwriting_a_key_is_idempotent() {
        let cache = MemoryCache::new();
        cache.set("k", json!(1)).await;
        cache.set("k", json!(1)).await;
        assert_eq!(cache.get("k").await, Some(json!(1)));
    }
}
