use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

/// Key-value store handle injected into the token manager and handlers.
///
/// Values are opaque strings; `ttl` of `None` means the entry never
/// expires (used for refresh tokens and vote mirrors). A store failure is
/// fatal to the calling operation — there is no silent fallback tier.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
    /// All (key, value) pairs whose key starts with `prefix`.
    async fn list_prefix(&self, prefix: &str) -> anyhow::Result<Vec<(String, String)>>;
}

/// JSON convenience layer over the raw string store.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> anyhow::Result<Option<T>> {
    match store.get(key).await? {
        Some(raw) => Ok(serde_json::from_str(&raw).ok()),
        None => Ok(None),
    }
}

pub async fn put_json<T: Serialize>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> anyhow::Result<()> {
    let raw = serde_json::to_string(value)?;
    store.put(key, &raw, ttl).await
}

/// Entry mirrored in the local DashMap tier. `expires_at: None` never expires.
#[derive(Clone)]
struct LocalEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl LocalEntry {
    fn live(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

/// Two-tier store: in-memory DashMap (tier 1) backed by Redis (tier 2).
/// The sheet is the source of truth but handled by callers.
///
/// The local tier honours TTLs: entries are checked on read and evicted
/// lazily.
#[derive(Clone)]
pub struct RedisKv {
    local: Arc<DashMap<String, LocalEntry>>,
    redis: ConnectionManager,
}

impl RedisKv {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            local: Arc::new(DashMap::new()),
            redis,
        }
    }

    /// Remove all locally-expired entries. Call periodically from a
    /// background task to bound memory usage.
    pub fn evict_expired(&self) -> usize {
        let before = self.local.len();
        self.local.retain(|_, entry| entry.live());
        before - self.local.len()
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        // tier 1: in-memory (with TTL check)
        if let Some(entry) = self.local.get(key) {
            if entry.live() {
                return Ok(Some(entry.value.clone()));
            }
            // expired — drop the ref before removing
            drop(entry);
            self.local.remove(key);
        }

        // tier 2: redis
        let mut conn = self.redis.clone();
        let value: Option<String> = conn.get(key).await?;
        if let Some(v) = &value {
            // Re-use the Redis TTL for the local entry; -1 means no expiry.
            let ttl_secs: i64 = conn.ttl(key).await.unwrap_or(60);
            let expires_at = if ttl_secs >= 0 {
                Some(Instant::now() + Duration::from_secs(ttl_secs.max(1) as u64))
            } else {
                None
            };
            self.local.insert(
                key.to_string(),
                LocalEntry {
                    value: v.clone(),
                    expires_at,
                },
            );
        }
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()> {
        let mut conn = self.redis.clone();
        match ttl {
            Some(ttl) => {
                conn.set_ex::<_, _, ()>(key, value, ttl.as_secs()).await?;
            }
            None => {
                conn.set::<_, _, ()>(key, value).await?;
            }
        }
        // Only mirror locally after Redis accepted the write.
        self.local.insert(
            key.to_string(),
            LocalEntry {
                value: value.to_string(),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.local.remove(key);
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> anyhow::Result<Vec<(String, String)>> {
        // Redis is authoritative for scans; the local tier may lag behind
        // writers on other instances.
        let mut conn = self.redis.clone();
        let pattern = format!("{}*", prefix);
        let mut keys = Vec::new();
        {
            let mut iter = conn.scan_match::<_, String>(pattern).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let mut conn = self.redis.clone();
            if let Some(value) = conn.get::<_, Option<String>>(&key).await? {
                out.push((key, value));
            }
        }
        Ok(out)
    }
}

/// Plain in-memory store. Used by tests and local development without Redis.
#[derive(Clone, Default)]
pub struct MemoryKv {
    entries: Arc<DashMap<String, LocalEntry>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.live() {
                return Ok(Some(entry.value.clone()));
            }
            drop(entry);
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()> {
        self.entries.insert(
            key.to_string(),
            LocalEntry {
                value: value.to_string(),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> anyhow::Result<Vec<(String, String)>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix) && e.value().live())
            .map(|e| (e.key().clone(), e.value().value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_kv_roundtrip() {
        let kv = MemoryKv::new();
        kv.put("a", "1", None).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap().as_deref(), Some("1"));
        kv.delete("a").await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_kv_ttl_expiry() {
        let kv = MemoryKv::new();
        kv.put("short", "x", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(kv.get("short").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_kv_prefix_scan() {
        let kv = MemoryKv::new();
        kv.put("vote:a", "1", None).await.unwrap();
        kv.put("vote:b", "2", None).await.unwrap();
        kv.put("features", "[]", None).await.unwrap();
        let mut hits = kv.list_prefix("vote:").await.unwrap();
        hits.sort();
        assert_eq!(
            hits,
            vec![
                ("vote:a".to_string(), "1".to_string()),
                ("vote:b".to_string(), "2".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn json_helpers_roundtrip() {
        let kv = MemoryKv::new();
        put_json(&kv, "n", &42u32, None).await.unwrap();
        let got: Option<u32> = get_json(&kv, "n").await.unwrap();
        assert_eq!(got, Some(42));
    }
}
