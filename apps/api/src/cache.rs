//! Short-lived JSON cache for external lookups (Tavily searches, related news).
//!
//! `RedisCache` when `REDIS_URL` is configured, `MemoryCache` otherwise.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::warn;

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn set(&self, key: &str, value: &Value, ttl: Duration);
}

/// Stable cache key: `prefix:` followed by the hex SHA-256 of `raw`.
pub fn cache_key(prefix: &str, raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    format!("{prefix}:{}", hex::encode(digest))
}

pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                warn!("Redis unavailable for GET {key}: {e}");
                return None;
            }
        };
        let raw: Option<String> = conn.get(key).await.ok()?;
        raw.and_then(|s| serde_json::from_str(&s).ok())
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                warn!("Redis unavailable for SET {key}: {e}");
                return;
            }
        };
        let result: redis::RedisResult<()> = conn
            .set_ex(key, value.to_string(), ttl.as_secs().max(1))
            .await;
        if let Err(e) = result {
            warn!("Redis SET {key} failed: {e}");
        }
    }
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// Bounded in-process cache. Evicts the oldest insertion once full.
pub struct MemoryCache {
    capacity: usize,
    inner: Mutex<(HashMap<String, Entry>, VecDeque<String>)>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new((HashMap::new(), VecDeque::new())),
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.lock().await.0.len()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let mut guard = self.inner.lock().await;
        let (map, order) = &mut *guard;
        match map.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                map.remove(key);
                order.retain(|k| k != key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) {
        let mut guard = self.inner.lock().await;
        let (map, order) = &mut *guard;
        if !map.contains_key(key) {
            while map.len() >= self.capacity {
                match order.pop_front() {
                    Some(oldest) => {
                        map.remove(&oldest);
                    }
                    None => break,
                }
            }
            order.push_back(key.to_string());
        }
        map.insert(
            key.to_string(),
            Entry {
                value: value.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
    }
}
