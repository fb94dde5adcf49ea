//! Response Cache
//!
//! Keyed by `sha256(schema_id ∥ model ∥ temperature ∥ system_instruction ∥
//! normalized_prompt)` so identical calls hit regardless of which path (sync
//! or async) issued them. TTL- and size-bounded; cache hits synthesize a
//! zero-latency, zero-cost `Usage` and never count against retry budgets.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::provider::Usage;
use crate::schema::SchemaId;

/// Collapse whitespace and case so trivially-different prompts (extra
/// spaces, differing capitalization) still share a cache key.
fn normalize_prompt(prompt: &str) -> String {
    prompt.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Compute the stable cache key for one structured-output call.
pub fn cache_key(schema_id: SchemaId, model: &str, temperature: f32, system_instruction: &str, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(schema_id.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(model.as_bytes());
    hasher.update(b"\0");
    hasher.update(temperature.to_bits().to_be_bytes());
    hasher.update(b"\0");
    hasher.update(system_instruction.as_bytes());
    hasher.update(b"\0");
    hasher.update(normalize_prompt(prompt).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A cached structured-output response.
#[derive(Clone, Debug)]
pub struct CachedResponse {
    pub value: Value,
    pub usage: Usage,
}

#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<CachedResponse>;
    async fn put(&self, key: String, response: CachedResponse);
    async fn clear(&self);
}

struct Entry {
    response: CachedResponse,
    inserted_at: Instant,
}

/// In-memory TTL- and size-bounded cache. Concurrent `put` for the same key
/// is last-write-wins, which is acceptable because values are idempotent
/// for identical keys (§5).
pub struct InMemoryResponseCache {
    entries: tokio::sync::RwLock<HashMap<String, Entry>>,
    ttl: Duration,
    max_entries: usize,
}

impl InMemoryResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: tokio::sync::RwLock::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    pub fn with_default_ttl() -> Self {
        Self::new(Duration::from_secs(86_400), 10_000)
    }
}

#[async_trait]
impl ResponseCache for InMemoryResponseCache {
    async fn get(&self, key: &str) -> Option<CachedResponse> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None;
        }
        let mut response = entry.response.clone();
        response.usage = Usage::cached();
        Some(response)
    }

    async fn put(&self, key: String, response: CachedResponse) {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            if let Some(evict_key) = entries.keys().next().cloned() {
                entries.remove(&evict_key);
            }
        }
        entries.insert(
            key,
            Entry {
                response,
                inserted_at: Instant::now(),
            },
        );
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_usage() -> Usage {
        Usage {
            tokens: 10,
            latency_ms: 50,
            cost: 0.001,
            cached: false,
        }
    }

    #[test]
    fn cache_key_is_stable_for_identical_inputs() {
        let a = cache_key(SchemaId::Idea, "gpt-x", 0.9, "sys", "  Prompt   text ");
        let b = cache_key(SchemaId::Idea, "gpt-x", 0.9, "sys", "prompt text");
        assert_eq!(a, b);
    }

    #[test]
    fn cache_key_differs_on_schema() {
        let a = cache_key(SchemaId::Idea, "gpt-x", 0.9, "sys", "prompt");
        let b = cache_key(SchemaId::Evaluation, "gpt-x", 0.9, "sys", "prompt");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn hit_returns_zero_cost_usage() {
        let cache = InMemoryResponseCache::new(Duration::from_secs(60), 10);
        let key = "k".to_string();
        cache
            .put(
                key.clone(),
                CachedResponse {
                    value: json!({"ok": true}),
                    usage: sample_usage(),
                },
            )
            .await;

        let hit = cache.get(&key).await.unwrap();
        assert!(hit.usage.cached);
        assert_eq!(hit.usage.latency_ms, 0);
        assert_eq!(hit.usage.cost, 0.0);
    }

    #[tokio::test]
    async fn expired_entry_is_not_returned() {
        let cache = InMemoryResponseCache::new(Duration::from_millis(1), 10);
        cache
            .put(
                "k".into(),
                CachedResponse {
                    value: json!({}),
                    usage: sample_usage(),
                },
            )
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn evicts_when_over_capacity() {
        let cache = InMemoryResponseCache::new(Duration::from_secs(60), 1);
        cache
            .put(
                "a".into(),
                CachedResponse {
                    value: json!({}),
                    usage: sample_usage(),
                },
            )
            .await;
        cache
            .put(
                "b".into(),
                CachedResponse {
                    value: json!({}),
                    usage: sample_usage(),
                },
            )
            .await;

        let entries = cache.entries.read().await;
        assert_eq!(entries.len(), 1);
    }
}
