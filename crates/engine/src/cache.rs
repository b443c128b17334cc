//! Response cache over a [`CacheStore`].

use crate::hash::clip;
use chrono::{Duration, Utc};
use simulai_core::{CacheEntry, CacheStore, EngineKind, StoreError};
use std::sync::Arc;
use tracing::debug;

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// A live entry, with `hit_count` already incremented.
    Hit(CacheEntry),
    Miss,
}

/// TTL-bounded response cache keyed by prompt hash.
///
/// Expiry is enforced at read time only; nothing sweeps or deletes rows.
/// Both the hit counter and the upsert are plain read-then-write, so
/// concurrent requests may under-count hits and the last writer wins.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    preview_chars: usize,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl_days: u32, preview_chars: usize) -> Self {
        Self {
            store,
            ttl: Duration::days(i64::from(ttl_days)),
            preview_chars,
        }
    }

    pub async fn lookup(&self, prompt_hash: &str) -> Result<CacheLookup, StoreError> {
        let Some(mut entry) = self.store.find_live(prompt_hash, Utc::now()).await? else {
            debug!(prompt_hash = %prompt_hash, "Cache miss");
            return Ok(CacheLookup::Miss);
        };

        entry.hit_count = entry.hit_count.saturating_add(1);
        self.store.set_hit_count(prompt_hash, entry.hit_count).await?;
        debug!(prompt_hash = %prompt_hash, hits = entry.hit_count, "Cache hit");
        Ok(CacheLookup::Hit(entry))
    }

    /// Upsert the response for `prompt_hash`, replacing any previous entry
    /// and restarting its TTL and hit count.
    pub async fn store(
        &self,
        prompt_hash: &str,
        prompt: &str,
        action: &str,
        engine: EngineKind,
        response_data: serde_json::Value,
        tokens_used: u32,
    ) -> Result<CacheEntry, StoreError> {
        let now = Utc::now();
        let entry = CacheEntry {
            prompt_hash: prompt_hash.to_string(),
            prompt_preview: clip(prompt, self.preview_chars).to_string(),
            action: action.to_string(),
            engine_used: engine,
            response_data,
            tokens_used,
            created_at: now,
            expires_at: now + self.ttl,
            hit_count: 0,
        };
        self.store.upsert(entry.clone()).await?;
        Ok(entry)
    }
}
