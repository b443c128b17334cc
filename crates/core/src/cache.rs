//! Response cache entries and the store seam behind them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::EngineKind;
use crate::error::StoreError;

/// A cached engine response, keyed uniquely by `prompt_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Content digest of (action, prompt, context)
    pub prompt_hash: String,

    /// Leading slice of the prompt, for admin inspection
    pub prompt_preview: String,

    pub action: String,

    pub engine_used: EngineKind,

    /// `{ "content": ..., "data": ... }` as returned to the caller
    pub response_data: serde_json::Value,

    pub tokens_used: u32,

    pub created_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,

    pub hit_count: u32,
}

impl CacheEntry {
    /// Whether the entry is still within its validity window at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Persistence for cache entries.
///
/// Implementations do not need transactions: the cache layer performs
/// read-then-write sequences and accepts last-writer-wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// The entry for `prompt_hash` whose `expires_at` is after `now`, if any.
    async fn find_live(
        &self,
        prompt_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>, StoreError>;

    /// Insert or fully replace the entry with the same `prompt_hash`.
    async fn upsert(&self, entry: CacheEntry) -> Result<(), StoreError>;

    /// Overwrite the hit counter of an existing entry (no-op when absent).
    async fn set_hit_count(&self, prompt_hash: &str, hit_count: u32) -> Result<(), StoreError>;
}
