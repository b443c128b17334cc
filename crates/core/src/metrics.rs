//! Engine health metrics and the append-only request audit log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::EngineKind;
use crate::error::StoreError;

/// One row per engine. Sole input of the selection policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineMetrics {
    pub engine: EngineKind,
    pub request_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub total_tokens: u64,
    pub avg_response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub is_healthy: bool,
}

impl EngineMetrics {
    /// An empty, healthy row for `engine`.
    pub fn empty(engine: EngineKind) -> Self {
        Self {
            engine,
            request_count: 0,
            success_count: 0,
            failure_count: 0,
            total_tokens: 0,
            avg_response_time_ms: 0,
            last_used_at: None,
            last_error: None,
            is_healthy: true,
        }
    }

    /// Fraction of successful requests, `None` before the first request.
    pub fn success_rate(&self) -> Option<f64> {
        (self.request_count > 0).then(|| self.success_count as f64 / self.request_count as f64)
    }
}

/// Write-once audit row, one per engine request (cache hit or miss).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLog {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub engine_used: EngineKind,
    pub action: String,
    pub prompt_hash: String,
    pub cache_hit: bool,
    pub fallback_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub response_time_ms: u64,
    pub tokens_used: u32,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Persistence for per-engine metrics rows.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn get(&self, engine: EngineKind) -> Result<Option<EngineMetrics>, StoreError>;

    /// All existing rows, in engine order.
    async fn all(&self) -> Result<Vec<EngineMetrics>, StoreError>;

    /// Insert or replace the row for `metrics.engine`.
    async fn upsert(&self, metrics: EngineMetrics) -> Result<(), StoreError>;
}

/// Append-only audit storage.
#[async_trait]
pub trait RequestLogStore: Send + Sync {
    async fn append(&self, log: RequestLog) -> Result<(), StoreError>;

    /// Most recent rows first.
    async fn recent(&self, limit: usize) -> Result<Vec<RequestLog>, StoreError>;
}
