//! Request logger: one audit row per request, one metrics fold per attempt.

use crate::health::apply_attempt;
use chrono::Utc;
use simulai_core::{
    EngineKind, EngineMetrics, MetricsStore, RequestLog, RequestLogStore, StoreError,
};
use simulai_providers::Attempt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Writes the audit trail and keeps engine metrics current.
///
/// Logging never fails a request: store errors are reported with `warn!`
/// and dropped.
#[derive(Clone)]
pub struct RequestLogger {
    logs: Arc<dyn RequestLogStore>,
    metrics: Arc<dyn MetricsStore>,
    failure_threshold: u64,
}

impl RequestLogger {
    pub fn new(
        logs: Arc<dyn RequestLogStore>,
        metrics: Arc<dyn MetricsStore>,
        failure_threshold: u64,
    ) -> Self {
        Self {
            logs,
            metrics,
            failure_threshold,
        }
    }

    /// A fresh audit row with a new id, stamped now. Callers fill in the
    /// outcome fields.
    pub fn entry(action: &str, prompt_hash: &str, engine: EngineKind) -> RequestLog {
        RequestLog {
            id: Uuid::new_v4().to_string(),
            user_id: None,
            engine_used: engine,
            action: action.to_string(),
            prompt_hash: prompt_hash.to_string(),
            cache_hit: false,
            fallback_used: false,
            fallback_reason: None,
            response_time_ms: 0,
            tokens_used: 0,
            success: false,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    /// Append `entry` and fold each provider attempt into its engine's row.
    ///
    /// A cache hit carries no attempts; it counts as one successful,
    /// zero-token sample for the engine that produced the cached response.
    pub async fn log(&self, entry: RequestLog, attempts: &[Attempt]) {
        info!(
            action = %entry.action,
            engine = %entry.engine_used,
            prompt_hash = %entry.prompt_hash,
            cache_hit = entry.cache_hit,
            fallback_used = entry.fallback_used,
            success = entry.success,
            response_time_ms = entry.response_time_ms,
            tokens = entry.tokens_used,
            "AI request completed"
        );

        let hit = entry
            .cache_hit
            .then(|| cache_hit_sample(entry.engine_used, entry.response_time_ms));

        if let Err(e) = self.logs.append(entry).await {
            warn!(error = %e, "Failed to append audit row");
        }

        for attempt in attempts.iter().chain(hit.as_ref()) {
            if let Err(e) = self.record_attempt(attempt).await {
                warn!(engine = %attempt.engine, error = %e, "Failed to update engine metrics");
            }
        }
    }

    /// Read-modify-write of one engine's metrics row.
    pub async fn record_attempt(&self, attempt: &Attempt) -> Result<EngineMetrics, StoreError> {
        let current = self.metrics.get(attempt.engine).await?;
        let was_healthy = current.as_ref().is_none_or(|m| m.is_healthy);

        let updated = apply_attempt(current, attempt, self.failure_threshold, Utc::now());

        if was_healthy && !updated.is_healthy {
            warn!(
                engine = %updated.engine,
                failures = updated.failure_count,
                last_error = ?updated.last_error,
                "Engine marked unhealthy"
            );
        } else if !was_healthy && updated.is_healthy {
            info!(engine = %updated.engine, "Engine recovered");
        }
        debug!(
            engine = %updated.engine,
            requests = updated.request_count,
            avg_ms = updated.avg_response_time_ms,
            "Engine metrics updated"
        );

        self.metrics.upsert(updated.clone()).await?;
        Ok(updated)
    }

    /// Newest audit rows first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<RequestLog>, StoreError> {
        self.logs.recent(limit).await
    }
}

fn cache_hit_sample(engine: EngineKind, latency_ms: u64) -> Attempt {
    Attempt {
        engine,
        model: "cache".into(),
        success: true,
        latency_ms,
        tokens_used: 0,
        error: None,
    }
}
