//! Engine health registry and selection policy.

use chrono::{DateTime, Utc};
use serde::Serialize;
use simulai_core::{EngineKind, EngineMetrics, MetricsStore, StoreError};
use simulai_providers::Attempt;
use std::sync::Arc;
use tracing::debug;

/// The engines chosen for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineSelection {
    pub primary: EngineKind,
    pub fallback: EngineKind,
}

impl EngineSelection {
    pub fn with_primary(primary: EngineKind) -> Self {
        Self {
            primary,
            fallback: primary.other(),
        }
    }
}

/// Pick primary and fallback from the current metrics rows.
///
/// `first` is the tie-break engine: it wins when no rows exist (and nothing
/// is preferred), when both engines were last used at the same instant, and
/// when both are unhealthy. An engine without a row counts as healthy and
/// never used.
pub fn select_engines(
    rows: &[EngineMetrics],
    preferred: Option<EngineKind>,
    first: EngineKind,
) -> EngineSelection {
    if rows.is_empty() {
        return EngineSelection::with_primary(preferred.unwrap_or(first));
    }

    let row = |engine: EngineKind| rows.iter().find(|m| m.engine == engine);
    let healthy = |engine: EngineKind| row(engine).is_none_or(|m| m.is_healthy);
    let last_used = |engine: EngineKind| row(engine).and_then(|m| m.last_used_at);

    if let Some(engine) = preferred.filter(|e| healthy(*e)) {
        return EngineSelection::with_primary(engine);
    }

    let second = first.other();
    let primary = match (healthy(first), healthy(second)) {
        // Round-robin by recency; `None` sorts before any timestamp.
        (true, true) if last_used(second) < last_used(first) => second,
        (true, true) => first,
        (false, true) => second,
        (true, false) | (false, false) => first,
    };
    EngineSelection::with_primary(primary)
}

/// Fold one provider attempt into an engine's metrics row.
///
/// A missing row starts from zero, so the result is seeded with the
/// attempt's own values.
pub fn apply_attempt(
    current: Option<EngineMetrics>,
    attempt: &Attempt,
    failure_threshold: u64,
    now: DateTime<Utc>,
) -> EngineMetrics {
    let mut metrics = current.unwrap_or_else(|| EngineMetrics::empty(attempt.engine));
    let previous_count = metrics.request_count;

    metrics.request_count += 1;
    metrics.total_tokens += u64::from(attempt.tokens_used);
    metrics.avg_response_time_ms = ((metrics.avg_response_time_ms as f64 * previous_count as f64
        + attempt.latency_ms as f64)
        / metrics.request_count as f64)
        .round() as u64;
    metrics.last_used_at = Some(now);

    if attempt.success {
        metrics.success_count += 1;
        metrics.is_healthy = true;
    } else {
        metrics.failure_count += 1;
        metrics.last_error = attempt.error.clone();
        metrics.is_healthy = metrics.failure_count < failure_threshold;
    }

    metrics
}

/// Reads engine metrics through a [`MetricsStore`] and applies the policy.
#[derive(Clone)]
pub struct HealthRegistry {
    store: Arc<dyn MetricsStore>,
    first: EngineKind,
}

impl HealthRegistry {
    pub fn new(store: Arc<dyn MetricsStore>, first: EngineKind) -> Self {
        Self { store, first }
    }

    /// Select engines for a request, honoring a healthy preference.
    pub async fn select(
        &self,
        preferred: Option<EngineKind>,
    ) -> Result<EngineSelection, StoreError> {
        let rows = self.store.all().await?;
        let selection = select_engines(&rows, preferred, self.first);
        debug!(
            primary = %selection.primary,
            fallback = %selection.fallback,
            preferred = ?preferred,
            "Engines selected"
        );
        Ok(selection)
    }

    /// Current metrics row of every known engine, empty rows included.
    pub async fn snapshot(&self) -> Result<Vec<EngineMetrics>, StoreError> {
        let rows = self.store.all().await?;
        Ok(EngineKind::ALL
            .iter()
            .map(|engine| {
                rows.iter()
                    .find(|m| m.engine == *engine)
                    .cloned()
                    .unwrap_or_else(|| EngineMetrics::empty(*engine))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use simulai_store::InMemoryStore;

    const LOVABLE: EngineKind = EngineKind::Lovable;
    const GEMINI: EngineKind = EngineKind::Gemini;

    fn row(engine: EngineKind, healthy: bool, last_used_at: Option<DateTime<Utc>>) -> EngineMetrics {
        EngineMetrics {
            is_healthy: healthy,
            last_used_at,
            request_count: 1,
            ..EngineMetrics::empty(engine)
        }
    }

    fn attempt(success: bool, latency_ms: u64) -> Attempt {
        Attempt {
            engine: LOVABLE,
            model: "google/gemini-2.5-flash".into(),
            success,
            latency_ms,
            tokens_used: if success { 10 } else { 0 },
            error: (!success).then(|| "Rate limit exceeded".to_string()),
        }
    }

    #[test]
    fn no_rows_uses_preference_or_first() {
        assert_eq!(
            select_engines(&[], None, LOVABLE),
            EngineSelection { primary: LOVABLE, fallback: GEMINI }
        );
        assert_eq!(select_engines(&[], Some(GEMINI), LOVABLE).primary, GEMINI);
    }

    #[test]
    fn healthy_preference_is_honored() {
        let now = Utc::now();
        let rows = [row(LOVABLE, true, Some(now - Duration::hours(1))), row(GEMINI, true, Some(now))];
        let selection = select_engines(&rows, Some(GEMINI), LOVABLE);
        assert_eq!(selection.primary, GEMINI);
        assert_eq!(selection.fallback, LOVABLE);
    }

    #[test]
    fn unhealthy_preference_is_ignored() {
        let rows = [row(LOVABLE, true, None), row(GEMINI, false, None)];
        assert_eq!(select_engines(&rows, Some(GEMINI), LOVABLE).primary, LOVABLE);
    }

    #[test]
    fn preference_without_row_counts_as_healthy() {
        let rows = [row(LOVABLE, true, Some(Utc::now()))];
        assert_eq!(select_engines(&rows, Some(GEMINI), LOVABLE).primary, GEMINI);
    }

    #[test]
    fn least_recently_used_healthy_engine_is_primary() {
        let t1 = Utc::now() - Duration::minutes(5);
        let t2 = Utc::now();

        let rows = [row(LOVABLE, true, Some(t2)), row(GEMINI, true, Some(t1))];
        assert_eq!(select_engines(&rows, None, LOVABLE).primary, GEMINI);

        let rows = [row(LOVABLE, true, Some(t1)), row(GEMINI, true, Some(t2))];
        assert_eq!(select_engines(&rows, None, LOVABLE).primary, LOVABLE);
    }

    #[test]
    fn never_used_engine_beats_used_one() {
        let rows = [row(LOVABLE, true, Some(Utc::now()))];
        assert_eq!(select_engines(&rows, None, LOVABLE).primary, GEMINI);
    }

    #[test]
    fn equal_recency_breaks_tie_to_first() {
        let t = Utc::now();
        let rows = [row(LOVABLE, true, Some(t)), row(GEMINI, true, Some(t))];
        assert_eq!(select_engines(&rows, None, LOVABLE).primary, LOVABLE);
    }

    #[test]
    fn only_healthy_engine_is_primary() {
        let rows = [row(LOVABLE, false, None), row(GEMINI, true, Some(Utc::now()))];
        let selection = select_engines(&rows, None, LOVABLE);
        assert_eq!(selection.primary, GEMINI);
        assert_eq!(selection.fallback, LOVABLE);
    }

    #[test]
    fn both_unhealthy_falls_back_to_first() {
        let rows = [row(LOVABLE, false, Some(Utc::now())), row(GEMINI, false, None)];
        assert_eq!(select_engines(&rows, None, LOVABLE).primary, LOVABLE);
        assert_eq!(select_engines(&rows, None, GEMINI).primary, GEMINI);
    }

    #[test]
    fn first_attempt_seeds_row() {
        let now = Utc::now();
        let metrics = apply_attempt(None, &attempt(true, 420), 5, now);
        assert_eq!(metrics.engine, LOVABLE);
        assert_eq!(metrics.request_count, 1);
        assert_eq!(metrics.success_count, 1);
        assert_eq!(metrics.total_tokens, 10);
        assert_eq!(metrics.avg_response_time_ms, 420);
        assert_eq!(metrics.last_used_at, Some(now));
        assert!(metrics.is_healthy);
    }

    #[test]
    fn running_average_rounds() {
        let now = Utc::now();
        let m = apply_attempt(None, &attempt(true, 100), 5, now);
        let m = apply_attempt(Some(m), &attempt(true, 201), 5, now);
        // (100 + 201) / 2 = 150.5
        assert_eq!(m.avg_response_time_ms, 151);
        let m = apply_attempt(Some(m), &attempt(false, 0), 5, now);
        // (151 * 2 + 0) / 3 = 100.67
        assert_eq!(m.avg_response_time_ms, 101);
    }

    #[test]
    fn failures_flip_health_at_threshold_and_success_resets() {
        let now = Utc::now();
        let mut metrics = None;
        for i in 1..=5 {
            let m = apply_attempt(metrics.take(), &attempt(false, 50), 5, now);
            assert_eq!(m.is_healthy, i < 5, "after {i} failures");
            metrics = Some(m);
        }
        let m = metrics.unwrap();
        assert_eq!(m.failure_count, 5);
        assert_eq!(m.last_error.as_deref(), Some("Rate limit exceeded"));

        let m = apply_attempt(Some(m), &attempt(true, 50), 5, now);
        assert!(m.is_healthy);
        assert_eq!(m.failure_count, 5);

        // Cumulative count: the next failure flips it straight back.
        let m = apply_attempt(Some(m), &attempt(false, 50), 5, now);
        assert!(!m.is_healthy);
    }

    #[tokio::test]
    async fn registry_reads_store() {
        let store = Arc::new(InMemoryStore::new());
        let registry = HealthRegistry::new(store.clone(), LOVABLE);

        assert_eq!(registry.select(None).await.unwrap().primary, LOVABLE);

        store
            .upsert(row(LOVABLE, false, Some(Utc::now())))
            .await
            .unwrap();
        assert_eq!(registry.select(Some(LOVABLE)).await.unwrap().primary, GEMINI);

        let snapshot = registry.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot[0].is_healthy);
        assert_eq!(snapshot[1].engine, GEMINI);
        assert_eq!(snapshot[1].request_count, 0);
    }
}
