//! Scripted providers and wiring shared by the engine's tests.

use crate::cache::ResponseCache;
use crate::unified::UnifiedEngine;
use async_trait::async_trait;
use simulai_core::{EngineKind, Provider, ProviderError, ProviderRequest, ProviderResponse};
use simulai_providers::ProviderSet;
use simulai_store::InMemoryStore;
use simulai_telemetry::{HealthRegistry, RequestLogger};
use std::sync::{Arc, Mutex};

/// Replies from a script; the last reply repeats once the script runs out.
/// Models listed in `failing_models` always fail with a 500.
pub(crate) struct ScriptedProvider {
    engine: EngineKind,
    replies: Mutex<Vec<Result<String, ProviderError>>>,
    failing_models: Vec<String>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn build(
        engine: EngineKind,
        replies: Vec<Result<String, ProviderError>>,
        failing_models: &[&str],
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            replies: Mutex::new(replies),
            failing_models: failing_models.iter().map(|m| m.to_string()).collect(),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn ok(engine: EngineKind, content: &str) -> Arc<Self> {
        Self::build(engine, vec![Ok(content.to_string())], &[])
    }

    pub(crate) fn sequence(engine: EngineKind, contents: &[&str]) -> Arc<Self> {
        Self::build(
            engine,
            contents.iter().map(|c| Ok(c.to_string())).collect(),
            &[],
        )
    }

    pub(crate) fn failing(engine: EngineKind) -> Arc<Self> {
        Self::build(engine, vec![Err(ProviderError::RateLimited)], &[])
    }

    pub(crate) fn failing_models(engine: EngineKind, models: &[&str], content: &str) -> Arc<Self> {
        Self::build(engine, vec![Ok(content.to_string())], models)
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        self.engine.as_str()
    }

    fn engine(&self) -> EngineKind {
        self.engine
    }

    fn default_model(&self) -> &str {
        "default-model"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model().to_string());
        self.requests.lock().unwrap().push(request);

        if self.failing_models.contains(&model) {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: format!("{model} overloaded"),
            });
        }

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.remove(0)
            } else {
                replies[0].clone()
            }
        };

        reply.map(|content| ProviderResponse {
            content,
            tokens_used: 25,
            model,
        })
    }
}

pub(crate) fn engine_with(
    store: &Arc<InMemoryStore>,
    lovable: Arc<ScriptedProvider>,
    gemini: Arc<ScriptedProvider>,
) -> UnifiedEngine {
    UnifiedEngine::new(
        Some(ResponseCache::new(store.clone(), 7, 200)),
        HealthRegistry::new(store.clone(), EngineKind::Lovable),
        ProviderSet::new(lovable, gemini),
        RequestLogger::new(store.clone(), store.clone(), 5),
        EngineKind::Lovable,
    )
}
