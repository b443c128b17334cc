//! The unified AI engine: cache, selection, fallback, audit.

use crate::action::Action;
use crate::cache::{CacheLookup, ResponseCache};
use crate::hash::prompt_hash;
use crate::json::extract_json;
use crate::prompt::with_context;
use crate::request::EngineRequest;
use serde::Serialize;
use serde_json::{Value, json};
use simulai_core::{CacheEntry, EngineError, EngineKind, Message, ProviderRequest};
use simulai_providers::{FallbackOrchestrator, ProviderSet};
use simulai_telemetry::{EngineSelection, HealthRegistry, RequestLogger, select_engines};
use std::time::Instant;
use tracing::{error, info, warn};

/// Successful reply of the unified engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineReply {
    pub success: bool,
    pub content: String,
    pub engine: EngineKind,
    pub fallback_used: bool,
    pub cached: bool,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Routes one request through cache, health-based selection and the
/// two-engine fallback chain, and logs the outcome.
pub struct UnifiedEngine {
    cache: Option<ResponseCache>,
    health: HealthRegistry,
    providers: ProviderSet,
    logger: RequestLogger,
    first_engine: EngineKind,
}

impl UnifiedEngine {
    /// `cache = None` disables caching entirely.
    pub fn new(
        cache: Option<ResponseCache>,
        health: HealthRegistry,
        providers: ProviderSet,
        logger: RequestLogger,
        first_engine: EngineKind,
    ) -> Self {
        Self {
            cache,
            health,
            providers,
            logger,
            first_engine,
        }
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Handle one request on behalf of `user_id`.
    pub async fn handle(
        &self,
        request: EngineRequest,
        user_id: Option<&str>,
    ) -> Result<EngineReply, EngineError> {
        let started = Instant::now();
        let action = request.action;
        let prompt_text = request.prompt_text();
        let context = request.context.clone().unwrap_or(Value::Null);
        let hash = prompt_hash(action.as_str(), &prompt_text, &context);

        if !request.skip_cache {
            if let Some(entry) = self.cached(&hash).await {
                return Ok(self.reply_from_cache(entry, action, &hash, user_id, started).await);
            }
        }

        let selection = self.select(request.preferred_engine).await;
        info!(
            action = %action,
            primary = %selection.primary,
            fallback = %selection.fallback,
            skip_cache = request.skip_cache,
            "Calling AI engines"
        );

        let profile = action.profile();
        let provider_request = ProviderRequest {
            model: None,
            messages: build_messages(&request),
            temperature: profile.temperature,
            max_tokens: Some(profile.max_tokens),
        };

        let orchestrator = FallbackOrchestrator::pair(
            self.providers.get(selection.primary),
            self.providers.get(selection.fallback),
        );
        let outcome = orchestrator.call(provider_request).await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        let mut entry = RequestLogger::entry(action.as_str(), &hash, outcome.engine);
        entry.user_id = user_id.map(String::from);
        entry.fallback_used = outcome.fallback_used;
        entry.fallback_reason = outcome.fallback_reason.clone();
        entry.response_time_ms = response_time_ms;
        entry.tokens_used = outcome.tokens_used;
        entry.success = outcome.success;
        entry.error_message = outcome.error.clone();

        let content = match outcome.content {
            Some(content) if outcome.success => content,
            _ => {
                let message = outcome
                    .error
                    .unwrap_or_else(|| "All AI engines failed".to_string());
                error!(action = %action, error = %message, "AI request failed on every engine");
                self.logger.log(entry, &outcome.attempts).await;
                return Err(EngineError::AllProvidersFailed(message));
            }
        };

        let data = if profile.json_output {
            let parsed = extract_json(&content);
            if parsed.is_none() {
                warn!(action = %action, "JSON action returned unparseable output");
            }
            parsed
        } else {
            None
        };

        if let Some(cache) = &self.cache {
            let mut response_data = json!({ "content": content });
            if let Some(data) = &data {
                response_data["data"] = data.clone();
            }
            if let Err(e) = cache
                .store(
                    &hash,
                    &prompt_text,
                    action.as_str(),
                    outcome.engine,
                    response_data,
                    outcome.tokens_used,
                )
                .await
            {
                warn!(prompt_hash = %hash, error = %e, "Failed to cache response");
            }
        }

        self.logger.log(entry, &outcome.attempts).await;

        Ok(EngineReply {
            success: true,
            content,
            engine: outcome.engine,
            fallback_used: outcome.fallback_used,
            cached: false,
            response_time_ms,
            data,
        })
    }

    async fn cached(&self, hash: &str) -> Option<CacheEntry> {
        let cache = self.cache.as_ref()?;
        match cache.lookup(hash).await {
            Ok(CacheLookup::Hit(entry)) => Some(entry),
            Ok(CacheLookup::Miss) => None,
            Err(e) => {
                warn!(prompt_hash = %hash, error = %e, "Cache lookup failed; calling engines");
                None
            }
        }
    }

    async fn reply_from_cache(
        &self,
        entry: CacheEntry,
        action: Action,
        hash: &str,
        user_id: Option<&str>,
        started: Instant,
    ) -> EngineReply {
        let response_time_ms = started.elapsed().as_millis() as u64;
        let content = entry.response_data["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let data = entry
            .response_data
            .get("data")
            .filter(|d| !d.is_null())
            .cloned();

        let mut log = RequestLogger::entry(action.as_str(), hash, entry.engine_used);
        log.user_id = user_id.map(String::from);
        log.cache_hit = true;
        log.success = true;
        log.response_time_ms = response_time_ms;
        self.logger.log(log, &[]).await;

        EngineReply {
            success: true,
            content,
            engine: entry.engine_used,
            fallback_used: false,
            cached: true,
            response_time_ms,
            data,
        }
    }

    async fn select(&self, preferred: Option<EngineKind>) -> EngineSelection {
        match self.health.select(preferred).await {
            Ok(selection) => selection,
            Err(e) => {
                warn!(error = %e, "Engine metrics unavailable; using default order");
                select_engines(&[], preferred, self.first_engine)
            }
        }
    }
}

/// System prompt (request override or action default, plus context), then
/// the request's messages, then the prompt as the final user turn.
fn build_messages(request: &EngineRequest) -> Vec<Message> {
    let base = request
        .system_prompt
        .as_deref()
        .unwrap_or(request.action.profile().system_prompt);

    let mut messages = Vec::with_capacity(request.messages.len() + 2);
    messages.push(Message::system(with_context(base, request.context.as_ref())));
    messages.extend(request.messages.iter().cloned());
    if let Some(prompt) = request.prompt.as_deref().filter(|p| !p.is_empty()) {
        messages.push(Message::user(prompt));
    }
    messages
}
