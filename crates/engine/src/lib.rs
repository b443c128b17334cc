//! The AI orchestration layer of simulai.
//!
//! A request flows through:
//!
//! 1. **Validate** the body ([`request`])
//! 2. **Hash** action, prompt and context into a cache key ([`hash`])
//! 3. **Look up** a live cached response ([`cache`])
//! 4. **Select** primary and fallback engines from health metrics
//! 5. **Call** the fallback chain and **audit** every attempt
//! 6. **Store** the response and reply ([`unified`])
//!
//! The chat session layer ([`chat`]) skips the cache and selection: it
//! assembles a tutor prompt from the knowledge base, the session's files and
//! its history ([`prompt`]), then walks a fixed model chain.

pub mod action;
pub mod cache;
pub mod chat;
pub mod hash;
pub mod json;
pub mod prompt;
pub mod request;
pub mod unified;

#[cfg(test)]
mod testing;

use simulai_config::AppConfig;
use simulai_providers::ProviderSet;
use simulai_store::Stores;
use simulai_telemetry::{HealthRegistry, RequestLogger};
use std::sync::Arc;

pub use action::{Action, ActionProfile, ChatAction};
pub use cache::{CacheLookup, ResponseCache};
pub use chat::{ChatReply, ChatService, UNAVAILABLE_MESSAGE};
pub use hash::prompt_hash;
pub use json::extract_json;
pub use request::{ChatRequest, EngineRequest};
pub use unified::{EngineReply, UnifiedEngine};

/// Everything the HTTP surface and the CLI call into.
#[derive(Clone)]
pub struct Services {
    pub engine: Arc<UnifiedEngine>,
    pub chat: Arc<ChatService>,
    pub health: HealthRegistry,
    pub logger: RequestLogger,
}

impl Services {
    pub fn new(config: &AppConfig, stores: Stores, providers: ProviderSet) -> Self {
        let first = config.engine.default_engine;
        let logger = RequestLogger::new(
            stores.logs.clone(),
            stores.metrics.clone(),
            config.engine.failure_threshold,
        );
        let health = HealthRegistry::new(stores.metrics.clone(), first);

        let cache = config.engine.cache_enabled.then(|| {
            ResponseCache::new(
                stores.cache.clone(),
                config.engine.cache_ttl_days,
                config.engine.prompt_preview_chars,
            )
        });

        let chat = ChatService::new(
            stores.sessions.clone(),
            ChatService::chain_from_config(&providers, &config.chat),
            logger.clone(),
            config.chat.clone(),
        );
        let engine = UnifiedEngine::new(cache, health.clone(), providers, logger.clone(), first);

        Self {
            engine: Arc::new(engine),
            chat: Arc::new(chat),
            health,
            logger,
        }
    }
}
