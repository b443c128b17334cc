//! Chat session layer: ownership checks, prompt assembly, model chain.

use crate::action::ChatAction;
use crate::hash::prompt_hash;
use crate::prompt::{ChatPromptInput, assemble_chat_system_prompt};
use crate::request::ChatRequest;
use serde::Serialize;
use serde_json::Value;
use simulai_config::ChatConfig;
use simulai_core::{EngineError, EngineKind, Message, ProviderRequest, SessionStore, StoreError};
use simulai_providers::{FallbackOrchestrator, ProviderSet};
use simulai_telemetry::RequestLogger;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Shown to the user when every model in the chain failed.
pub const UNAVAILABLE_MESSAGE: &str = "O serviço de IA está temporariamente indisponível. \
Por favor, tente novamente em alguns instantes.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub success: bool,
    pub response: String,
    pub action: ChatAction,
    pub engine: EngineKind,
    pub fallback_used: bool,
}

pub struct ChatService {
    sessions: Arc<dyn SessionStore>,
    chain: FallbackOrchestrator,
    logger: RequestLogger,
    config: ChatConfig,
}

impl ChatService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        chain: FallbackOrchestrator,
        logger: RequestLogger,
        config: ChatConfig,
    ) -> Self {
        Self {
            sessions,
            chain,
            logger,
            config,
        }
    }

    /// The configured primary engine, then each Gemini fallback model.
    pub fn chain_from_config(providers: &ProviderSet, config: &ChatConfig) -> FallbackOrchestrator {
        FallbackOrchestrator::with_model_variants(
            providers.get(config.primary_engine),
            providers.get(EngineKind::Gemini),
            &config.fallback_models,
        )
    }

    pub async fn handle(&self, user_id: &str, request: ChatRequest) -> Result<ChatReply, EngineError> {
        let started = Instant::now();
        let session_id = request.session_id;

        let session = self
            .sessions
            .session(session_id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;
        if session.user_id != user_id {
            warn!(session = %session_id, "Chat session requested by a non-owner");
            return Err(EngineError::SessionForbidden(session_id.to_string()));
        }

        let documents = or_empty(self.sessions.active_knowledge_documents().await, "knowledge documents");
        let files = or_empty(self.sessions.session_files(session_id).await, "session files");
        let history = or_empty(
            self.sessions
                .recent_messages(session_id, self.config.history_limit)
                .await,
            "message history",
        );

        let system_prompt = assemble_chat_system_prompt(&ChatPromptInput {
            action: request.action,
            documents: &documents,
            files: &files,
            context: request.context.as_ref(),
            knowledge_content_chars: self.config.knowledge_content_chars,
            file_content_chars: self.config.file_content_chars,
        });

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(system_prompt));
        messages.extend(history.iter().map(|m| Message::new(m.role, m.content.clone())));
        messages.push(Message::user(request.message.clone()));

        info!(
            session = %session_id,
            action = %request.action,
            documents = documents.len(),
            files = files.len(),
            history = history.len(),
            "Chat request assembled"
        );

        let outcome = self
            .chain
            .call(ProviderRequest {
                model: None,
                messages,
                temperature: 0.7,
                max_tokens: Some(request.action.max_tokens()),
            })
            .await;

        let context = request.context.clone().unwrap_or(Value::Null);
        let hash = prompt_hash(request.action.as_str(), &request.message, &context);
        let mut entry = RequestLogger::entry(request.action.as_str(), &hash, outcome.engine);
        entry.user_id = Some(user_id.to_string());
        entry.fallback_used = outcome.fallback_used;
        entry.fallback_reason = outcome.fallback_reason.clone();
        entry.response_time_ms = started.elapsed().as_millis() as u64;
        entry.tokens_used = outcome.tokens_used;
        entry.success = outcome.success;
        entry.error_message = outcome.error.clone();
        self.logger.log(entry, &outcome.attempts).await;

        match outcome.content {
            Some(response) if outcome.success => Ok(ChatReply {
                success: true,
                response,
                action: request.action,
                engine: outcome.engine,
                fallback_used: outcome.fallback_used,
            }),
            _ => {
                let message = outcome
                    .error
                    .unwrap_or_else(|| "All AI engines failed".to_string());
                error!(session = %session_id, error = %message, "Chat failed on every model");
                Err(EngineError::AllProvidersFailed(message))
            }
        }
    }
}

/// Prompt context is best effort: a failed read degrades to no context.
fn or_empty<T>(result: Result<Vec<T>, StoreError>, what: &str) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load {what}; continuing without it");
        Vec::new()
    })
}
