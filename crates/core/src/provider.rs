//! Provider trait: the abstraction over upstream LLM services.
//!
//! A Provider knows how to send a conversation to one LLM API and get the
//! generated text back, normalized into [`ProviderResponse`]. Adapters never
//! retry; retry and fallback belong to the orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::EngineKind;
use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Model override; `None` uses the adapter's default model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            messages,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// The normalized `{content, tokensUsed}` result of a successful call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Generated text, never blank (blank bodies are `ProviderError::EmptyResponse`)
    pub content: String,

    /// Total tokens reported by the provider (0 when not reported)
    pub tokens_used: u32,

    /// Which model actually responded
    pub model: String,
}

/// The core Provider trait.
///
/// Implemented by the Lovable gateway adapter and the Gemini adapter; the
/// orchestrator and tests only ever see `Arc<dyn Provider>`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this adapter.
    fn name(&self) -> &str;

    /// Which engine this adapter talks to (used for health bookkeeping).
    fn engine(&self) -> EngineKind;

    /// The model used when a request carries no override.
    fn default_model(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}
