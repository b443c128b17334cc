//! Fallback orchestrator: ordered retry chain over (provider, model) candidates.
//!
//! Each candidate gets exactly one attempt. The first success wins; when
//! every candidate fails the outcome names each failure. The two-engine
//! flow and the chat layer's "primary, then three Gemini models" flow are
//! two configurations of the same chain.

use simulai_core::provider::{Provider, ProviderRequest};
use simulai_core::EngineKind;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// A single entry in the fallback chain.
#[derive(Clone)]
pub struct Candidate {
    pub provider: Arc<dyn Provider>,
    /// Model override; `None` uses the provider's default model
    pub model: Option<String>,
}

impl Candidate {
    pub fn new(provider: Arc<dyn Provider>, model: Option<String>) -> Self {
        Self { provider, model }
    }

    pub fn engine(&self) -> EngineKind {
        self.provider.engine()
    }

    fn model_name(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// `engine` or `engine/model` when the model is overridden.
    fn label(&self) -> String {
        match &self.model {
            Some(model) => format!("{}/{}", self.engine(), model),
            None => self.engine().to_string(),
        }
    }
}

/// Record of one provider invocation, fed to the health registry.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub engine: EngineKind,
    pub model: String,
    pub success: bool,
    pub latency_ms: u64,
    pub tokens_used: u32,
    pub error: Option<String>,
}

/// Result of running the chain.
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    pub success: bool,
    pub content: Option<String>,
    /// Engine that answered, or the primary engine when all failed
    pub engine: EngineKind,
    pub model: Option<String>,
    pub fallback_used: bool,
    /// First failure that pushed the chain past the primary
    pub fallback_reason: Option<String>,
    pub error: Option<String>,
    pub tokens_used: u32,
    pub attempts: Vec<Attempt>,
}

/// Ordered chain of candidates; never empty.
pub struct FallbackOrchestrator {
    chain: Vec<Candidate>,
}

impl FallbackOrchestrator {
    /// Start a chain with its primary candidate.
    pub fn new(primary: Candidate) -> Self {
        Self {
            chain: vec![primary],
        }
    }

    /// Append a candidate to the chain.
    pub fn then(mut self, provider: Arc<dyn Provider>, model: Option<String>) -> Self {
        self.chain.push(Candidate::new(provider, model));
        self
    }

    /// Primary then fallback, each on its default model.
    pub fn pair(primary: Arc<dyn Provider>, fallback: Arc<dyn Provider>) -> Self {
        Self::new(Candidate::new(primary, None)).then(fallback, None)
    }

    /// Primary on its default model, then `fallback` once per model in `models`.
    pub fn with_model_variants(
        primary: Arc<dyn Provider>,
        fallback: Arc<dyn Provider>,
        models: &[String],
    ) -> Self {
        models.iter().fold(
            Self::new(Candidate::new(primary, None)),
            |chain, model| chain.then(fallback.clone(), Some(model.clone())),
        )
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.chain
    }

    pub fn primary_engine(&self) -> EngineKind {
        self.chain[0].engine()
    }

    /// Run the chain for one request.
    pub async fn call(&self, request: ProviderRequest) -> FallbackOutcome {
        let mut attempts: Vec<Attempt> = Vec::with_capacity(self.chain.len());
        let mut failures: Vec<String> = Vec::new();

        for (i, candidate) in self.chain.iter().enumerate() {
            let label = candidate.label();
            info!(
                candidate = %label,
                attempt = i + 1,
                total = self.chain.len(),
                "Fallback: trying provider"
            );

            let started = Instant::now();
            let result = candidate
                .provider
                .complete(request.clone().with_model(candidate.model.clone()))
                .await;
            let latency_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(response) => {
                    attempts.push(Attempt {
                        engine: candidate.engine(),
                        model: response.model.clone(),
                        success: true,
                        latency_ms,
                        tokens_used: response.tokens_used,
                        error: None,
                    });
                    return FallbackOutcome {
                        success: true,
                        content: Some(response.content),
                        engine: candidate.engine(),
                        model: Some(response.model),
                        fallback_used: i > 0,
                        fallback_reason: failures.first().cloned(),
                        error: None,
                        tokens_used: response.tokens_used,
                        attempts,
                    };
                }
                Err(e) => {
                    warn!(
                        candidate = %label,
                        error = %e,
                        "Fallback: provider failed, trying next"
                    );
                    attempts.push(Attempt {
                        engine: candidate.engine(),
                        model: candidate.model_name(),
                        success: false,
                        latency_ms,
                        tokens_used: 0,
                        error: Some(e.to_string()),
                    });
                    failures.push(format!("{label}: {e}"));
                }
            }
        }

        FallbackOutcome {
            success: false,
            content: None,
            engine: self.primary_engine(),
            model: None,
            fallback_used: self.chain.len() > 1,
            fallback_reason: failures.first().cloned(),
            error: Some(format!("All AI engines failed: {}", failures.join("; "))),
            tokens_used: 0,
            attempts,
        }
    }
}
