//! LLM provider implementations for simulai.
//!
//! All adapters implement the `simulai_core::Provider` trait and normalize
//! their native wire format into `ProviderResponse`. The fallback
//! orchestrator chains them; the router builds them from configuration.

pub mod fallback;
pub mod gemini;
pub mod openai_compat;
pub mod router;

pub use fallback::{Attempt, Candidate, FallbackOrchestrator, FallbackOutcome};
pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderSet, build_from_config};

/// Build the shared HTTP client used by every adapter.
pub(crate) fn http_client(timeout: std::time::Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}
