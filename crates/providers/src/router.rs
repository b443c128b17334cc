//! Provider set: one adapter per known engine, built from config.

use crate::gemini::GeminiProvider;
use crate::openai_compat::OpenAiCompatProvider;
use simulai_core::provider::Provider;
use simulai_core::EngineKind;
use std::sync::Arc;
use std::time::Duration;

/// The adapters for every engine, addressable by [`EngineKind`].
#[derive(Clone)]
pub struct ProviderSet {
    lovable: Arc<dyn Provider>,
    gemini: Arc<dyn Provider>,
}

impl ProviderSet {
    pub fn new(lovable: Arc<dyn Provider>, gemini: Arc<dyn Provider>) -> Self {
        Self { lovable, gemini }
    }

    /// Get the adapter for an engine.
    pub fn get(&self, engine: EngineKind) -> Arc<dyn Provider> {
        match engine {
            EngineKind::Lovable => self.lovable.clone(),
            EngineKind::Gemini => self.gemini.clone(),
        }
    }
}

/// Build both adapters from configuration.
///
/// A provider without an API key is still built; its calls fail with
/// `NotConfigured`, which the orchestrator treats like any other failure.
pub fn build_from_config(config: &simulai_config::AppConfig) -> ProviderSet {
    let timeout = Duration::from_secs(config.providers.request_timeout_secs);

    for engine in EngineKind::ALL {
        if config.providers.get(engine).api_key.is_none() {
            tracing::warn!(engine = %engine, "No API key configured; calls to this engine will fail over");
        }
    }

    ProviderSet::new(
        Arc::new(OpenAiCompatProvider::lovable(&config.providers.lovable, timeout)),
        Arc::new(GeminiProvider::from_config(&config.providers.gemini, timeout)),
    )
}
