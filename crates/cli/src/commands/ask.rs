//! `simulai ask`: one request through the unified engine, without HTTP.

use anyhow::{Context, anyhow};
use simulai_config::AppConfig;
use simulai_core::EngineKind;
use simulai_engine::{Action, EngineRequest, Services};

pub async fn run(
    action: &str,
    engine: Option<&str>,
    skip_cache: bool,
    prompt: String,
) -> anyhow::Result<()> {
    let action: Action = action.parse().map_err(|e: String| anyhow!(e))?;
    let preferred = engine
        .map(|e| e.parse::<EngineKind>())
        .transpose()
        .map_err(|e| anyhow!(e))?;

    let config = AppConfig::load().context("Failed to load config")?;
    if !config.has_api_key() {
        eprintln!("No API key configured. Set LOVABLE_API_KEY or GEMINI_API_KEY.");
    }

    let stores = simulai_store::open(&config.storage)
        .await
        .context("Failed to open storage")?;
    let providers = simulai_providers::router::build_from_config(&config);
    let services = Services::new(&config, stores, providers);

    let request = EngineRequest::new(action, prompt)
        .with_preferred_engine(preferred)
        .with_skip_cache(skip_cache);

    let reply = services.engine.handle(request, None).await?;

    eprintln!(
        "[{}{}{}, {} ms]",
        reply.engine,
        if reply.fallback_used { ", fallback" } else { "" },
        if reply.cached { ", cached" } else { "" },
        reply.response_time_ms
    );
    match &reply.data {
        Some(data) => println!("{}", serde_json::to_string_pretty(data)?),
        None => println!("{}", reply.content),
    }

    Ok(())
}
