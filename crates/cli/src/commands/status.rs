//! `simulai status`: engine metrics, health and the current selection.

use anyhow::Context;
use simulai_config::AppConfig;
use simulai_telemetry::HealthRegistry;

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let stores = simulai_store::open(&config.storage)
        .await
        .context("Failed to open storage")?;
    let health = HealthRegistry::new(stores.metrics, config.engine.default_engine);

    println!("simulai status");
    println!("==============");
    println!("  Config dir:  {}", AppConfig::config_dir().display());
    println!("  Storage:     {} ({})", config.storage.backend, config.storage.database_path());
    let cache = if config.engine.cache_enabled {
        format!("{} days", config.engine.cache_ttl_days)
    } else {
        "disabled".to_string()
    };
    println!("  Cache:       {cache}");

    println!();
    println!(
        "  {:<8} {:>8} {:>8} {:>8} {:>9} {:>10}  {}",
        "engine", "requests", "ok", "failed", "avg ms", "tokens", "health"
    );
    for row in health.snapshot().await? {
        let key = if config.providers.get(row.engine).api_key.is_some() {
            ""
        } else {
            " (no API key)"
        };
        println!(
            "  {:<8} {:>8} {:>8} {:>8} {:>9} {:>10}  {}{}",
            row.engine,
            row.request_count,
            row.success_count,
            row.failure_count,
            row.avg_response_time_ms,
            row.total_tokens,
            if row.is_healthy { "healthy" } else { "UNHEALTHY" },
            key
        );
        if let Some(err) = &row.last_error {
            println!("           last error: {err}");
        }
    }

    let selection = health.select(None).await?;
    println!();
    println!("  Next request: {} (fallback {})", selection.primary, selection.fallback);

    Ok(())
}
