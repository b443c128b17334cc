//! `simulai serve`: start the HTTP gateway.

use anyhow::Context;
use simulai_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("Failed to load config")?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("simulai gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Storage:   {}", config.storage.backend);
    println!(
        "   Auth:      {}",
        if config.auth.url.is_some() { "identity provider" } else { "static tokens" }
    );

    simulai_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!("gateway stopped: {e}"))
}
