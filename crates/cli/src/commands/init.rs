//! `simulai init`: write the default config file.

use anyhow::Context;
use simulai_config::AppConfig;

pub fn run(force: bool) -> anyhow::Result<()> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("creating {}", config_dir.display()))?;

    if config_path.exists() && !force {
        println!("Config already exists: {}", config_path.display());
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())
        .with_context(|| format!("writing {}", config_path.display()))?;
    println!("Wrote {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  export LOVABLE_API_KEY=...   # primary engine");
    println!("  export GEMINI_API_KEY=...    # fallback engine");
    println!("  simulai serve");

    Ok(())
}
