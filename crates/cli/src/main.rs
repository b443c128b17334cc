//! simulai CLI, the main entry point.
//!
//! Commands:
//! - `init`    Write the default config file
//! - `serve`   Start the HTTP gateway
//! - `status`  Show engine metrics, health and the current selection
//! - `ask`     Send one request through the unified engine

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "simulai",
    about = "simulai: multi-engine AI backend for bank-exam study",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write ~/.simulai/config.toml with defaults
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show engine health and the current selection
    Status,

    /// Send one prompt through the unified engine
    Ask {
        /// Action to run, e.g. chat or generate_questions
        #[arg(short, long, default_value = "chat")]
        action: String,

        /// Preferred engine (lovable or gemini)
        #[arg(short, long)]
        engine: Option<String>,

        /// Bypass the response cache
        #[arg(long)]
        skip_cache: bool,

        /// The prompt text
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init { force } => commands::init::run(force)?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Ask {
            action,
            engine,
            skip_cache,
            prompt,
        } => commands::ask::run(&action, engine.as_deref(), skip_cache, prompt).await?,
    }

    Ok(())
}
