//! OCE daemon - routes free-text questions through the scoring pipeline.

use anyhow::Result;
use clap::Parser;
use oced::config::Config;
use oced::engine::Engine;
use oced::server::{self, AppState};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oced")]
#[command(about = "OCE daemon - option/consequence pipeline over HTTP", long_about = None)]
#[command(version)]
struct Args {
    /// Config file; overrides OCE_CONFIG and the default locations
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a default config to PATH and exit
    #[arg(long, value_name = "PATH")]
    init_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if let Some(path) = args.init_config {
        return Config::save_default(&path);
    }

    info!("OCE daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let config = match args.config {
        Some(path) => {
            let mut config = Config::load_from_path(&path.to_string_lossy())?;
            config.apply_env_overrides();
            config
        }
        None => Config::load(),
    };
    info!(
        "  Router: {} intents, max {} modules; notes backend {:?}",
        config.router.intents.len(),
        config.router.max_modules,
        config.notes.backend
    );
    if config.server.api_key.is_none() {
        warn!("  No api_key configured: API routes are open");
    }

    let store = config.notes.open_store();
    let engine = Engine::new(config, store);

    server::run(AppState::new(engine), shutdown_signal()).await?;
    info!("Shutting down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
