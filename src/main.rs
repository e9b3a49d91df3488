//! `sporttag` - registration service for the sports day.
//!
//! Reads `config.json` (or `--config`), connects to the Parse server and
//! serves the HTTP API. `--in-memory` swaps the Parse server for a
//! process-local store, which is handy for trying the API locally.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::Router;
use clap::Parser;
use tracing::{info, warn};

use sporttag::{http, Config, InMemoryStore, ParseStore, Registry};

/// Sports-day child registry
#[derive(Parser)]
#[command(name = "sporttag")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "SPORTTAG_CONFIG", default_value = "config.json", value_name = "FILE")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SPORTTAG_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Keep records in process memory instead of the Parse server
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    if let Ok(port) = std::env::var("PORT") {
        config.apply_port(&port)?;
    }
    config.validate(!cli.in_memory)?;

    let origin = HeaderValue::from_str(&config.allowed_origin)
        .with_context(|| format!("allowed_origin is not a header value: {}", config.allowed_origin))?;

    info!(deadline = %config.deadline, bind = %config.bind, "starting sporttag");

    let app = if cli.in_memory {
        warn!("using in-memory store, records are lost on exit");
        build_app(InMemoryStore::new(), &config, origin)
    } else {
        let store = ParseStore::new(
            config.parse_server_url.as_str(),
            config.parse_app_id.as_str(),
            config.parse_js_key.as_str(),
            config.request_timeout(),
        )
        .context("Failed to create Parse client")?;
        build_app(store, &config, origin)
    };

    http::serve(app, &config.bind)
        .await
        .with_context(|| format!("HTTP server on {} failed", config.bind))?;

    info!("sporttag stopped");
    Ok(())
}

fn build_app<S: sporttag::DocumentStore + 'static>(
    store: S,
    config: &Config,
    origin: HeaderValue,
) -> Router {
    let registry = Arc::new(Registry::new(store, config.deadline));
    http::router(registry, origin)
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
