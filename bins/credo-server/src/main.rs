//! Credo scoring server.
//!
//! Loads the model bundle once at startup and serves wallet analysis and
//! credit scoring over HTTP.

mod config;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use credo_core::constants::{LOG_ENV, LOG_TARGETS};
use credo_scoring::ModelHandle;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{CONFIG_PATH_VAR, ServerConfig};

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ModelHandle>,
    pub config: Arc<ServerConfig>,
}

/// Credo wallet credit-scoring server.
#[derive(Parser, Debug)]
#[command(name = "credo-server", version, about = "Wallet credit-scoring HTTP service")]
struct Args {
    /// TOML config file (falls back to $CREDO_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address, e.g. 0.0.0.0:5000
    #[arg(long)]
    bind: Option<String>,

    /// Model bundle to load at startup
    #[arg(long)]
    model: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long)]
    log_format: Option<String>,

    /// Score with the rule-based fallback while no model is loaded
    #[arg(long)]
    fallback: bool,
}

impl Args {
    /// Layer command-line flags over the file and environment config.
    fn into_config(self) -> Result<ServerConfig> {
        let file = self
            .config
            .or_else(|| std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from));
        let mut config = ServerConfig::load(file.as_deref())?;

        if let Some(bind) = self.bind {
            config.bind_addr = bind;
        }
        if let Some(model) = self.model {
            config.model_path = model;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        config.fallback_when_unloaded |= self.fallback;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Args::parse().into_config()?;
    init_logging(&config.log_level, &config.log_format);

    info!("Credo server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        bind = %config.bind_addr,
        model = %config.model_path.display(),
        fallback = config.fallback_when_unloaded,
        "starting"
    );

    let model = Arc::new(ModelHandle::open(&config.model_path));
    if !model.is_loaded() {
        if config.fallback_when_unloaded {
            warn!("no model loaded, scoring requests use the rule-based scorer");
        } else {
            warn!("no model loaded, /predict-credit-score will answer 503");
        }
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState { model, config: Arc::new(config) };
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!("listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Credo server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down..."),
        Err(e) => {
            warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// `warn` everywhere except the workspace crates, which log at `level`.
fn default_directives(level: &str) -> String {
    LOG_TARGETS.iter().fold(String::from("warn"), |mut acc, target| {
        acc.push_str(&format!(",{target}={level}"));
        acc
    })
}

/// `CREDO_LOG`, then `RUST_LOG`, then the configured level.
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// `format = "json"` emits one flat JSON object per event; anything else
/// is human-readable text.
fn init_logging(level: &str, format: &str) {
    let registry = tracing_subscriber::registry().with(log_filter(level));
    match format {
        "json" => registry.with(fmt::layer().json().flatten_event(true)).init(),
        _ => registry.with(fmt::layer().with_target(true)).init(),
    }
}
