mod cli;
mod config;
mod harvest;
mod http;
mod state;
mod wiring;

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Mode};
use crate::config::ConfigError;
use crate::harvest::{HarvestError, HarvestRequest};
use crate::http::HttpError;
use crate::state::AppState;
use crate::wiring::WiringError;
use harvest_infra::transport::HttpTransport;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("dotenv error: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("invalid cli: {0}")]
    InvalidCli(String),
    #[error("wiring error: {0}")]
    Wiring(#[from] WiringError),
    #[error("http error: {0}")]
    Http(#[from] HttpError),
    #[error("harvest failed: {0}")]
    Harvest(#[from] HarvestError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // `.env` may set RUST_LOG.
    let dotenv_path = load_dotenv()?;
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .init();
    if let Some(path) = dotenv_path {
        info!(path = %path.display(), "loaded .env");
    }

    let cli = Cli::parse();
    let config = config::AppConfig::from_env()?;
    let state = wiring::build_state(config)?;

    match cli.mode {
        Mode::Serve => serve(state).await,
        Mode::Fetch => fetch(state, cli).await,
    }
}

fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn load_dotenv() -> Result<Option<PathBuf>, AppError> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(err) if err.not_found() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn serve(state: AppState) -> Result<(), AppError> {
    let addr = state.config.http_addr;
    let api = tokio::spawn(async move {
        info!(%addr, "http server starting");
        http::serve(addr, state).await
    });

    tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
        res = api => {
            res??;
        }
    }
    Ok(())
}

async fn fetch(state: AppState, cli: Cli) -> Result<(), AppError> {
    if cli.url.is_none() && !cli.mock {
        return Err(AppError::InvalidCli(
            "fetch mode requires --url unless --mock is set".to_string(),
        ));
    }
    let request = HarvestRequest {
        post_url: cli.url,
        account_id: cli.account_id,
        access_token: cli.access_token,
        mock: cli.mock,
    };
    let transport = HttpTransport::new(state.http_client.clone());
    let response = harvest::run(transport, &state.config, request).await?;
    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{rendered}");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install ctrl-c handler");
    }
}
