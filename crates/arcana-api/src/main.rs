//! `arcana-api` entry point.

use std::net::SocketAddr;
use std::process::ExitCode;

use arcana_api::config::Config;
use arcana_api::state::AppState;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    }

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("startup failed: {e}");
            return ExitCode::from(1);
        }
    };
    if config.auth_token.is_none() {
        tracing::warn!("ARCANA_AUTH_TOKEN not set; all routes are unauthenticated");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, "failed to bind: {e}");
            return ExitCode::from(1);
        }
    };
    tracing::info!(%addr, "arcana-api listening");

    if let Err(e) = axum::serve(listener, arcana_api::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("server error: {e}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("could not listen for shutdown signal: {e}");
    }
    tracing::info!("shutting down");
}
