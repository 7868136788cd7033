//! Wayfinder: office resource locator service, admin API and CLI.

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod entities;
pub mod services;
pub mod state;

pub use config::Config;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Entry point called from main after the runtime is up.
pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    // The recorder must be installed before any counter is touched, or those
    // early increments go to the global no-op recorder.
    let prometheus_handle = if config.observability.metrics_enabled {
        Some(
            PrometheusBuilder::new()
                .install_recorder()
                .context("Failed to install Prometheus metrics recorder")?,
        )
    } else {
        None
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        None | Some(cli::Commands::Serve) => run_server(config, prometheus_handle).await,
        Some(cli::Commands::Init) => cli::commands::cmd_init_config(),
        Some(cli::Commands::Migrate) => cli::commands::cmd_migrate(&config).await,
        Some(cli::Commands::CreateAdmin { username, password }) => {
            cli::commands::cmd_create_admin(&config, &username, password).await
        }
        Some(cli::Commands::ResetPassword { username }) => {
            cli::commands::cmd_reset_password(&config, &username).await
        }
        Some(cli::Commands::ListAdmins) => cli::commands::cmd_list_admins(&config).await,
    }
}

async fn run_server(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<()> {
    let port = config.server.port;
    let state = api::create_app_state_from_config(config, prometheus_handle).await?;

    state.auth().bootstrap_default_admin().await?;

    let app = api::router(state).await;

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;
    info!("API server listening on http://0.0.0.0:{port}");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("API server error: {e}");
        }
    });

    info!("Press Ctrl+C to stop");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, stopping"),
        Err(e) => error!("Failed to listen for shutdown signal: {e}"),
    }

    server_handle.abort();
    Ok(())
}
