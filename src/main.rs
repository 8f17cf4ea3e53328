use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use claimcompass::config::Config;
use claimcompass::server::{build_router, AppState};

#[derive(Parser)]
#[command(name = "claimcompass-api")]
#[command(about = "Car damage analysis API")]
#[command(version)]
struct Args {
    /// Port to bind the HTTP server to (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,
    /// Address to bind to (overrides CLAIMCOMPASS_BIND)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let defaults = Config::from_env();
    let config = Config {
        port: args.port.unwrap_or(defaults.port),
        bind_address: args.bind.unwrap_or(defaults.bind_address),
        ..defaults
    };

    let addr = config.socket_addr().context("invalid bind address")?;
    tracing::info!(
        model = %config.openai_model,
        analysis_enabled = config.openai_api_key.is_some(),
        "starting ClaimCompass API"
    );

    let state = AppState::from_config(config).context("failed to build HTTP clients")?;
    let app = build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
