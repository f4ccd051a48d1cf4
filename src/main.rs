use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use services::{
    gateway_service::GatewayService, key_deriver::KeyDeriver, s3_store::S3ObjectStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = config::AppConfig::from_env_and_args().context("loading configuration")?;

    tracing::info!("Starting file-gateway with config: {:?}", cfg);

    // --- Initialize core service ---
    let store = Arc::new(S3ObjectStore::new(&cfg));
    let keys = KeyDeriver::from_process();
    tracing::debug!(disambiguator = keys.disambiguator(), "key derivation ready");
    let gateway = GatewayService::new(&cfg, store, keys);

    // --- Ensure bucket exists; no degraded startup ---
    gateway
        .ensure_bucket()
        .await
        .with_context(|| format!("ensuring bucket `{}` exists", cfg.bucket))?;

    // --- Build router ---
    let app: Router = routes::routes::routes(&cfg).with_state(gateway);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding gateway listener on {}", addr))?;

    tracing::info!(
        upload = %cfg.upload_path,
        files = %cfg.files_path,
        "gateway listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("gateway stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM so in-flight transfers can finish.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
