//! Defines the gateway's HTTP surface.
//!
//! ## Structure
//! - `ANY  {upload_path}`: upload a multipart `file` part (POST only, checked in the handler)
//! - `ANY  {files_path}/{*key}`: stream a stored object back
//! - `GET  /healthz`, `GET /readyz`: liveness and readiness
//!
//! The wildcard `*key` takes everything after the prefix, so keys may contain `/`.

use crate::{
    config::AppConfig,
    handlers::{
        file_handlers::get_file,
        health_handlers::{healthz, readyz},
        upload_handlers::upload_file,
    },
    services::gateway_service::GatewayService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{any, get},
};
use tower_http::trace::TraceLayer;

/// Build the router for the configured paths.
///
/// Handlers share the `GatewayService` state; the upload size cap comes from
/// `cfg.max_upload_bytes` and is lifted entirely when unset.
pub fn routes(cfg: &AppConfig) -> Router<GatewayService> {
    let body_limit = match cfg.max_upload_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(&cfg.upload_path, any(upload_file))
        .route(&format!("{}/{{*key}}", cfg.files_path), any(get_file))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
}
