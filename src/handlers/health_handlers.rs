//! Liveness and readiness endpoints for the gateway.
//!
//! `/healthz` only says the HTTP server is up. `/readyz` asks the object store
//! whether the upload bucket is visible, which is what uploads depend on.

use crate::services::gateway_service::GatewayService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// `GET /healthz`: the gateway process is serving requests.
pub async fn healthz() -> impl IntoResponse {
    Json(Liveness { status: "up" })
}

/// `GET /readyz`
///
/// HTTP 200 when the configured bucket exists, HTTP 503 when it is missing or
/// the store cannot be reached.
pub async fn readyz(State(service): State<GatewayService>) -> impl IntoResponse {
    let (bucket_visible, error) = match service.store.bucket_exists(&service.bucket).await {
        Ok(true) => (true, None),
        Ok(false) => (false, Some("bucket does not exist".to_string())),
        Err(e) => {
            tracing::warn!(bucket = %service.bucket, error = %e, "readiness check failed");
            (false, Some("object store unreachable".to_string()))
        }
    };

    let status = if bucket_visible {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = Readiness {
        status: if bucket_visible { "ready" } else { "unavailable" },
        bucket: service.bucket.clone(),
        bucket_visible,
        error,
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct Liveness {
    status: &'static str,
}

/// Uploads land in `bucket`; `error` says why it is not usable.
#[derive(Serialize)]
struct Readiness {
    status: &'static str,
    bucket: String,
    bucket_visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}
