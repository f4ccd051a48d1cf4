//! Retrieval endpoint: `{files_path}/{*key}` streams a stored object back.

use crate::{errors::AppError, models::object::ObjectKey, services::gateway_service::GatewayService};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use futures::TryStreamExt;
use tracing::{debug, error, warn};

/// Any method on `{files_path}/{*key}`.
///
/// The key is looked up as-is, so any object in the bucket is reachable.
/// Once headers are out, a store error can only cut the connection short.
pub async fn get_file(
    State(service): State<GatewayService>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let key = ObjectKey::new(key);
    let download = service.download(&key).await.map_err(|err| {
        if err.is_not_found() {
            debug!(key = %key, "object not found");
            AppError::not_found("Not found")
        } else {
            error!(key = %key, error = %err, "download failed");
            AppError::internal("Download error")
        }
    })?;

    let content_type = download
        .content_type
        .as_deref()
        .and_then(|value| HeaderValue::from_str(value).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    let content_length = download.content_length;

    let stream_key = key.clone();
    let body = Body::from_stream(download.body.inspect_err(move |err| {
        warn!(key = %stream_key, "download stream aborted: {}", err);
    }));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Some(length) = content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    Ok(response)
}
