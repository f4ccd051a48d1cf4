//! Upload endpoint.
//!
//! Mounted for every method so the ordering of checks is ours: bearer token
//! first, then method, then the multipart `file` part. The part body is handed
//! to the store as a stream and never collected here.

use crate::{
    errors::AppError,
    models::object::ByteStream,
    services::{gateway_service::GatewayService, object_store::StoreError},
};
use axum::{
    extract::{FromRequest, Multipart, Request, State, multipart::MultipartError},
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::io;
use tracing::{debug, error, warn};

/// Multipart field carrying the uploaded file.
const FILE_FIELD: &str = "file";

/// `POST /upload`: store the `file` part and answer with its public link.
pub async fn upload_file(
    State(service): State<GatewayService>,
    request: Request,
) -> Result<Response, AppError> {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if !service.upload_auth.is_authorized(authorization) {
        warn!("rejected upload with missing or invalid bearer token");
        return Err(AppError::unauthorized("Unauthorized"));
    }

    if request.method() != Method::POST {
        return Err(AppError::method_not_allowed("Only POST supported"));
    }

    let mut multipart = Multipart::from_request(request, &service)
        .await
        .map_err(|rejection| {
            debug!("upload body is not multipart: {}", rejection);
            AppError::bad_request("No file")
        })?;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                debug!("malformed multipart body: {}", err);
                return Err(body_rejection(&err));
            }
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        // A `file` part without a filename is a plain form value, not a file.
        let Some(filename) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_owned);
        let body: ByteStream<'_> = Box::pin(field.map(|chunk| chunk.map_err(io::Error::other)));

        return match service
            .upload(&filename, content_type.as_deref(), body)
            .await
        {
            Ok(link) => {
                debug!(key = %link.key, "upload complete");
                Ok(link.url.into_response())
            }
            Err(err) => Err(upload_failure(&filename, err)),
        };
    }

    Err(AppError::bad_request("No file"))
}

/// Map a failed `put` to the caller's status: 413 when the body hit the
/// upload size cap, 500 for everything else.
fn upload_failure(filename: &str, err: StoreError) -> AppError {
    if let StoreError::Io(io_err) = &err
        && let Some(body_err) = io_err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<MultipartError>())
        && body_err.status() == StatusCode::PAYLOAD_TOO_LARGE
    {
        warn!(filename, "upload exceeded size limit: {}", body_err);
        return body_rejection(body_err);
    }

    error!(filename, error = %err, "upload failed");
    AppError::internal("Upload error")
}

/// Oversized bodies are 413; any other unreadable body means there is no
/// usable file part.
fn body_rejection(err: &MultipartError) -> AppError {
    match err.status() {
        StatusCode::PAYLOAD_TOO_LARGE => {
            AppError::new(StatusCode::PAYLOAD_TOO_LARGE, "File too large")
        }
        _ => AppError::bad_request("No file"),
    }
}
