//! Object store collaborator interface.
//!
//! Everything durable lives behind [`ObjectStore`]. The gateway only needs
//! bucket provisioning plus streaming `put` and `get`; both S3 and the
//! in-memory test store implement it.

use crate::models::object::{ByteStream, ObjectDownload};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("object store request failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Streaming object store used by the gateway.
///
/// Implementations must be safe to share across request tasks.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Return whether `bucket` exists.
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool>;

    /// Create `bucket`.
    async fn create_bucket(&self, bucket: &str) -> StoreResult<()>;

    /// Store `body` under `key`, replacing any existing object.
    ///
    /// `size` is `None` when the length is unknown up front; the store must
    /// then accept the stream without collecting it whole. Either the full
    /// object becomes visible or none of it does.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream<'_>,
        size: Option<u64>,
        content_type: Option<&str>,
    ) -> StoreResult<()>;

    /// Open `key` for streaming, or fail with [`StoreError::NotFound`].
    async fn get(&self, bucket: &str, key: &str) -> StoreResult<ObjectDownload>;
}
