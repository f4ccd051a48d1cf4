//! GatewayService: shared request state binding the object store, the target
//! bucket, key derivation and the public base URL.
//!
//! Holds no mutable state of its own; cloning is cheap and every request task
//! gets its own handle.

use crate::{
    config::{AppConfig, UploadAuth},
    models::object::{ByteStream, ObjectDownload, ObjectKey, PublicLink},
    services::{
        key_deriver::KeyDeriver,
        object_store::{ObjectStore, StoreResult},
    },
};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct GatewayService {
    /// Object store shared by all requests.
    pub store: Arc<dyn ObjectStore>,

    /// Bucket every upload and download targets.
    pub bucket: String,

    keys: KeyDeriver,

    base_url: String,

    /// Policy applied by the upload handler before any other check.
    pub upload_auth: UploadAuth,
}

impl GatewayService {
    pub fn new(cfg: &AppConfig, store: Arc<dyn ObjectStore>, keys: KeyDeriver) -> Self {
        Self {
            store,
            bucket: cfg.bucket.clone(),
            keys,
            base_url: cfg.base_url.clone(),
            upload_auth: cfg.upload_auth.clone(),
        }
    }

    /// Create the configured bucket unless it already exists.
    pub async fn ensure_bucket(&self) -> StoreResult<()> {
        if self.store.bucket_exists(&self.bucket).await? {
            debug!(bucket = %self.bucket, "bucket already exists");
            return Ok(());
        }
        self.store.create_bucket(&self.bucket).await?;
        info!(bucket = %self.bucket, "created bucket");
        Ok(())
    }

    /// Stream `body` into the bucket under the key derived from `filename`.
    ///
    /// The length is passed on as unknown; an existing object with the same
    /// key is overwritten.
    pub async fn upload(
        &self,
        filename: &str,
        content_type: Option<&str>,
        body: ByteStream<'_>,
    ) -> StoreResult<PublicLink> {
        let key = self.keys.derive(filename);
        self.store
            .put(&self.bucket, key.as_str(), body, None, content_type)
            .await?;
        info!(bucket = %self.bucket, key = %key, filename, "stored upload");
        Ok(self.link_for(key))
    }

    /// Open `key` for streaming back to a caller.
    pub async fn download(&self, key: &ObjectKey) -> StoreResult<ObjectDownload> {
        self.store.get(&self.bucket, key.as_str()).await
    }

    fn link_for(&self, key: ObjectKey) -> PublicLink {
        PublicLink::new(&self.base_url, key)
    }
}
