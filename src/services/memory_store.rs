//! In-process object store backing the test suite.

use crate::{
    models::object::{ByteStream, ObjectDownload},
    services::object_store::{ObjectStore, StoreError, StoreResult},
};
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, stream};
use std::{
    collections::{HashMap, HashSet},
    io,
    sync::Arc,
};
use tokio::sync::RwLock;

#[derive(Clone, Debug)]
struct StoredObject {
    payload: Bytes,
    content_type: Option<String>,
}

#[derive(Default)]
struct Inner {
    buckets: HashSet<String>,
    objects: HashMap<(String, String), StoredObject>,
}

/// Map-backed [`ObjectStore`]. Writes land only after the whole stream was
/// read, so a failed `put` leaves nothing behind.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with `bucket` already provisioned.
    pub async fn with_bucket(bucket: &str) -> Self {
        let store = Self::new();
        store
            .inner
            .write()
            .await
            .buckets
            .insert(bucket.to_string());
        store
    }

    pub async fn object_count(&self) -> usize {
        self.inner.read().await.objects.len()
    }

    pub async fn object(&self, bucket: &str, key: &str) -> Option<(Bytes, Option<String>)> {
        self.inner
            .read()
            .await
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|obj| (obj.payload.clone(), obj.content_type.clone()))
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        Ok(self.inner.read().await.buckets.contains(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.inner.write().await.buckets.insert(bucket.to_string());
        Ok(())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        mut body: ByteStream<'_>,
        _size: Option<u64>,
        content_type: Option<&str>,
    ) -> StoreResult<()> {
        if !self.bucket_exists(bucket).await? {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }

        let mut payload = BytesMut::new();
        while let Some(chunk) = body.next().await {
            payload.extend_from_slice(&chunk?);
        }

        self.inner.write().await.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                payload: payload.freeze(),
                content_type: content_type.map(str::to_owned),
            },
        );
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> StoreResult<ObjectDownload> {
        let guard = self.inner.read().await;
        if !guard.buckets.contains(bucket) {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }
        let object = guard
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;

        Ok(ObjectDownload {
            content_type: object.content_type,
            content_length: Some(object.payload.len() as u64),
            body: Box::pin(stream::once(async move {
                Ok::<_, io::Error>(object.payload)
            })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(chunks: &[&'static [u8]]) -> ByteStream<'static> {
        let items: Vec<io::Result<Bytes>> = chunks
            .iter()
            .map(|chunk| Ok(Bytes::from_static(*chunk)))
            .collect();
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn put_then_get_round_trips_payload_and_type() {
        let store = MemoryObjectStore::with_bucket("files").await;
        store
            .put("files", "k", body(&[&b"he"[..], &b"llo"[..]]), None, Some("text/plain"))
            .await
            .unwrap();

        let download = store.get("files", "k").await.unwrap();
        assert_eq!(download.content_type.as_deref(), Some("text/plain"));
        assert_eq!(download.content_length, Some(5));
        let bytes: Vec<_> = download.body.collect().await;
        assert_eq!(bytes.len(), 1);
        assert_eq!(bytes[0].as_ref().unwrap(), &Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let store = MemoryObjectStore::with_bucket("files").await;
        let err = store.get("files", "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn put_into_missing_bucket_fails() {
        let store = MemoryObjectStore::new();
        let err = store
            .put("files", "k", body(&[&b"x"[..]]), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BucketNotFound(_)));
        assert_eq!(store.object_count().await, 0);
    }

    #[tokio::test]
    async fn failed_stream_leaves_no_object() {
        let store = MemoryObjectStore::with_bucket("files").await;
        let broken: ByteStream<'static> = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::other("reset")),
        ]));
        assert!(store.put("files", "k", broken, None, None).await.is_err());
        assert!(store.object("files", "k").await.is_none());
    }
}
