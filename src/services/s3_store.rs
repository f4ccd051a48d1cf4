//! S3-compatible object store (MinIO in the reference deployment).
//!
//! Uploads of unknown length are buffered one part at a time: a stream that
//! ends inside the first part goes out as a single `PutObject`, anything
//! longer becomes a multipart upload that is aborted if any step fails.
//! Downloads forward the `GetObject` body as it arrives.

use crate::{
    config::AppConfig,
    models::object::{ByteStream, ObjectDownload},
    services::object_store::{ObjectStore, StoreError, StoreResult},
};
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::ByteStream as S3ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
};
use bytes::BytesMut;
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Smallest part size S3 accepts for every part but the last.
const PART_SIZE: usize = 5 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Build a client for the endpoint and static credentials in `cfg`.
    pub fn new(cfg: &AppConfig) -> Self {
        let credentials = Credentials::new(
            cfg.access_key.clone(),
            cfg.secret_key.clone(),
            None,
            None,
            "file-gateway",
        );

        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(cfg.region.clone()))
            .endpoint_url(cfg.endpoint_url())
            .force_path_style(true)
            .build();

        debug!(endpoint = %cfg.endpoint_url(), region = %cfg.region, "initialized S3 client");

        Self::with_client(Client::from_conf(s3_config))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn put_single(
        &self,
        bucket: &str,
        key: &str,
        buffer: BytesMut,
        content_type: Option<&str>,
    ) -> StoreResult<()> {
        let len = buffer.len() as i64;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_owned))
            .content_length(len)
            .body(S3ByteStream::from(buffer.freeze()))
            .send()
            .await
            .map_err(|err| backend_error("PutObject", err))?;

        debug!(bucket, key, size = len, "stored object with single put");
        Ok(())
    }

    async fn put_multipart(
        &self,
        bucket: &str,
        key: &str,
        buffer: BytesMut,
        body: ByteStream<'_>,
        content_type: Option<&str>,
    ) -> StoreResult<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_owned))
            .send()
            .await
            .map_err(|err| backend_error("CreateMultipartUpload", err))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| StoreError::Backend("CreateMultipartUpload returned no upload id".into()))?
            .to_string();

        let parts = match self.upload_parts(bucket, key, &upload_id, buffer, body).await {
            Ok(parts) => parts,
            Err(err) => {
                self.abort_multipart(bucket, key, &upload_id).await;
                return Err(err);
            }
        };
        let part_count = parts.len();

        let completed = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await;
        if let Err(err) = completed {
            self.abort_multipart(bucket, key, &upload_id).await;
            return Err(backend_error("CompleteMultipartUpload", err));
        }

        debug!(bucket, key, parts = part_count, "stored object with multipart upload");
        Ok(())
    }

    /// Upload `buffer` as part 1, then keep refilling it from `body`.
    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        mut buffer: BytesMut,
        mut body: ByteStream<'_>,
    ) -> StoreResult<Vec<CompletedPart>> {
        let mut parts = Vec::new();
        let mut part_number: i32 = 1;
        let mut finished = false;

        loop {
            let chunk = buffer.split().freeze();
            if !chunk.is_empty() {
                let uploaded = self
                    .client
                    .upload_part()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(upload_id)
                    .part_number(part_number)
                    .content_length(chunk.len() as i64)
                    .body(S3ByteStream::from(chunk))
                    .send()
                    .await
                    .map_err(|err| backend_error("UploadPart", err))?;
                parts.push(
                    CompletedPart::builder()
                        .set_e_tag(uploaded.e_tag().map(str::to_owned))
                        .part_number(part_number)
                        .build(),
                );
                part_number += 1;
            }
            if finished {
                break;
            }
            finished = fill_part(&mut body, &mut buffer).await?;
        }

        Ok(parts)
    }

    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) {
        if let Err(err) = self
            .client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            warn!(
                bucket,
                key,
                upload_id,
                error = %DisplayErrorContext(&err),
                "failed to abort multipart upload"
            );
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(service_err)) if service_err.err().is_not_found() => {
                Ok(false)
            }
            Err(err) => Err(backend_error("HeadBucket", err)),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|err| backend_error("CreateBucket", err))?;
        Ok(())
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        mut body: ByteStream<'_>,
        size: Option<u64>,
        content_type: Option<&str>,
    ) -> StoreResult<()> {
        let mut buffer = BytesMut::with_capacity(match size {
            Some(len) => (len as usize).min(PART_SIZE),
            None => PART_SIZE,
        });

        if fill_part(&mut body, &mut buffer).await? {
            self.put_single(bucket, key, buffer, content_type).await
        } else {
            self.put_multipart(bucket, key, buffer, body, content_type)
                .await
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> StoreResult<ObjectDownload> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| match err {
                SdkError::ServiceError(service_err) if service_err.err().is_no_such_key() => {
                    StoreError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                }
                SdkError::ServiceError(service_err)
                    if service_err.err().code() == Some("NoSuchBucket") =>
                {
                    StoreError::BucketNotFound(bucket.to_string())
                }
                other => backend_error("GetObject", other),
            })?;

        let content_type = output.content_type().map(str::to_owned);
        let content_length = output
            .content_length()
            .and_then(|len| u64::try_from(len).ok());
        let body = ReaderStream::new(output.body.into_async_read());

        Ok(ObjectDownload {
            content_type,
            content_length,
            body: Box::pin(body),
        })
    }
}

/// Pull chunks from `body` until `buffer` holds a full part.
///
/// Returns `true` once the stream is exhausted.
async fn fill_part(body: &mut ByteStream<'_>, buffer: &mut BytesMut) -> StoreResult<bool> {
    while buffer.len() < PART_SIZE {
        match body.next().await {
            Some(chunk) => buffer.extend_from_slice(&chunk?),
            None => return Ok(true),
        }
    }
    Ok(false)
}

fn backend_error<E, R>(operation: &str, err: SdkError<E, R>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    StoreError::Backend(format!("{} failed: {}", operation, DisplayErrorContext(&err)))
}
