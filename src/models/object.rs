//! Represents an object (file) addressed in the backing bucket.

use bytes::Bytes;
use futures::Stream;
use std::{fmt, io, pin::Pin};

/// Boxed byte stream accepted by `put` and returned by `get`.
///
/// Upload streams borrow the multipart request they are read from, so the
/// lifetime stays open; download streams are always `'static`.
pub type ByteStream<'a> = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'a>>;

/// Key of a stored object within the bucket.
///
/// Keys produced by the gateway are 32 lowercase hex characters, but any
/// string read back from a request path is accepted as-is.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Externally reachable URL of an uploaded object: `{base_url}/{key}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicLink {
    pub key: ObjectKey,
    pub url: String,
}

impl PublicLink {
    pub fn new(base_url: &str, key: ObjectKey) -> Self {
        let url = format!("{}/{}", base_url, key);
        Self { key, url }
    }
}

impl fmt::Display for PublicLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// A stored object opened for reading.
///
/// `content_type` and `content_length` are whatever the store reported; the
/// payload itself is never buffered here.
pub struct ObjectDownload {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: ByteStream<'static>,
}

impl fmt::Debug for ObjectDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDownload")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}
