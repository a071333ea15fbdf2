//! Abstract object store client.
//!
//! Every store implementation must implement [`ObjectStore`].  The trait
//! mirrors the subset of the S3 protocol the gateway relies on, so the
//! gateway never needs to know whether it is talking to MinIO, AWS, or the
//! in-memory store used by tests.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Boxed future returned by every [`ObjectStore`] method.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by a store client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested key does not exist in the bucket.
    #[error("Object not found: {key}")]
    NotFound { key: String },

    /// Network, authentication or service failure.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Whether this error means the key is absent rather than unreachable.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// One entry of a bucket enumeration.
#[derive(Debug, Clone, PartialEq)]
pub struct ListedObject {
    /// Object key within the bucket.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time as reported by the store.
    pub last_modified: DateTime<Utc>,
    /// Opaque integrity token.
    pub etag: String,
    /// Content type recorded at write time, when the enumeration reports it.
    pub content_type: Option<String>,
}

/// Optional response-header overrides baked into a presigned GET URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseOverrides {
    /// Value for `response-content-disposition`.
    pub content_disposition: Option<String>,
    /// Value for `response-content-type`.
    pub content_type: Option<String>,
}

/// Async S3-compatible store contract.
pub trait ObjectStore: Send + Sync + 'static {
    /// Check whether `bucket` exists.
    fn bucket_exists<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, bool>;

    /// Create `bucket` in `region`.
    fn create_bucket<'a>(&'a self, bucket: &'a str, region: &'a str) -> StoreFuture<'a, ()>;

    /// Replace the bucket access policy with the given JSON document.
    fn set_bucket_policy<'a>(&'a self, bucket: &'a str, policy: &'a str) -> StoreFuture<'a, ()>;

    /// Write `data` to `key` with the given content type, returning the ETag.
    fn put_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        data: Bytes,
        content_type: &'a str,
    ) -> StoreFuture<'a, String>;

    /// Enumerate every object in `bucket`, following pagination to the end.
    fn list_objects<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, Vec<ListedObject>>;

    /// Read the full object at `key`.
    fn get_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, Bytes>;

    /// Delete the object at `key`.
    ///
    /// Stores differ on missing keys: S3 succeeds, others may return
    /// [`StoreError::NotFound`].
    fn delete_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, ()>;

    /// Produce a presigned GET URL valid for `expires_in`.
    fn presign_get<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        expires_in: Duration,
        overrides: ResponseOverrides,
    ) -> StoreFuture<'a, String>;

    /// Produce a presigned PUT URL valid for `expires_in`, bound to `key`.
    fn presign_put<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        expires_in: Duration,
    ) -> StoreFuture<'a, String>;
}
