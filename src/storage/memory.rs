//! In-memory store client.
//!
//! Buckets and objects are held in a `tokio::sync::RwLock<HashMap<...>>`.
//! Used by the test suite and by `store.backend: memory` for local runs
//! without an S3 endpoint.
//!
//! Unlike S3, deleting a missing key reports [`StoreError::NotFound`], and
//! presigned URLs are signed locally with HMAC-SHA256 rather than SigV4.
//! They carry the same query parameter names as S3 presigned URLs.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;

use super::backend::{
    ListedObject, ObjectStore, ResponseOverrides, StoreError, StoreFuture, StoreResult,
};

/// Characters left unescaped in query values (RFC 3986 unreserved).
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// A single stored object.
#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    content_type: String,
    etag: String,
    last_modified: DateTime<Utc>,
}

/// Per-bucket state.
#[derive(Debug, Default)]
struct MemoryBucket {
    policy: Option<String>,
    region: String,
    objects: HashMap<String, MemoryObject>,
}

/// In-memory store client.
pub struct MemoryStore {
    /// bucket name -> bucket state.
    buckets: tokio::sync::RwLock<HashMap<String, MemoryBucket>>,
    /// Base URL used when rendering presigned URLs.
    base_url: String,
    /// Secret used to sign presigned URLs.
    signing_secret: String,
}

impl MemoryStore {
    /// Create an empty store that renders presigned URLs under `base_url`.
    pub fn new(base_url: &str, signing_secret: &str) -> Self {
        Self {
            buckets: tokio::sync::RwLock::new(HashMap::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            signing_secret: signing_secret.to_string(),
        }
    }

    /// Write an object with an explicit modification time.
    ///
    /// Lets tests lay out objects at known instants instead of relying on
    /// the wall clock.
    pub async fn insert_at(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
        last_modified: DateTime<Utc>,
    ) -> StoreResult<String> {
        let mut buckets = self.buckets.write().await;
        let state = buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;

        let etag = Self::compute_etag(&data);
        state.objects.insert(
            key.to_string(),
            MemoryObject {
                data,
                content_type: content_type.to_string(),
                etag: etag.clone(),
                last_modified,
            },
        );
        Ok(etag)
    }

    /// Return the stored content type of `key`, if present.
    pub async fn content_type_of(&self, bucket: &str, key: &str) -> Option<String> {
        let buckets = self.buckets.read().await;
        buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|o| o.content_type.clone())
    }

    /// Return the current policy document of `bucket`, if one was set.
    pub async fn policy_of(&self, bucket: &str) -> Option<String> {
        let buckets = self.buckets.read().await;
        buckets.get(bucket).and_then(|b| b.policy.clone())
    }

    /// Return the region `bucket` was created in.
    pub async fn region_of(&self, bucket: &str) -> Option<String> {
        let buckets = self.buckets.read().await;
        buckets.get(bucket).map(|b| b.region.clone())
    }

    /// Compute the quoted MD5-hex ETag for a byte slice.
    fn compute_etag(data: &[u8]) -> String {
        let mut hasher = Md5::new();
        hasher.update(data);
        format!("\"{}\"", hex::encode(hasher.finalize()))
    }

    /// Render a presigned URL for `method` on `bucket/key`.
    fn sign_url(
        &self,
        method: &str,
        bucket: &str,
        key: &str,
        expires_in: Duration,
        extra: &[(&str, String)],
    ) -> StoreResult<String> {
        let expires = expires_in.as_secs();
        if expires == 0 || expires > 7 * 24 * 3600 {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "presign expiry must be between 1 second and 7 days, got {expires}s"
            )));
        }

        let issued_at = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let mut query = vec![
            ("X-Amz-Date", issued_at),
            ("X-Amz-Expires", expires.to_string()),
        ];
        query.extend(extra.iter().cloned());
        query.sort_by(|a, b| a.0.cmp(b.0));

        let canonical_query = query
            .iter()
            .map(|(k, v)| format!("{k}={}", utf8_percent_encode(v, QUERY_ENCODE_SET)))
            .collect::<Vec<_>>()
            .join("&");
        let path = format!("/{bucket}/{}", encode_key_path(key));

        let mut mac = Hmac::<Sha256>::new_from_slice(self.signing_secret.as_bytes())
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("signing key: {e}")))?;
        mac.update(format!("{method}\n{path}\n{canonical_query}").as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!(
            "{}{path}?{canonical_query}&X-Amz-Signature={signature}",
            self.base_url
        ))
    }
}

/// Percent-encode each `/`-separated segment of a key.
fn encode_key_path(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, QUERY_ENCODE_SET).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn no_such_bucket(bucket: &str) -> StoreError {
    StoreError::Backend(anyhow::anyhow!("The specified bucket does not exist: {bucket}"))
}

impl ObjectStore for MemoryStore {
    fn bucket_exists<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move { Ok(self.buckets.read().await.contains_key(bucket)) })
    }

    fn create_bucket<'a>(&'a self, bucket: &'a str, region: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut buckets = self.buckets.write().await;
            if buckets.contains_key(bucket) {
                return Err(StoreError::Backend(anyhow::anyhow!(
                    "Your previous request to create the named bucket succeeded and you already own it: {bucket}"
                )));
            }
            buckets.insert(
                bucket.to_string(),
                MemoryBucket {
                    region: region.to_string(),
                    ..MemoryBucket::default()
                },
            );
            tracing::debug!("Memory bucket created: {bucket} ({region})");
            Ok(())
        })
    }

    fn set_bucket_policy<'a>(&'a self, bucket: &'a str, policy: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            serde_json::from_str::<serde_json::Value>(policy)
                .map_err(|e| StoreError::Backend(anyhow::anyhow!("malformed policy: {e}")))?;

            let mut buckets = self.buckets.write().await;
            let state = buckets
                .get_mut(bucket)
                .ok_or_else(|| no_such_bucket(bucket))?;
            state.policy = Some(policy.to_string());
            Ok(())
        })
    }

    fn put_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        data: Bytes,
        content_type: &'a str,
    ) -> StoreFuture<'a, String> {
        Box::pin(async move {
            self.insert_at(bucket, key, data, content_type, Utc::now())
                .await
        })
    }

    fn list_objects<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, Vec<ListedObject>> {
        Box::pin(async move {
            let buckets = self.buckets.read().await;
            let state = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;

            // S3 lists keys in ascending UTF-8 order.
            let mut objects: Vec<ListedObject> = state
                .objects
                .iter()
                .map(|(key, obj)| ListedObject {
                    key: key.clone(),
                    size: obj.data.len() as u64,
                    last_modified: obj.last_modified,
                    etag: obj.etag.clone(),
                    content_type: Some(obj.content_type.clone()),
                })
                .collect();
            objects.sort_by(|a, b| a.key.cmp(&b.key));
            Ok(objects)
        })
    }

    fn get_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, Bytes> {
        Box::pin(async move {
            let buckets = self.buckets.read().await;
            let state = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
            state
                .objects
                .get(key)
                .map(|obj| obj.data.clone())
                .ok_or_else(|| StoreError::NotFound {
                    key: key.to_string(),
                })
        })
    }

    fn delete_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut buckets = self.buckets.write().await;
            let state = buckets
                .get_mut(bucket)
                .ok_or_else(|| no_such_bucket(bucket))?;
            match state.objects.remove(key) {
                Some(_) => Ok(()),
                None => Err(StoreError::NotFound {
                    key: key.to_string(),
                }),
            }
        })
    }

    fn presign_get<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        expires_in: Duration,
        overrides: ResponseOverrides,
    ) -> StoreFuture<'a, String> {
        Box::pin(async move {
            let mut extra = Vec::new();
            if let Some(disposition) = overrides.content_disposition {
                extra.push(("response-content-disposition", disposition));
            }
            if let Some(content_type) = overrides.content_type {
                extra.push(("response-content-type", content_type));
            }
            self.sign_url("GET", bucket, key, expires_in, &extra)
        })
    }

    fn presign_put<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        expires_in: Duration,
    ) -> StoreFuture<'a, String> {
        Box::pin(async move { self.sign_url("PUT", bucket, key, expires_in, &[]) })
    }
}

// -- Tests -------------------------------------------------------------------
