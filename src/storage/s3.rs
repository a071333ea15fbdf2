//! S3-compatible store client.
//!
//! Talks to MinIO, AWS S3, or any other S3-compatible endpoint through the
//! AWS SDK.  Path-style addressing is forced so that self-hosted endpoints
//! without wildcard DNS work.
//!
//! The client is built from static credentials only; no credential chain or
//! IMDS lookup happens, so construction never touches the network.

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

use super::backend::{
    ListedObject, ObjectStore, ResponseOverrides, StoreError, StoreFuture, StoreResult,
};

/// Region in which S3 rejects an explicit location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// Store client backed by the AWS SDK.
pub struct S3Store {
    /// AWS S3 SDK client.
    client: Client,
}

impl S3Store {
    /// Create a client for `endpoint_url` (e.g. `https://minio.example.com:443`).
    pub fn new(endpoint_url: &str, region: &str, access_key: &str, secret_key: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "filedock-config");

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(endpoint_url)
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        debug!("S3 store client configured: endpoint={endpoint_url} region={region}");

        Self {
            client: Client::from_conf(config),
        }
    }

    /// Map an AWS SDK error to a backend error with context.
    fn map_sdk_error(context: &str, err: impl std::error::Error) -> StoreError {
        StoreError::Backend(anyhow::anyhow!(
            "S3 {context}: {}",
            DisplayErrorContext(err)
        ))
    }

    fn presigning_config(expires_in: Duration) -> StoreResult<PresigningConfig> {
        PresigningConfig::expires_in(expires_in)
            .map_err(|e| Self::map_sdk_error("presigning config", e))
    }
}

/// Convert an SDK timestamp into a UTC `DateTime`.
fn to_utc(ts: &aws_sdk_s3::primitives::DateTime) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos()).unwrap_or_default()
}

impl ObjectStore for S3Store {
    fn bucket_exists<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            debug!("S3 head_bucket: bucket={bucket}");

            match self.client.head_bucket().bucket(bucket).send().await {
                Ok(_) => Ok(true),
                Err(SdkError::ServiceError(service_err)) if service_err.err().is_not_found() => {
                    Ok(false)
                }
                Err(e) => Err(Self::map_sdk_error("head_bucket", e)),
            }
        })
    }

    fn create_bucket<'a>(&'a self, bucket: &'a str, region: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            debug!("S3 create_bucket: bucket={bucket} region={region}");

            let mut req = self.client.create_bucket().bucket(bucket);
            if region != DEFAULT_REGION {
                req = req.create_bucket_configuration(
                    CreateBucketConfiguration::builder()
                        .location_constraint(BucketLocationConstraint::from(region))
                        .build(),
                );
            }

            req.send()
                .await
                .map_err(|e| Self::map_sdk_error("create_bucket", e))?;
            Ok(())
        })
    }

    fn set_bucket_policy<'a>(&'a self, bucket: &'a str, policy: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            debug!("S3 put_bucket_policy: bucket={bucket}");

            self.client
                .put_bucket_policy()
                .bucket(bucket)
                .policy(policy)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("put_bucket_policy", e))?;
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
            debug!(
                "S3 put_object: bucket={bucket} key={key} size={} content_type={content_type}",
                data.len()
            );

            let resp = self
                .client
                .put_object()
                .bucket(bucket)
                .key(key)
                .content_type(content_type)
                .body(ByteStream::from(data))
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("put_object", e))?;

            Ok(resp.e_tag().unwrap_or_default().to_string())
        })
    }

    fn list_objects<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, Vec<ListedObject>> {
        Box::pin(async move {
            debug!("S3 list_objects_v2: bucket={bucket}");

            let mut objects = Vec::new();
            let mut continuation_token: Option<String> = None;
            loop {
                let mut req = self.client.list_objects_v2().bucket(bucket);
                if let Some(ref token) = continuation_token {
                    req = req.continuation_token(token);
                }

                let resp = req
                    .send()
                    .await
                    .map_err(|e| Self::map_sdk_error("list_objects_v2", e))?;

                for obj in resp.contents() {
                    let Some(key) = obj.key() else {
                        continue;
                    };
                    objects.push(ListedObject {
                        key: key.to_string(),
                        size: obj.size().unwrap_or(0).max(0) as u64,
                        last_modified: obj.last_modified().map(to_utc).unwrap_or_default(),
                        etag: obj.e_tag().unwrap_or_default().to_string(),
                        // ListObjectsV2 does not report Content-Type.
                        content_type: None,
                    });
                }

                match (resp.is_truncated(), resp.next_continuation_token()) {
                    (Some(true), Some(token)) => continuation_token = Some(token.to_string()),
                    _ => break,
                }
            }

            Ok(objects)
        })
    }

    fn get_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, Bytes> {
        Box::pin(async move {
            debug!("S3 get_object: bucket={bucket} key={key}");

            let resp = match self.client.get_object().bucket(bucket).key(key).send().await {
                Ok(resp) => resp,
                Err(SdkError::ServiceError(service_err)) if service_err.err().is_no_such_key() => {
                    return Err(StoreError::NotFound {
                        key: key.to_string(),
                    });
                }
                Err(e) => return Err(Self::map_sdk_error("get_object", e)),
            };

            let data = resp
                .body
                .collect()
                .await
                .map_err(|e| Self::map_sdk_error("get_object body", e))?
                .into_bytes();

            Ok(data)
        })
    }

    fn delete_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            debug!("S3 delete_object: bucket={bucket} key={key}");

            // S3 delete_object is idempotent -- no error for missing keys.
            self.client
                .delete_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("delete_object", e))?;
            Ok(())
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
            let presigning = Self::presigning_config(expires_in)?;

            let mut req = self.client.get_object().bucket(bucket).key(key);
            if let Some(disposition) = overrides.content_disposition {
                req = req.response_content_disposition(disposition);
            }
            if let Some(content_type) = overrides.content_type {
                req = req.response_content_type(content_type);
            }

            let presigned = req
                .presigned(presigning)
                .await
                .map_err(|e| Self::map_sdk_error("presign get_object", e))?;

            Ok(presigned.uri().to_string())
        })
    }

    fn presign_put<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        expires_in: Duration,
    ) -> StoreFuture<'a, String> {
        Box::pin(async move {
            let presigning = Self::presigning_config(expires_in)?;

            let presigned = self
                .client
                .put_object()
                .bucket(bucket)
                .key(key)
                .presigned(presigning)
                .await
                .map_err(|e| Self::map_sdk_error("presign put_object", e))?;

            Ok(presigned.uri().to_string())
        })
    }
}

// -- Tests -------------------------------------------------------------------
