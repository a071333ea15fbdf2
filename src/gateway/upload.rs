//! Upload path selection.
//!
//! Two flows, chosen by the caller:
//!
//! - **Proxied**: the server receives the bytes and writes them to the
//!   store in one `put_object` call.  Suitable for small payloads.
//! - **Direct**: the server mints a key and hands back a presigned PUT URL
//!   bound to it; the client writes to the store without the server in the
//!   data path.  The gateway never learns whether that write happened.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use super::content_type;
use super::keys::sanitize_file_name;
use super::Gateway;
use crate::errors::GatewayError;
use crate::metrics;

/// Result of a proxied upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    /// Freshly minted storage key.
    pub key: String,
    /// ETag reported by the store.
    pub etag: String,
    /// Bytes written.
    pub size_bytes: u64,
    /// Content type the object was stored with.
    pub content_type: String,
}

/// A presigned direct-upload handle.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTicket {
    /// Presigned PUT URL.
    pub url: String,
    /// Key the URL is bound to.
    pub key: String,
    /// Instant after which the store rejects the URL.
    pub expires_at: DateTime<Utc>,
}

impl Gateway {
    fn mint_key(&self, original_name: &str) -> Result<String, GatewayError> {
        let file_name = sanitize_file_name(original_name)
            .ok_or_else(|| GatewayError::invalid("A file name is required"))?;
        Ok(self.keys.mint(&file_name))
    }

    /// Write `data` to a freshly minted key.
    ///
    /// `declared_content_type` is stored as-is when present and non-empty;
    /// otherwise the type is resolved from the filename.
    pub async fn upload(
        &self,
        original_name: &str,
        declared_content_type: Option<&str>,
        data: Bytes,
    ) -> Result<UploadReceipt, GatewayError> {
        let key = self.mint_key(original_name)?;
        let content_type = declared_content_type
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| content_type::resolve(&key))
            .to_string();
        let size_bytes = data.len() as u64;

        debug!("Uploading {key} ({size_bytes} bytes, {content_type})");

        let etag = match self
            .store
            .put_object(self.bucket(), &key, data, &content_type)
            .await
        {
            Ok(etag) => etag,
            Err(e) => {
                error!("Upload error for {key}: {e}");
                metrics::record_operation("upload", false);
                return Err(e.into());
            }
        };

        metrics::record_operation("upload", true);
        metrics::record_upload_bytes(size_bytes);
        info!("Uploaded {key} ({size_bytes} bytes)");

        Ok(UploadReceipt {
            key,
            etag,
            size_bytes,
            content_type,
        })
    }

    /// Issue a presigned PUT URL for a freshly minted key.
    ///
    /// The URL is bound to the key only; `content_type` is recorded in the
    /// logs but does not restrict what the client may send.
    pub async fn presign_upload(
        &self,
        original_name: &str,
        content_type: &str,
    ) -> Result<UploadTicket, GatewayError> {
        let key = self.mint_key(original_name)?;
        let expires_in = self.settings.upload_expiry;

        debug!("Presigning upload for {key} ({content_type}), expires in {expires_in:?}");

        let url = match self
            .store
            .presign_put(self.bucket(), &key, expires_in)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                error!("Presign upload error for {key}: {e}");
                metrics::record_operation("presign_upload", false);
                return Err(e.into());
            }
        };
        metrics::record_operation("presign_upload", true);

        let expires_at = Utc::now()
            + chrono::Duration::from_std(expires_in).unwrap_or_else(|_| chrono::Duration::zero());

        Ok(UploadTicket {
            url,
            key,
            expires_at,
        })
    }
}
