//! Access URL issuance.
//!
//! Viewing and forced downloading take different paths on purpose.  A
//! [`ViewUrl`] is a plain public URL; it relies on the bucket's public-read
//! policy, so it costs nothing to build and never expires.  A
//! [`SignedDownloadUrl`] is presigned by the store and carries a
//! `response-content-disposition` override, because only a signed URL can
//! change the headers the store responds with.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, error};

use super::keys::original_name;
use super::Gateway;
use crate::errors::GatewayError;
use crate::metrics;
use crate::storage::backend::ResponseOverrides;

/// Unreserved characters (RFC 3986) stay literal in path segments.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// `attr-char` of RFC 5987; everything else is encoded in `filename*`.
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Longest lifetime a presigned URL may have (SigV4 limit).
pub const MAX_SIGNED_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// What the caller intends to do with the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessIntent {
    /// Display inline (thumbnails, previews).
    View,
    /// Save to disk regardless of content type.
    Download,
}

/// Unsigned public URL. Stable for a given key and bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewUrl(String);

impl ViewUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Time-limited presigned URL that forces an attachment download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDownloadUrl {
    url: String,
    expires_at: DateTime<Utc>,
}

impl SignedDownloadUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Instant after which the store rejects the URL.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Either kind of access URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessUrl {
    View(ViewUrl),
    SignedDownload(SignedDownloadUrl),
}

impl AccessUrl {
    pub fn as_str(&self) -> &str {
        match self {
            AccessUrl::View(url) => url.as_str(),
            AccessUrl::SignedDownload(url) => url.as_str(),
        }
    }

    /// Whether the URL carries a signature (and therefore expires).
    pub fn is_signed(&self) -> bool {
        matches!(self, AccessUrl::SignedDownload(_))
    }
}

/// Percent-encode every `/`-separated segment of `key`.
fn encode_key_path(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// ASCII-only quoted-string form of `name` for the plain `filename`
/// parameter.  Non-ASCII and control characters become `_`.
fn ascii_fallback(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('_'),
        }
    }
    out
}

/// `Content-Disposition` value that forces a download named after the
/// original filename recovered from `key`.
///
/// Carries both an ASCII `filename` and the exact UTF-8 name as
/// `filename*` (RFC 6266), which clients prefer when they understand it.
pub fn attachment_disposition(key: &str) -> String {
    let name = original_name(key);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii_fallback(name),
        utf8_percent_encode(name, ATTR_CHAR)
    )
}

impl Gateway {
    /// Public URL for viewing `key`. No store round-trip.
    pub fn view_url(&self, key: &str) -> ViewUrl {
        ViewUrl(format!(
            "{}/{}/{}",
            self.settings.public_base_url,
            encode_key_path(self.bucket()),
            encode_key_path(key)
        ))
    }

    /// Presigned GET URL that forces an attachment download.
    ///
    /// `ttl` defaults to the configured download expiry and may not exceed
    /// [`MAX_SIGNED_TTL`].  Fails closed: any signing error is returned and
    /// no URL is produced.
    pub async fn signed_download_url(
        &self,
        key: &str,
        ttl: Option<Duration>,
    ) -> Result<SignedDownloadUrl, GatewayError> {
        if key.is_empty() {
            return Err(GatewayError::invalid("fileName required"));
        }
        let ttl = ttl.unwrap_or(self.settings.download_expiry);
        if ttl.is_zero() || ttl > MAX_SIGNED_TTL {
            return Err(GatewayError::invalid(format!(
                "expiry must be between 1 and {} seconds",
                MAX_SIGNED_TTL.as_secs()
            )));
        }

        debug!("Signing download URL for {key}, expires in {ttl:?}");

        let overrides = ResponseOverrides {
            content_disposition: Some(attachment_disposition(key)),
            content_type: None,
        };
        let url = match self
            .store
            .presign_get(self.bucket(), key, ttl, overrides)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                error!("Get file URL error for {key}: {e}");
                metrics::record_operation("sign_download", false);
                return Err(e.into());
            }
        };
        metrics::record_operation("sign_download", true);

        let expires_at =
            Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        Ok(SignedDownloadUrl { url, expires_at })
    }

    /// Issue the URL matching `intent`.
    pub async fn url_for(
        &self,
        key: &str,
        intent: AccessIntent,
        ttl: Option<Duration>,
    ) -> Result<AccessUrl, GatewayError> {
        match intent {
            AccessIntent::View => {
                if key.is_empty() {
                    return Err(GatewayError::invalid("fileName required"));
                }
                Ok(AccessUrl::View(self.view_url(key)))
            }
            AccessIntent::Download => self
                .signed_download_url(key, ttl)
                .await
                .map(AccessUrl::SignedDownload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::test_support;

    #[test]
    fn test_attachment_disposition() {
        assert_eq!(
            attachment_disposition("1700000000000-0a0b0c0d-cat.png"),
            "attachment; filename=\"cat.png\"; filename*=UTF-8''cat.png"
        );
        assert_eq!(
            attachment_disposition("1700000000000-0a0b0c0d-my report (1).pdf"),
            "attachment; filename=\"my report (1).pdf\"; filename*=UTF-8''my%20report%20%281%29.pdf"
        );
        assert_eq!(
            attachment_disposition("naïve\".txt"),
            "attachment; filename=\"na_ve\\\".txt\"; filename*=UTF-8''na%C3%AFve%22.txt"
        );
        assert_eq!(
            attachment_disposition("back\\slash.txt"),
            "attachment; filename=\"back\\\\slash.txt\"; filename*=UTF-8''back%5Cslash.txt"
        );
    }

    #[tokio::test]
    async fn test_view_url_is_public_and_stable() {
        let (_store, gateway) = test_support::memory_gateway().await;

        let first = gateway.view_url("1700000000000-0a0b0c0d-cat.png");
        let second = gateway.view_url("1700000000000-0a0b0c0d-cat.png");
        assert_eq!(first, second);
        assert_eq!(
            first.as_str(),
            "https://minio.example.com/files/1700000000000-0a0b0c0d-cat.png"
        );
    }

    #[tokio::test]
    async fn test_view_url_encodes_segments() {
        let (_store, gateway) = test_support::memory_gateway().await;
        assert_eq!(
            gateway.view_url("albums/summer trip/#1.jpg").as_str(),
            "https://minio.example.com/files/albums/summer%20trip/%231.jpg"
        );
    }

    #[tokio::test]
    async fn test_view_url_needs_no_store() {
        let gateway = test_support::failing_gateway();
        let url = gateway
            .url_for("cat.png", AccessIntent::View, None)
            .await
            .unwrap();
        assert!(!url.is_signed());
        assert_eq!(url.as_str(), "https://minio.example.com/files/cat.png");
    }

    #[tokio::test]
    async fn test_signed_download_url_forces_attachment() {
        let (_store, gateway) = test_support::memory_gateway().await;

        let url = gateway
            .url_for("1700000000000-0a0b0c0d-cat.png", AccessIntent::Download, None)
            .await
            .unwrap();
        assert!(url.is_signed());
        assert!(url.as_str().contains("X-Amz-Expires=3600"));
        assert!(url
            .as_str()
            .contains("response-content-disposition=attachment%3B%20filename%3D%22cat.png%22"));
        assert!(url.as_str().contains("filename%2A%3DUTF-8%27%27cat.png"));
    }

    #[tokio::test]
    async fn test_signed_download_url_custom_ttl() {
        let (_store, gateway) = test_support::memory_gateway().await;
        let url = gateway
            .signed_download_url("cat.png", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert!(url.as_str().contains("X-Amz-Expires=60"));
        assert!(url.expires_at() > Utc::now());
    }

    #[tokio::test]
    async fn test_signed_download_url_rejects_bad_ttl() {
        let (_store, gateway) = test_support::memory_gateway().await;
        for ttl in [Duration::ZERO, MAX_SIGNED_TTL + Duration::from_secs(1)] {
            let err = gateway
                .signed_download_url("cat.png", Some(ttl))
                .await
                .unwrap_err();
            assert!(matches!(err, GatewayError::InvalidInput { .. }));
        }
    }

    #[tokio::test]
    async fn test_signed_download_url_fails_closed() {
        let gateway = test_support::failing_gateway();
        let err = gateway
            .url_for("cat.png", AccessIntent::Download, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Store(_)));
    }

    #[tokio::test]
    async fn test_empty_key_is_rejected() {
        let (_store, gateway) = test_support::memory_gateway().await;
        for intent in [AccessIntent::View, AccessIntent::Download] {
            let err = gateway.url_for("", intent, None).await.unwrap_err();
            assert!(matches!(err, GatewayError::InvalidInput { .. }));
        }
    }
}
