//! File manager HTTP handlers.
//!
//! Thin adapters between the JSON/byte contract the browser speaks and the
//! [`Gateway`](crate::gateway::Gateway) operations.  Every failure goes out
//! through [`GatewayError`]'s `IntoResponse`, so callers always get the
//! `{"success": false, "error": ...}` shape.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::errors::GatewayError;
use crate::gateway::content_type::image_content_type;
use crate::gateway::urls::attachment_disposition;
use crate::gateway::{AccessIntent, AccessUrl, DeleteOutcome, ObjectRecord};
use crate::AppState;

/// Multipart field carrying the uploaded file.
const FILE_FIELD: &str = "file";

/// Images never change under a given key, so clients may cache them forever.
const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";

// -- Request / response bodies ------------------------------------------------

/// One object in a listing.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    pub key: String,
    pub size_bytes: u64,
    /// ISO-8601 UTC with millisecond precision.
    pub last_modified: String,
    pub etag: String,
    pub content_type: String,
    pub is_media: bool,
}

impl From<ObjectRecord> for ObjectSummary {
    fn from(record: ObjectRecord) -> Self {
        Self {
            key: record.key,
            size_bytes: record.size_bytes,
            last_modified: iso_millis(record.last_modified),
            etag: record.etag,
            content_type: record.content_type,
            is_media: record.is_media,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    /// Storage key the file was written under.
    pub file_name: String,
    pub message: String,
}

/// Request for a presigned direct-upload URL.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest {
    /// Original filename as chosen by the user.
    #[garde(length(chars, min = 1, max = 1024))]
    pub file_name: String,
    /// MIME type the client intends to upload.
    #[garde(length(min = 1))]
    pub content_type: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresignResponse {
    pub success: bool,
    /// Presigned PUT URL.
    pub url: String,
    /// Storage key the URL is bound to.
    pub file_name: String,
    pub expires_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UrlResponse {
    pub success: bool,
    pub url: String,
    /// Whether the URL is presigned and therefore expires.
    pub signed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

/// `?fileName=` query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileQuery {
    pub file_name: Option<String>,
}

/// `?fileName=&download=&expiry=` query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlQuery {
    pub file_name: Option<String>,
    #[serde(default)]
    pub download: bool,
    /// Signed URL lifetime in seconds.
    pub expiry: Option<u64>,
}

// -- Helpers ------------------------------------------------------------------

fn iso_millis(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Extract a non-empty `fileName` or fail with 400.
fn required_file_name(file_name: Option<String>) -> Result<String, GatewayError> {
    file_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| GatewayError::invalid("fileName required"))
}

fn query_error(rejection: QueryRejection) -> GatewayError {
    GatewayError::invalid(rejection.body_text())
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/files` -- List every object, media first then newest first.
#[utoipa::path(
    get,
    path = "/api/files",
    tag = "Files",
    operation_id = "ListFiles",
    responses(
        (status = 200, description = "Objects in presentation order", body = [ObjectSummary])
    )
)]
pub async fn list_files(State(state): State<Arc<AppState>>) -> Json<Vec<ObjectSummary>> {
    let records = state.gateway.list().await;
    Json(records.into_iter().map(ObjectSummary::from).collect())
}

/// `POST /api/files` -- Server-proxied upload of a multipart `file` field.
#[utoipa::path(
    post,
    path = "/api/files",
    tag = "Files",
    operation_id = "UploadFile",
    request_body(content_type = "multipart/form-data", description = "Form with a `file` field"),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file provided"),
        (status = 413, description = "File exceeds the upload limit"),
        (status = 502, description = "Object store failure")
    )
)]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, GatewayError> {
    let mut upload: Option<(String, Option<String>, Bytes)> = None;

    let limit = state.config.server.max_upload_bytes;
    let multipart_error = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            GatewayError::PayloadTooLarge { limit }
        } else {
            GatewayError::invalid(e.body_text())
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;
        upload = Some((file_name, content_type, data));
        break;
    }

    let Some((file_name, content_type, data)) = upload else {
        return Err(GatewayError::invalid("No file provided"));
    };

    let receipt = state
        .gateway
        .upload(&file_name, content_type.as_deref(), data)
        .await?;

    Ok(Json(UploadResponse {
        success: true,
        file_name: receipt.key,
        message: "File uploaded successfully".to_string(),
    }))
}

/// `POST /api/files/presign` -- Issue a presigned PUT URL for a direct upload.
#[utoipa::path(
    post,
    path = "/api/files/presign",
    tag = "Files",
    operation_id = "PresignUpload",
    request_body = PresignRequest,
    responses(
        (status = 200, description = "Presigned upload URL", body = PresignResponse),
        (status = 400, description = "Invalid request"),
        (status = 502, description = "Object store failure")
    )
)]
pub async fn presign_upload(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PresignRequest>, JsonRejection>,
) -> Result<Json<PresignResponse>, GatewayError> {
    let Json(req) = payload.map_err(|e| GatewayError::invalid(e.body_text()))?;
    req.validate()
        .map_err(|report| GatewayError::invalid(report.to_string()))?;

    let ticket = state
        .gateway
        .presign_upload(&req.file_name, &req.content_type)
        .await?;

    Ok(Json(PresignResponse {
        success: true,
        url: ticket.url,
        file_name: ticket.key,
        expires_at: iso_millis(ticket.expires_at),
    }))
}

/// `GET /api/files/url` -- Public view URL, or a signed download URL when
/// `download=true`.
#[utoipa::path(
    get,
    path = "/api/files/url",
    tag = "Files",
    operation_id = "GetFileUrl",
    params(
        ("fileName" = String, Query, description = "Object key"),
        ("download" = Option<bool>, Query, description = "Force an attachment download"),
        ("expiry" = Option<u64>, Query, description = "Signed URL lifetime in seconds")
    ),
    responses(
        (status = 200, description = "Access URL", body = UrlResponse),
        (status = 400, description = "fileName required"),
        (status = 502, description = "Signing failed")
    )
)]
pub async fn file_url(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UrlQuery>, QueryRejection>,
) -> Result<Json<UrlResponse>, GatewayError> {
    let Query(query) = query.map_err(query_error)?;
    let key = required_file_name(query.file_name)?;
    let intent = if query.download {
        AccessIntent::Download
    } else {
        AccessIntent::View
    };

    let url = state
        .gateway
        .url_for(&key, intent, query.expiry.map(Duration::from_secs))
        .await?;

    let expires_at = match &url {
        AccessUrl::SignedDownload(signed) => Some(iso_millis(signed.expires_at())),
        AccessUrl::View(_) => None,
    };
    Ok(Json(UrlResponse {
        success: true,
        url: url.as_str().to_string(),
        signed: url.is_signed(),
        expires_at,
    }))
}

/// `DELETE /api/files` -- Delete an object. Succeeds if it is already gone.
#[utoipa::path(
    delete,
    path = "/api/files",
    tag = "Files",
    operation_id = "DeleteFile",
    params(("fileName" = String, Query, description = "Object key")),
    responses(
        (status = 200, description = "Object deleted or already absent", body = DeleteResponse),
        (status = 400, description = "fileName required"),
        (status = 502, description = "Object store failure")
    )
)]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FileQuery>, QueryRejection>,
) -> Result<Json<DeleteResponse>, GatewayError> {
    let Query(query) = query.map_err(query_error)?;
    let key = required_file_name(query.file_name)?;

    let message = match state.gateway.delete(&key).await? {
        DeleteOutcome::Deleted => "File deleted successfully",
        DeleteOutcome::AlreadyAbsent => "File was already deleted",
    };
    Ok(Json(DeleteResponse {
        success: true,
        message: message.to_string(),
    }))
}

/// `GET /api/files/download` -- Stream an object back as an attachment.
#[utoipa::path(
    get,
    path = "/api/files/download",
    tag = "Files",
    operation_id = "DownloadFile",
    params(("fileName" = String, Query, description = "Object key")),
    responses(
        (status = 200, description = "Object bytes", content_type = "application/octet-stream"),
        (status = 400, description = "fileName required"),
        (status = 404, description = "File not found"),
        (status = 502, description = "Object store failure")
    )
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FileQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let Query(query) = query.map_err(query_error)?;
    let key = required_file_name(query.file_name)?;

    let data = state
        .gateway
        .fetch(&key)
        .await?
        .ok_or_else(|| GatewayError::NotFound { key: key.clone() })?;

    debug!("Serving {key} as attachment ({} bytes)", data.len());

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, attachment_disposition(&key)),
        ],
        data,
    )
        .into_response())
}

/// `GET /api/files/image` -- Serve an image inline with long-lived caching.
#[utoipa::path(
    get,
    path = "/api/files/image",
    tag = "Files",
    operation_id = "GetImage",
    params(("fileName" = String, Query, description = "Object key")),
    responses(
        (status = 200, description = "Image bytes"),
        (status = 400, description = "fileName required"),
        (status = 404, description = "File not found"),
        (status = 502, description = "Object store failure")
    )
)]
pub async fn image_file(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FileQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let Query(query) = query.map_err(query_error)?;
    let key = required_file_name(query.file_name)?;

    let data = state
        .gateway
        .fetch(&key)
        .await?
        .ok_or_else(|| GatewayError::NotFound { key: key.clone() })?;

    Ok((
        [
            (header::CONTENT_TYPE, image_content_type(&key)),
            (header::CACHE_CONTROL, IMMUTABLE_CACHE),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            // Inline SVG may carry script; keep it out of the page origin.
            (header::CONTENT_SECURITY_POLICY, "sandbox"),
        ],
        data,
    )
        .into_response())
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_object_summary_serialization() {
        let record = ObjectRecord {
            key: "1700000000000-0a0b0c0d-cat.png".to_string(),
            size_bytes: 2048,
            last_modified: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
            etag: "\"abc\"".to_string(),
            content_type: "image/png".to_string(),
            is_media: true,
        };

        let json = serde_json::to_value(ObjectSummary::from(record)).unwrap();
        assert_eq!(json["key"], "1700000000000-0a0b0c0d-cat.png");
        assert_eq!(json["sizeBytes"], 2048);
        assert_eq!(json["lastModified"], "2023-11-14T22:13:20.123Z");
        assert_eq!(json["etag"], "\"abc\"");
        assert_eq!(json["contentType"], "image/png");
        assert_eq!(json["isMedia"], true);
    }

    #[test]
    fn test_presign_request_validation() {
        let ok: PresignRequest =
            serde_json::from_str(r#"{"fileName":"cat.png","contentType":"image/png"}"#).unwrap();
        assert!(ok.validate().is_ok());

        let empty_name = PresignRequest {
            file_name: String::new(),
            content_type: "image/png".to_string(),
        };
        assert!(empty_name.validate().is_err());

        let empty_type = PresignRequest {
            file_name: "cat.png".to_string(),
            content_type: String::new(),
        };
        assert!(empty_type.validate().is_err());

        let long_name = PresignRequest {
            file_name: "é".repeat(1024),
            content_type: "text/plain".to_string(),
        };
        assert!(long_name.validate().is_ok());

        let too_long = PresignRequest {
            file_name: "a".repeat(1025),
            content_type: "text/plain".to_string(),
        };
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_url_response_omits_missing_expiry() {
        let json = serde_json::to_value(UrlResponse {
            success: true,
            url: "https://minio.example.com/files/cat.png".to_string(),
            signed: false,
            expires_at: None,
        })
        .unwrap();
        assert!(json.get("expiresAt").is_none());
        assert_eq!(json["signed"], false);
    }

    #[test]
    fn test_required_file_name() {
        assert_eq!(required_file_name(Some("a.txt".into())).unwrap(), "a.txt");
        assert!(required_file_name(Some(String::new())).is_err());
        assert!(required_file_name(None).is_err());
    }
}
