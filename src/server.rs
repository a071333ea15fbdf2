//! Axum router construction.
//!
//! The [`app`] function wires every file manager endpoint to its handler
//! and returns a ready-to-serve [`axum::Router`].

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::errors::generate_request_id;
use crate::handlers::files;
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

// -- OpenAPI specification ----------------------------------------------------

/// OpenAPI documentation for the file manager API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "filedock API",
        version = "0.1.0",
        description = "Browser-facing file manager over an S3-compatible object store"
    ),
    paths(
        health_check,
        files::list_files,
        files::upload_file,
        files::presign_upload,
        files::file_url,
        files::delete_file,
        files::download_file,
        files::image_file,
    ),
    components(schemas(
        files::ObjectSummary,
        files::UploadResponse,
        files::PresignRequest,
        files::PresignResponse,
        files::UrlResponse,
        files::DeleteResponse,
    )),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Files", description = "File upload, listing, access, and deletion"),
    )
)]
struct ApiDoc;

/// Build the axum [`Router`] with all file manager routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json))
        .route(
            "/api/files",
            get(files::list_files)
                .post(files::upload_file)
                .delete(files::delete_file),
        )
        .route("/api/files/presign", post(files::presign_upload))
        .route("/api/files/url", get(files::file_url))
        .route("/api/files/download", get(files::download_file))
        .route("/api/files/image", get(files::image_file))
        .with_state(state)
        // Inner layers run first, outer layers wrap them.
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(common_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        // metrics_middleware is outermost (captures full request lifecycle).
        .layer(middleware::from_fn(metrics_middleware))
}

// -- Common headers middleware -----------------------------------------------

/// Adds common response headers to every response:
/// - `x-request-id`: 16-character uppercase hex string
/// - `Date`: RFC 7231 formatted timestamp
/// - `Server`: `filedock`
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if !headers.contains_key("x-request-id") {
        if let Ok(value) = HeaderValue::from_str(&generate_request_id()) {
            headers.insert("x-request-id", value);
        }
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    if let Ok(value) = HeaderValue::from_str(&date) {
        headers.insert("date", value);
    }
    headers.insert("server", HeaderValue::from_static("filedock"));

    response
}

// -- Health check ------------------------------------------------------------

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "HealthCheck",
    responses(
        (status = 200, description = "Health check OK")
    )
)]
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

/// `GET /openapi.json` -- The generated OpenAPI document.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::gateway::keys::original_name;
    use crate::gateway::test_support::{self, BUCKET};
    use crate::storage::memory::MemoryStore;
    use axum::body::Body;
    use bytes::Bytes;
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "filedock-test-boundary";

    async fn memory_app() -> (Arc<MemoryStore>, Router) {
        let (store, gateway) = test_support::memory_gateway().await;
        let state = Arc::new(AppState {
            config: Config::default(),
            gateway,
        });
        (store, app(state))
    }

    fn failing_app() -> Router {
        app(Arc::new(AppState {
            config: Config::default(),
            gateway: test_support::failing_gateway(),
        }))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn multipart_upload(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/files")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn delete(uri: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    async fn upload(app: &Router, file_name: &str, content_type: &str, data: &[u8]) -> String {
        let response = app
            .clone()
            .oneshot(multipart_upload("file", file_name, content_type, data))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        json["fileName"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_carries_common_headers() {
        let (_store, app) = memory_app().await;
        let response = app.oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["server"], "filedock");
        assert_eq!(headers["x-request-id"].len(), 16);
        assert!(headers.contains_key("date"));
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_upload_then_list() {
        let (_store, app) = memory_app().await;

        let report = upload(&app, "report.pdf", "application/pdf", &[0u8; 5000]).await;
        let cat = upload(&app, "cat.png", "image/png", &[0u8; 2048]).await;
        assert_eq!(original_name(&cat), "cat.png");

        let response = app.oneshot(get("/api/files")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed = body_json(response).await;
        let listed = listed.as_array().unwrap();
        assert_eq!(listed.len(), 2);

        assert_eq!(listed[0]["key"], cat.as_str());
        assert_eq!(listed[0]["isMedia"], true);
        assert_eq!(listed[0]["contentType"], "image/png");
        assert_eq!(listed[0]["sizeBytes"], 2048);
        assert!(listed[0]["lastModified"].as_str().unwrap().ends_with('Z'));

        assert_eq!(listed[1]["key"], report.as_str());
        assert_eq!(listed[1]["isMedia"], false);
        assert_eq!(listed[1]["sizeBytes"], 5000);
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let (_store, app) = memory_app().await;
        let response = app
            .oneshot(multipart_upload("attachment", "cat.png", "image/png", b"x"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "No file provided");
    }

    #[tokio::test]
    async fn test_upload_over_limit_is_rejected() {
        let (_store, gateway) = test_support::memory_gateway().await;
        let mut config = Config::default();
        config.server.max_upload_bytes = 1024;
        let app = app(Arc::new(AppState { config, gateway }));

        let response = app
            .oneshot(multipart_upload("file", "big.bin", "application/octet-stream", &[1u8; 4096]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(response).await["code"], "PayloadTooLarge");
    }

    #[tokio::test]
    async fn test_presign_upload() {
        let (_store, app) = memory_app().await;
        let response = app
            .oneshot(json_post(
                "/api/files/presign",
                serde_json::json!({"fileName": "movie.mp4", "contentType": "video/mp4"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        let key = json["fileName"].as_str().unwrap();
        assert_eq!(original_name(key), "movie.mp4");
        assert!(json["url"].as_str().unwrap().contains(key));
        assert!(json["url"].as_str().unwrap().contains("X-Amz-Expires=300"));
        assert!(json["expiresAt"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_presign_upload_validation() {
        let (_store, app) = memory_app().await;

        let response = app
            .clone()
            .oneshot(json_post(
                "/api/files/presign",
                serde_json::json!({"fileName": "", "contentType": "video/mp4"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(json_post(
                "/api/files/presign",
                serde_json::json!({"contentType": "video/mp4"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_missing_file_name_is_bad_request() {
        let (_store, app) = memory_app().await;
        for request in [
            get("/api/files/url"),
            get("/api/files/download"),
            get("/api/files/image?fileName="),
            delete("/api/files"),
        ] {
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await["error"], "fileName required");
        }
    }

    #[tokio::test]
    async fn test_view_and_download_urls() {
        let (_store, app) = memory_app().await;

        let response = app
            .clone()
            .oneshot(get("/api/files/url?fileName=1700000000000-0a0b0c0d-cat.png"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["signed"], false);
        assert_eq!(
            json["url"],
            "https://minio.example.com/files/1700000000000-0a0b0c0d-cat.png"
        );
        assert!(json.get("expiresAt").is_none());

        let response = app
            .oneshot(get(
                "/api/files/url?fileName=1700000000000-0a0b0c0d-cat.png&download=true&expiry=120",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["signed"], true);
        let url = json["url"].as_str().unwrap();
        assert!(url.contains("X-Amz-Expires=120"));
        assert!(url.contains("response-content-disposition=attachment%3B%20filename%3D%22cat.png%22"));
        assert!(json["expiresAt"].is_string());
    }

    #[tokio::test]
    async fn test_delete_twice_succeeds() {
        let (_store, app) = memory_app().await;
        let key = upload(&app, "notes.txt", "text/plain", b"hello").await;
        let uri = format!("/api/files?fileName={key}");

        for _ in 0..2 {
            let response = app.clone().oneshot(delete(&uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_json(response).await["success"], true);
        }

        let listed = body_json(app.oneshot(get("/api/files")).await.unwrap()).await;
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_forces_attachment() {
        let (store, app) = memory_app().await;
        store
            .insert_at(
                BUCKET,
                "1700000000000-0a0b0c0d-my report.pdf",
                Bytes::from_static(b"%PDF-1.7"),
                "application/pdf",
                chrono::Utc::now(),
            )
            .await
            .unwrap();

        let response = app
            .oneshot(get(
                "/api/files/download?fileName=1700000000000-0a0b0c0d-my%20report.pdf",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/octet-stream");
        assert_eq!(
            response.headers()["content-disposition"],
            "attachment; filename=\"my report.pdf\"; filename*=UTF-8''my%20report.pdf"
        );
        assert_eq!(body_bytes(response).await, Bytes::from_static(b"%PDF-1.7"));
    }

    #[tokio::test]
    async fn test_image_is_cached_inline() {
        let (_store, app) = memory_app().await;
        let key = upload(&app, "dog.JPG", "image/jpeg", b"\xff\xd8\xff").await;

        let response = app
            .oneshot(get(&format!("/api/files/image?fileName={key}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "image/jpeg");
        assert_eq!(
            response.headers()["cache-control"],
            "public, max-age=31536000, immutable"
        );
        assert!(!response.headers().contains_key("content-disposition"));
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn test_svg_image_is_sandboxed() {
        let (_store, app) = memory_app().await;
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg"><script>alert(1)</script></svg>"#;
        let key = upload(&app, "logo.svg", "image/svg+xml", svg).await;

        let response = app
            .oneshot(get(&format!("/api/files/image?fileName={key}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "image/svg+xml");
        assert_eq!(response.headers()["content-security-policy"], "sandbox");
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let (_store, app) = memory_app().await;
        let response = app
            .oneshot(get("/api/files/download?fileName=missing.txt"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "File not found");
    }

    #[tokio::test]
    async fn test_store_outage() {
        let app = failing_app();

        let response = app.clone().oneshot(get("/api/files")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await.as_array().unwrap().is_empty());

        let response = app
            .oneshot(multipart_upload("file", "cat.png", "image/png", b"x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("ECONNREFUSED"));
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let (_store, app) = memory_app().await;
        let response = app.oneshot(get("/openapi.json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let doc = body_json(response).await;
        for path in [
            "/health",
            "/api/files",
            "/api/files/presign",
            "/api/files/url",
            "/api/files/download",
            "/api/files/image",
        ] {
            assert!(doc["paths"].get(path).is_some(), "missing {path}");
        }
    }
}
