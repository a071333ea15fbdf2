//! Content-type resolution from key extensions.
//!
//! The store does not report a content type when listing, so the type shown
//! to clients is derived from the key's extension on every read.  The
//! derived value is never written back.

/// Type returned for unknown or missing extensions.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Extensions classified as media (images) for presentation grouping.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "ico"];

/// Lowercased extension of the final path segment of `key`, if any.
fn extension(key: &str) -> Option<String> {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// MIME type for a lowercased extension, if the table knows it.
fn lookup(ext: &str) -> Option<&'static str> {
    let mime = match ext {
        // Images
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        // Documents
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" => "text/plain",
        "csv" => "text/csv",
        // Archives
        "zip" => "application/zip",
        "rar" => "application/x-rar-compressed",
        "7z" => "application/x-7z-compressed",
        "tar" => "application/x-tar",
        "gz" => "application/gzip",
        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        // Video
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "wmv" => "video/x-ms-wmv",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        // Code
        "js" => "text/javascript",
        "json" => "application/json",
        "html" => "text/html",
        "css" => "text/css",
        "xml" => "application/xml",
        _ => return None,
    };
    Some(mime)
}

/// Resolve the MIME type of `key` from its extension.
///
/// Total: unknown or missing extensions yield [`FALLBACK_CONTENT_TYPE`].
pub fn resolve(key: &str) -> &'static str {
    extension(key)
        .and_then(|ext| lookup(&ext))
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

/// Whether `key` names an image.
pub fn is_media(key: &str) -> bool {
    extension(key).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Content type for the inline image proxy.
///
/// Only image types are passed through; anything else is served as opaque
/// bytes so the proxy cannot be used to serve HTML or scripts inline.
pub fn image_content_type(key: &str) -> &'static str {
    if is_media(key) {
        resolve(key)
    } else {
        FALLBACK_CONTENT_TYPE
    }
}
