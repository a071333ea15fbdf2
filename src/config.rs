//! Configuration loading and types for filedock.
//!
//! Configuration is read from an optional YAML file and deserialized into
//! the [`Config`] struct.  The store connection is then overridden from the
//! `MINIO_*` environment variables, which is how most deployments supply
//! the endpoint and credentials.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration problems detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required values are absent.
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<String>),

    /// A value is present but unusable.
    #[error("invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Object store connection settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Upload and URL expiry settings.
    #[serde(default)]
    pub uploads: UploadsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings (metrics endpoint).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,

    /// Maximum accepted request body in bytes (default 60 MiB).
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Object store connection.
///
/// Field names match the YAML file; each has a `MINIO_*` environment
/// override (see [`Config::apply_env_overrides`]).
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Backend type: `s3` or `memory`.
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Store host name, without scheme or port.
    #[serde(default)]
    pub endpoint: String,

    /// Store port.
    #[serde(default = "default_store_port")]
    pub port: u16,

    /// Connect over TLS.
    #[serde(default)]
    pub use_ssl: bool,

    /// Access key.
    #[serde(alias = "access_key_id", default)]
    pub access_key: String,

    /// Secret key.
    #[serde(alias = "secret_access_key", default)]
    pub secret_key: String,

    /// Bucket holding every managed object.
    #[serde(default)]
    pub bucket: String,

    /// Region used when the bucket has to be created.
    #[serde(default = "default_region")]
    pub region: String,

    /// Browser-facing base URL for public object links, when it differs
    /// from the endpoint the server connects to.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            endpoint: String::new(),
            port: default_store_port(),
            use_ssl: false,
            access_key: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            region: default_region(),
            public_url: None,
        }
    }
}

impl StoreConfig {
    fn scheme(&self) -> &'static str {
        if self.use_ssl {
            "https"
        } else {
            "http"
        }
    }

    /// URL the store client connects to. Always carries an explicit port.
    pub fn endpoint_url(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.endpoint, self.port)
    }

    /// Base URL for public object links.
    ///
    /// The port is omitted when it is the scheme default (443 for https,
    /// 80 for http).
    pub fn public_base_url(&self) -> String {
        if let Some(ref url) = self.public_url {
            return url.trim_end_matches('/').to_string();
        }
        let default_port = matches!((self.use_ssl, self.port), (true, 443) | (false, 80));
        if default_port {
            format!("{}://{}", self.scheme(), self.endpoint)
        } else {
            format!("{}://{}:{}", self.scheme(), self.endpoint, self.port)
        }
    }
}

/// Upload and link expiry settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadsConfig {
    /// Lifetime of presigned direct-upload URLs in seconds.
    #[serde(default = "default_presign_expiry")]
    pub presign_expiry_secs: u64,

    /// Default lifetime of signed download URLs in seconds.
    #[serde(default = "default_download_expiry")]
    pub download_expiry_secs: u64,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            presign_expiry_secs: default_presign_expiry(),
            download_expiry_secs: default_download_expiry(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and the `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { metrics: true }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_max_upload_bytes() -> usize {
    60 * 1024 * 1024
}

fn default_store_backend() -> String {
    "s3".to_string()
}

fn default_store_port() -> u16 {
    443
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_presign_expiry() -> u64 {
    5 * 60
}

fn default_download_expiry() -> u64 {
    60 * 60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Environment overrides ---------------------------------------------------

impl Config {
    /// Apply `MINIO_*` overrides read through `lookup`.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = &mut self.store;

        if let Some(v) = lookup("MINIO_ENDPOINT") {
            store.endpoint = v;
        }
        if let Some(v) = lookup("MINIO_PORT") {
            store.port = v.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "MINIO_PORT".to_string(),
                message: format!("'{v}' is not a port number"),
            })?;
        }
        if let Some(v) = lookup("MINIO_USE_SSL") {
            store.use_ssl = v.trim() == "true";
        }
        if let Some(v) = lookup("MINIO_ACCESS_KEY") {
            store.access_key = v;
        }
        if let Some(v) = lookup("MINIO_SECRET_KEY") {
            store.secret_key = v;
        }
        if let Some(v) = lookup("MINIO_BUCKET_NAME") {
            store.bucket = v;
        }
        if let Some(v) = lookup("MINIO_REGION") {
            store.region = v;
        }
        if let Some(v) = lookup("MINIO_PUBLIC_URL") {
            store.public_url = Some(v);
        }
        Ok(())
    }

    /// Check that every value needed to reach the store is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let store = &self.store;
        let mut missing = Vec::new();

        if store.bucket.trim().is_empty() {
            missing.push("store.bucket (MINIO_BUCKET_NAME)".to_string());
        }

        match store.backend.as_str() {
            "memory" => {}
            "s3" => {
                if store.endpoint.trim().is_empty() {
                    missing.push("store.endpoint (MINIO_ENDPOINT)".to_string());
                }
                if store.access_key.is_empty() {
                    missing.push("store.access_key (MINIO_ACCESS_KEY)".to_string());
                }
                if store.secret_key.is_empty() {
                    missing.push("store.secret_key (MINIO_SECRET_KEY)".to_string());
                }
            }
            other => {
                return Err(ConfigError::Invalid {
                    field: "store.backend".to_string(),
                    message: format!("unknown backend '{other}' (expected 's3' or 'memory')"),
                });
            }
        }

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        if self.uploads.presign_expiry_secs == 0 || self.uploads.download_expiry_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "uploads".to_string(),
                message: "expiry must be at least one second".to_string(),
            });
        }
        Ok(())
    }
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}

// -- Tests -------------------------------------------------------------------
