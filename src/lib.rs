//! filedock library -- browser-facing file manager gateway.
//!
//! This crate provides the pieces of a small HTTP service that lets a
//! browser upload, list, preview, download, and delete files held in an
//! S3-compatible object store: the storage gateway itself, the store
//! clients it runs on, and the axum surface in front of it.

pub mod config;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod storage;

use crate::config::Config;
use crate::gateway::Gateway;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Object storage gateway over the configured store client.
    pub gateway: Gateway,
}
