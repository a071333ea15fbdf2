//! The object storage gateway.
//!
//! [`Gateway`] mediates between client requests and the object store.  It
//! owns no object state: every operation goes straight to the injected
//! [`ObjectStore`] client, and the only in-process state is the key
//! sequence used to keep minted keys unique.
//!
//! Each component lives in its own module and contributes an `impl Gateway`
//! block:
//!
//! - [`content_type`] resolves MIME types from key extensions.
//! - [`provision`] ensures the bucket exists and is publicly readable.
//! - [`listing`] enumerates and orders objects for presentation.
//! - [`upload`] handles proxied writes and presigned direct writes.
//! - [`urls`] issues public view URLs and signed download URLs.
//! - [`delete`] removes objects idempotently.
//! - [`retrieval`] reads whole objects for server-mediated responses.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{StoreConfig, UploadsConfig};
use crate::storage::backend::ObjectStore;

pub mod content_type;
pub mod delete;
pub mod keys;
pub mod listing;
pub mod provision;
pub mod retrieval;
pub mod upload;
pub mod urls;

pub use delete::DeleteOutcome;
pub use keys::KeyMinter;
pub use listing::{Listing, ObjectRecord};
pub use provision::ProvisionReport;
pub use upload::{UploadReceipt, UploadTicket};
pub use urls::{AccessIntent, AccessUrl, SignedDownloadUrl, ViewUrl};

/// Static settings the gateway needs besides the store client.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Bucket holding every managed object.
    pub bucket: String,
    /// Region used when the bucket has to be created.
    pub region: String,
    /// Base URL for public object links, e.g. `https://minio.example.com`.
    pub public_base_url: String,
    /// Lifetime of presigned direct-upload URLs.
    pub upload_expiry: Duration,
    /// Default lifetime of signed download URLs.
    pub download_expiry: Duration,
}

impl GatewaySettings {
    /// Derive settings from the loaded configuration.
    pub fn from_config(store: &StoreConfig, uploads: &UploadsConfig) -> Self {
        Self {
            bucket: store.bucket.clone(),
            region: store.region.clone(),
            public_base_url: store.public_base_url(),
            upload_expiry: Duration::from_secs(uploads.presign_expiry_secs),
            download_expiry: Duration::from_secs(uploads.download_expiry_secs),
        }
    }
}

/// Object storage gateway.
pub struct Gateway {
    store: Arc<dyn ObjectStore>,
    settings: GatewaySettings,
    keys: KeyMinter,
}

impl Gateway {
    /// Build a gateway over a shared store client.
    pub fn new(store: Arc<dyn ObjectStore>, settings: GatewaySettings) -> Self {
        Self {
            store,
            settings,
            keys: KeyMinter::new(),
        }
    }

    /// The bucket this gateway manages.
    pub fn bucket(&self) -> &str {
        &self.settings.bucket
    }

    /// The settings this gateway was built with.
    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }
}
