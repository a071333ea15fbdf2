//! Whole-object reads for server-mediated responses.
//!
//! Used by the download and image endpoints, which stream the object back
//! through the server instead of redirecting to the store.

use bytes::Bytes;
use tracing::{debug, error};

use super::Gateway;
use crate::errors::GatewayError;
use crate::metrics;

impl Gateway {
    /// Read the full contents of `key`.
    ///
    /// Returns `Ok(None)` when nothing is stored under the key.
    pub async fn fetch(&self, key: &str) -> Result<Option<Bytes>, GatewayError> {
        if key.is_empty() {
            return Err(GatewayError::invalid("fileName required"));
        }

        debug!("Fetching {key} from bucket {}", self.bucket());

        match self.store.get_object(self.bucket(), key).await {
            Ok(data) => {
                metrics::record_operation("fetch", true);
                Ok(Some(data))
            }
            Err(e) if e.is_not_found() => {
                metrics::record_operation("fetch", true);
                Ok(None)
            }
            Err(e) => {
                error!("Fetch error for {key}: {e}");
                metrics::record_operation("fetch", false);
                Err(e.into())
            }
        }
    }
}
