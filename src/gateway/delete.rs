//! Object removal.

use tracing::{debug, error, info};

use super::Gateway;
use crate::errors::GatewayError;
use crate::metrics;

/// What a delete request found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The object existed and was removed.
    Deleted,
    /// Nothing was stored under the key.  Still a success.
    AlreadyAbsent,
}

impl Gateway {
    /// Remove `key` from the bucket.
    ///
    /// Idempotent: a missing object is reported as
    /// [`DeleteOutcome::AlreadyAbsent`], never as an error.  Only transport
    /// and permission failures are errors.
    pub async fn delete(&self, key: &str) -> Result<DeleteOutcome, GatewayError> {
        if key.is_empty() {
            return Err(GatewayError::invalid("fileName required"));
        }

        debug!("Deleting {key} from bucket {}", self.bucket());

        let outcome = match self.store.delete_object(self.bucket(), key).await {
            Ok(()) => DeleteOutcome::Deleted,
            Err(e) if e.is_not_found() => DeleteOutcome::AlreadyAbsent,
            Err(e) => {
                error!("Delete file error for {key}: {e}");
                metrics::record_operation("delete", false);
                return Err(e.into());
            }
        };

        metrics::record_operation("delete", true);
        info!("Delete {key}: {outcome:?}");
        Ok(outcome)
    }
}
