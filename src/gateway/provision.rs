//! Bucket provisioning.
//!
//! Runs once at startup.  Every step is attempted independently and every
//! failure is logged and swallowed: startup must not depend on the store
//! being reachable, and later operations report their own errors if the
//! bucket is genuinely unusable.

use serde_json::json;
use tracing::{error, info};

use super::Gateway;

/// What [`Gateway::ensure_bucket`] managed to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Result of the existence check; `None` if the check itself failed.
    pub existed: Option<bool>,
    /// The bucket was created by this run.
    pub created: bool,
    /// The public-read policy was applied.
    pub policy_applied: bool,
}

impl ProvisionReport {
    /// Whether the bucket is known to exist and be publicly readable.
    pub fn is_ready(&self) -> bool {
        (self.existed == Some(true) || self.created) && self.policy_applied
    }
}

/// Policy granting anonymous `s3:GetObject` on every key in `bucket`.
pub fn public_read_policy(bucket: &str) -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": { "AWS": ["*"] },
                "Action": ["s3:GetObject"],
                "Resource": [format!("arn:aws:s3:::{bucket}/*")],
            }
        ]
    })
    .to_string()
}

impl Gateway {
    /// Make sure the bucket exists and carries the public-read policy.
    ///
    /// Idempotent. Never fails; the returned report is informational.
    pub async fn ensure_bucket(&self) -> ProvisionReport {
        let bucket = self.bucket();
        let mut report = ProvisionReport::default();

        match self.store.bucket_exists(bucket).await {
            Ok(true) => {
                info!("Bucket {bucket} already exists");
                report.existed = Some(true);
            }
            Ok(false) => {
                report.existed = Some(false);
                match self.store.create_bucket(bucket, &self.settings.region).await {
                    Ok(()) => {
                        info!("Bucket {bucket} created in {}", self.settings.region);
                        report.created = true;
                    }
                    Err(e) => error!("Error creating bucket {bucket}: {e}"),
                }
            }
            Err(e) => error!("Error checking bucket {bucket}: {e}"),
        }

        let policy = public_read_policy(bucket);
        match self.store.set_bucket_policy(bucket, &policy).await {
            Ok(()) => {
                info!("Bucket {bucket} is now publicly readable");
                report.policy_applied = true;
            }
            Err(e) => error!("Error setting policy on bucket {bucket}: {e}"),
        }

        crate::metrics::record_operation("provision", report.is_ready());
        report
    }
}
