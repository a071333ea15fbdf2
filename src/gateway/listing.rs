//! Object metadata listing.
//!
//! A listing drains the store's full enumeration, enriches each entry with
//! its resolved content type and media classification, and orders the
//! result for presentation: media first, then newest first within each
//! group.  The order is recomputed on every call.

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use super::content_type;
use super::Gateway;
use crate::storage::backend::ListedObject;

/// One object as presented to clients.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    /// Storage key, unique within the bucket.
    pub key: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modification time reported by the store.
    pub last_modified: DateTime<Utc>,
    /// Opaque integrity token.
    pub etag: String,
    /// MIME type recorded at write time, else derived from the key's
    /// extension.  Never empty.
    pub content_type: String,
    /// Whether the key names an image.
    pub is_media: bool,
}

impl From<ListedObject> for ObjectRecord {
    fn from(obj: ListedObject) -> Self {
        let content_type = match obj.content_type {
            Some(stored) if !stored.trim().is_empty() => stored,
            _ => content_type::resolve(&obj.key).to_string(),
        };
        let is_media = content_type::is_media(&obj.key);
        Self {
            key: obj.key,
            size_bytes: obj.size,
            last_modified: obj.last_modified,
            etag: obj.etag,
            content_type,
            is_media,
        }
    }
}

/// Outcome of a listing that keeps "no files" apart from "store down".
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    /// At least one object, in presentation order.
    Listed(Vec<ObjectRecord>),
    /// The store answered and the bucket is empty.
    Empty,
    /// The enumeration failed; carries the error message.
    Unavailable(String),
}

impl Listing {
    /// Collapse to a plain sequence; failures become an empty sequence.
    pub fn into_records(self) -> Vec<ObjectRecord> {
        match self {
            Listing::Listed(records) => records,
            Listing::Empty | Listing::Unavailable(_) => Vec::new(),
        }
    }

    /// Whether the listing failed.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Listing::Unavailable(_))
    }
}

/// Sort records into presentation order.
///
/// Media before non-media, then descending `last_modified`.  Ties on both
/// fall back to the key so repeated listings come out identical.
pub fn presentation_order(records: &mut [ObjectRecord]) {
    records.sort_by(|a, b| {
        b.is_media
            .cmp(&a.is_media)
            .then_with(|| b.last_modified.cmp(&a.last_modified))
            .then_with(|| a.key.cmp(&b.key))
    });
}

impl Gateway {
    /// List every object in presentation order.
    ///
    /// Store failures are logged and reported as an empty list; use
    /// [`Gateway::list_detailed`] to tell the two apart.
    pub async fn list(&self) -> Vec<ObjectRecord> {
        self.list_detailed().await.into_records()
    }

    /// List every object, distinguishing an empty bucket from a failure.
    pub async fn list_detailed(&self) -> Listing {
        debug!("Listing objects in bucket {}", self.bucket());

        let listed = match self.store.list_objects(self.bucket()).await {
            Ok(listed) => listed,
            Err(e) => {
                error!("List files error: {e}");
                crate::metrics::record_operation("list", false);
                return Listing::Unavailable(e.to_string());
            }
        };
        crate::metrics::record_operation("list", true);

        if listed.is_empty() {
            return Listing::Empty;
        }

        let mut records: Vec<ObjectRecord> = listed.into_iter().map(ObjectRecord::from).collect();
        presentation_order(&mut records);
        Listing::Listed(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::test_support::{self, BUCKET};
    use bytes::Bytes;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn record(key: &str, secs: i64) -> ObjectRecord {
        ObjectRecord::from(ListedObject {
            key: key.to_string(),
            size: 1,
            last_modified: at(secs),
            etag: "\"e\"".to_string(),
            content_type: None,
        })
    }

    fn keys(records: &[ObjectRecord]) -> Vec<&str> {
        records.iter().map(|r| r.key.as_str()).collect()
    }

    #[test]
    fn test_record_enrichment() {
        let r = record("1-cat.PNG", 0);
        assert_eq!(r.content_type, "image/png");
        assert!(r.is_media);

        let r = record("1-notes", 0);
        assert_eq!(r.content_type, "application/octet-stream");
        assert!(!r.is_media);
    }

    #[test]
    fn test_stored_content_type_wins_over_extension() {
        let r = ObjectRecord::from(ListedObject {
            key: "1-data.bin".to_string(),
            size: 1,
            last_modified: at(0),
            etag: "\"e\"".to_string(),
            content_type: Some("application/x-custom".to_string()),
        });
        assert_eq!(r.content_type, "application/x-custom");

        let r = ObjectRecord::from(ListedObject {
            key: "1-cat.png".to_string(),
            size: 1,
            last_modified: at(0),
            etag: "\"e\"".to_string(),
            content_type: Some("  ".to_string()),
        });
        assert_eq!(r.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_list_reports_declared_content_type() {
        let (_store, gateway) = test_support::memory_gateway().await;
        gateway
            .upload("notes", Some("text/markdown"), Bytes::from_static(b"# hi"))
            .await
            .unwrap();

        let listed = gateway.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content_type, "text/markdown");
        assert!(!listed[0].is_media);
    }

    #[test]
    fn test_presentation_order_media_first_then_newest() {
        let mut records = vec![
            record("old.pdf", 1),
            record("old.png", 2),
            record("new.pdf", 5),
            record("new.jpg", 4),
            record("mid.txt", 3),
        ];
        presentation_order(&mut records);
        assert_eq!(
            keys(&records),
            vec!["new.jpg", "old.png", "new.pdf", "mid.txt", "old.pdf"]
        );
    }

    #[test]
    fn test_presentation_order_ties_broken_by_key() {
        let mut a = vec![record("b.png", 1), record("a.png", 1)];
        let mut b = vec![record("a.png", 1), record("b.png", 1)];
        presentation_order(&mut a);
        presentation_order(&mut b);
        assert_eq!(a, b);
        assert_eq!(keys(&a), vec!["a.png", "b.png"]);
    }

    #[tokio::test]
    async fn test_scenario_media_first_regardless_of_upload_time() {
        let (store, gateway) = test_support::memory_gateway().await;
        store
            .insert_at(BUCKET, "cat.png", Bytes::from(vec![0u8; 2048]), "image/png", at(1))
            .await
            .unwrap();
        store
            .insert_at(BUCKET, "report.pdf", Bytes::from(vec![0u8; 5000]), "application/pdf", at(2))
            .await
            .unwrap();

        let listed = gateway.list().await;
        assert_eq!(keys(&listed), vec!["cat.png", "report.pdf"]);
        assert_eq!(listed[0].size_bytes, 2048);
        assert_eq!(listed[1].size_bytes, 5000);

        store
            .insert_at(BUCKET, "dog.png", Bytes::from_static(b"woof"), "image/png", at(3))
            .await
            .unwrap();
        let listed = gateway.list().await;
        assert_eq!(keys(&listed), vec!["dog.png", "cat.png", "report.pdf"]);
    }

    #[tokio::test]
    async fn test_relisting_is_stable() {
        let (store, gateway) = test_support::memory_gateway().await;
        for (i, key) in ["a.png", "b.txt", "c.gif", "d.zip", "e.svg"].iter().enumerate() {
            store
                .insert_at(BUCKET, key, Bytes::from_static(b"x"), "x", at(i as i64 % 2))
                .await
                .unwrap();
        }

        let first = gateway.list().await;
        let second = gateway.list().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_bucket() {
        let (_store, gateway) = test_support::memory_gateway().await;
        assert_eq!(gateway.list_detailed().await, Listing::Empty);
        assert!(gateway.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_empty() {
        let gateway = test_support::failing_gateway();

        let detailed = gateway.list_detailed().await;
        assert!(detailed.is_unavailable());
        match detailed {
            Listing::Unavailable(message) => assert!(message.contains("ECONNREFUSED")),
            other => panic!("unexpected listing: {other:?}"),
        }
        assert!(gateway.list().await.is_empty());
    }
}
