//! Object key minting.
//!
//! Keys have the form `<unix-millis>-<nonce>-<original name>`.  The nonce is
//! eight hex digits: the high half is a process-wide wrapping sequence, the
//! low half is random.  Two uploads of the same name in the same millisecond
//! from one process always differ in the sequence half; uploads from
//! different processes differ with overwhelming probability in the random
//! half.

use std::sync::atomic::{AtomicU16, Ordering};

use chrono::Utc;

/// Issues unique object keys.
#[derive(Debug)]
pub struct KeyMinter {
    sequence: AtomicU16,
}

impl Default for KeyMinter {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyMinter {
    /// Create a minter whose sequence starts at a random offset.
    pub fn new() -> Self {
        Self {
            sequence: AtomicU16::new(rand::random()),
        }
    }

    /// Mint a fresh key for `file_name` at the current time.
    ///
    /// `file_name` must already be sanitized (see [`sanitize_file_name`]).
    pub fn mint(&self, file_name: &str) -> String {
        self.mint_at(Utc::now().timestamp_millis(), file_name)
    }

    fn mint_at(&self, millis: i64, file_name: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let salt: u16 = rand::random();
        format!("{millis}-{seq:04x}{salt:04x}-{file_name}")
    }
}

/// Reduce a client-supplied filename to a bare, non-empty name.
///
/// Browsers usually send a base name, but some clients send full paths;
/// only the final `/` or `\` separated component is kept.  Control
/// characters are dropped.  Returns `None` when nothing usable remains.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let base = raw
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(raw);
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return None;
    }
    Some(trimmed.to_string())
}

/// Recover the filename a key was minted from.
///
/// Understands both `<millis>-<nonce>-<name>` and the older
/// `<millis>-<name>` layout; any other key is returned unchanged.
///
/// The two layouts overlap: an older key whose name itself starts with
/// eight hex digits and a dash (`1700000000000-deadbeef-x.pdf`) reads as
/// the current layout and yields `x.pdf`.  Keys minted today never hit
/// this since they always carry a nonce.
pub fn original_name(key: &str) -> &str {
    let Some((stamp, rest)) = key.split_once('-') else {
        return key;
    };
    if stamp.is_empty() || !stamp.bytes().all(|b| b.is_ascii_digit()) || rest.is_empty() {
        return key;
    }

    if let Some((nonce, name)) = rest.split_once('-') {
        let is_nonce = nonce.len() == 8 && nonce.bytes().all(|b| b.is_ascii_hexdigit());
        if is_nonce && !name.is_empty() {
            return name;
        }
    }
    rest
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_key_layout() {
        let minter = KeyMinter::new();
        let key = minter.mint_at(1_700_000_000_123, "cat.png");

        let parts: Vec<&str> = key.splitn(3, '-').collect();
        assert_eq!(parts[0], "1700000000123");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(parts[2], "cat.png");
    }

    #[test]
    fn test_same_instant_same_name_is_unique() {
        let minter = KeyMinter::new();
        let keys: HashSet<String> = (0..10_000)
            .map(|_| minter.mint_at(1_700_000_000_000, "cat.png"))
            .collect();
        assert_eq!(keys.len(), 10_000);
    }

    #[test]
    fn test_concurrent_minting_is_unique() {
        let minter = Arc::new(KeyMinter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let minter = minter.clone();
                std::thread::spawn(move || {
                    (0..1000)
                        .map(|_| minter.mint_at(1_700_000_000_000, "same.txt"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for key in handle.join().unwrap() {
                assert!(all.insert(key));
            }
        }
        assert_eq!(all.len(), 8000);
    }

    #[test]
    fn test_original_name_roundtrip() {
        let minter = KeyMinter::new();
        for name in ["cat.png", "my-report-final.pdf", "2024-01-01.csv", "a b.txt"] {
            assert_eq!(original_name(&minter.mint(name)), name);
        }
    }

    #[test]
    fn test_original_name_legacy_layout() {
        assert_eq!(original_name("1700000000000-cat.png"), "cat.png");
        assert_eq!(original_name("1700000000000-my-notes.txt"), "my-notes.txt");
    }

    #[test]
    fn test_original_name_legacy_hex_prefix_reads_as_nonce() {
        assert_eq!(original_name("1700000000000-deadbeef-x.pdf"), "x.pdf");
        assert_eq!(original_name("1700000000000-deadbee-x.pdf"), "deadbee-x.pdf");
        assert_eq!(original_name("1700000000000-deadbeefs-x.pdf"), "deadbeefs-x.pdf");
    }

    #[test]
    fn test_original_name_foreign_keys() {
        assert_eq!(original_name("cat.png"), "cat.png");
        assert_eq!(original_name("photos/cat.png"), "photos/cat.png");
        assert_eq!(original_name("v2-cat.png"), "v2-cat.png");
        assert_eq!(original_name("123-"), "123-");
        assert_eq!(original_name("-cat.png"), "-cat.png");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("cat.png").as_deref(), Some("cat.png"));
        assert_eq!(
            sanitize_file_name("C:\\Users\\me\\report.pdf").as_deref(),
            Some("report.pdf")
        );
        assert_eq!(sanitize_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_file_name("  spaced.txt ").as_deref(), Some("spaced.txt"));
        assert_eq!(sanitize_file_name("tab\tname.txt").as_deref(), Some("tabname.txt"));
        assert_eq!(sanitize_file_name(""), None);
        assert_eq!(sanitize_file_name("   "), None);
        assert_eq!(sanitize_file_name("dir/"), None);
        assert_eq!(sanitize_file_name(".."), None);
    }
}
