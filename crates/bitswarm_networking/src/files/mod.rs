//! # Content-Addressed File Sync
//!
//! File-bearing initial-state items are offered by hash before any content
//! moves. Peers that already hold an identical file never receive its bytes.
//!
//! ## Design
//!
//! ```text
//! Server                                   Client
//!   │ offer: name + SHA-256 per file         │
//!   │ ─────────────────────────────────────► │ hash local copy
//!   │                                        │ equal   → IDENTICAL
//!   │                                        │ differs → rename "<name>.orig",
//!   │        ack: index + verdict bits       │           DIFFERENT
//!   │ ◄───────────────────────────────────── │
//!   │ resolve: bytes only for DIFFERENT      │
//!   │ ─────────────────────────────────────► │ store payload, run hook
//!   │ cache entry discarded                  │
//! ```
//!
//! - The hash is computed once per cache record
//! - Records are dropped after resolution; a later offer rehashes
//! - Caches are per peer session and never persisted

mod codec;
mod store;

use std::collections::HashMap;
use std::fmt;

use sha2::{Digest, Sha256};

pub use codec::{InlineFiles, OfferReader, OfferWriter, ResolutionReader, ResolutionWriter, ResolvedFile};
pub use store::{DirectoryFileStore, FileStore, MemoryFileStore};

/// Suffix appended to a differing local file before the payload lands.
pub const COLLISION_SUFFIX: &str = ".orig";

/// SHA-256 digest of a file's content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Size of the digest on the wire.
    pub const LEN: usize = 32;

    /// Raw digest bytes.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Hashes file content.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    ContentHash(hasher.finalize().into())
}

/// Sync state of one logical file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileStatus {
    /// Offered; the peer's verdict has not arrived.
    AwaitingHash,
    /// The peer already holds this exact content.
    Identical,
    /// The peer needs the full payload.
    Different,
}

/// Cached hash and status of one logical file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    /// Content hash, computed when the record was created.
    pub hash: ContentHash,
    /// Current sync state.
    pub status: FileStatus,
}

/// Per-session file records keyed by logical name.
#[derive(Debug, Default)]
pub struct FileSyncCache {
    records: HashMap<String, FileRecord>,
}

impl FileSyncCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the hash for `name`, creating an `AwaitingHash` record on
    /// first offer.
    pub fn offer(&mut self, name: &str, bytes: &[u8]) -> ContentHash {
        self.records
            .entry(name.to_string())
            .or_insert_with(|| FileRecord {
                hash: content_hash(bytes),
                status: FileStatus::AwaitingHash,
            })
            .hash
    }

    /// Records the peer's verdict. Returns false if `name` was never offered.
    pub fn set_verdict(&mut self, name: &str, identical: bool) -> bool {
        let Some(record) = self.records.get_mut(name) else {
            return false;
        };
        record.status = if identical {
            FileStatus::Identical
        } else {
            FileStatus::Different
        };
        true
    }

    /// Current status of `name`.
    #[must_use]
    pub fn status(&self, name: &str) -> Option<FileStatus> {
        self.records.get(name).map(|r| r.status)
    }

    /// Record for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FileRecord> {
        self.records.get(name)
    }

    /// Drops the record for `name`.
    pub fn remove(&mut self, name: &str) -> Option<FileRecord> {
        self.records.remove(name)
    }

    /// Returns true if `name` has a record.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no file is mid-sync.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_known_vector() {
        assert_eq!(
            content_hash(b"abc").to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_offer_hashes_once() {
        let mut cache = FileSyncCache::new();
        let first = cache.offer("map.bin", b"one");
        // content changes are ignored until the record is discarded
        let second = cache.offer("map.bin", b"two");
        assert_eq!(first, second);
        assert_eq!(cache.status("map.bin"), Some(FileStatus::AwaitingHash));

        cache.remove("map.bin");
        assert_ne!(cache.offer("map.bin", b"two"), first);
    }

    #[test]
    fn test_verdicts() {
        let mut cache = FileSyncCache::new();
        cache.offer("a", b"x");
        assert!(cache.set_verdict("a", false));
        assert_eq!(cache.status("a"), Some(FileStatus::Different));
        assert!(!cache.set_verdict("missing", true));
        assert_eq!(cache.len(), 1);
    }
}
