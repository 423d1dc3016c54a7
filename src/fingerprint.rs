//! Content fingerprinting for change deduplication.
//!
//! Editors routinely rewrite files without changing their bytes (atomic
//! saves, touch-without-modify, formatter no-ops). The fingerprint cache
//! distinguishes "file touched" from "file content actually changed" so the
//! orchestrator only rebuilds for the latter.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// SHA-256 digest of a file's full contents, as lowercase hex.
pub fn file_digest(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Maps absolute file paths to their last observed content digest.
///
/// Single-writer: only the orchestrator's event loop mutates this, so no
/// locking is needed. Entries are never removed; a stale entry for a deleted
/// file simply never matches again.
#[derive(Debug, Default)]
pub struct FingerprintCache {
    entries: HashMap<PathBuf, String>,
}

impl FingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `path`'s contents differ from the last observed digest.
    ///
    /// Returns `Some(true)` when the file is new or its contents changed, and
    /// records the new digest as a side effect. Returns `Some(false)` when
    /// the digest matches, without mutating the cache. Returns `None` when
    /// the file cannot be read (mid-write race, or already removed); the
    /// caller must skip the event rather than fail the pipeline.
    pub fn has_changed(&mut self, path: &Path) -> Option<bool> {
        let digest = match file_digest(path) {
            Ok(d) => d,
            Err(_) => return None,
        };

        match self.entries.get(path) {
            Some(prev) if *prev == digest => Some(false),
            _ => {
                self.entries.insert(path.to_path_buf(), digest);
                Some(true)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
