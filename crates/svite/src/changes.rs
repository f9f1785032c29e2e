//! Content-hash change detection for hosts without a file watcher.

use blake3::Hash;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::cache::Staleness;

/// Tracks BLAKE3 hashes of the last source seen per module id.
///
/// Yields the staleness signal the transform cache needs: an id seen for the
/// first time, or with different content, is `Changed`.
#[derive(Debug, Default)]
pub struct ContentChangeDetector {
    hashes: Mutex<FxHashMap<String, Hash>>,
}

impl ContentChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `code` for `id` and report whether it differs from last time.
    pub fn check(&self, id: &str, code: &str) -> Staleness {
        let hash = blake3::hash(code.as_bytes());
        match self.hashes.lock().insert(id.to_string(), hash) {
            Some(previous) if previous == hash => Staleness::Unchanged,
            _ => Staleness::Changed,
        }
    }

    /// Forget `id`, so its next check reports `Changed`.
    pub fn invalidate(&self, id: &str) -> bool {
        self.hashes.lock().remove(id).is_some()
    }

    pub fn clear(&self) {
        self.hashes.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.hashes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.lock().is_empty()
    }
}
