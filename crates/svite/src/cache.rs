//! Bounded cache of compiled modules for the dev path.
//!
//! Entries are keyed by module id and evicted least-recently-used. There is
//! no expiry: an entry is served whenever the caller reports the module as
//! [`Staleness::Unchanged`], so a wrong signal serves stale output.
//!
//! Concurrent requests for the same id and the same source share one compile.
//! Each compile takes a ticket when it starts; a finished compile never
//! replaces an entry stored by a compile that started after it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use svite_config::{ResolvedConfig, SharedWarningHandler};
use tokio::sync::OnceCell;
use tracing::trace;

use crate::compiler::{CompiledOutput, Transformer};
use crate::error::TransformError;

/// Whether a module changed since it was last seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Unchanged,
    Changed,
}

impl From<bool> for Staleness {
    /// `true` means the module changed.
    fn from(changed: bool) -> Self {
        if changed {
            Staleness::Changed
        } else {
            Staleness::Unchanged
        }
    }
}

type Shared = Result<Option<Arc<CompiledOutput>>, TransformError>;

#[derive(Debug)]
struct CacheEntry {
    output: Arc<CompiledOutput>,
    ticket: u64,
}

struct InFlight {
    hash: blake3::Hash,
    cell: Arc<OnceCell<Shared>>,
}

pub struct TransformCache {
    enabled: bool,
    capacity: usize,
    store: Mutex<IndexMap<String, CacheEntry>>,
    in_flight: Mutex<FxHashMap<String, InFlight>>,
    tickets: AtomicU64,
    on_error: SharedWarningHandler,
}

/// Releases an `in_flight` slot once its compile has finished or every
/// request waiting on it has gone away.
struct FlightGuard<'a> {
    cache: &'a TransformCache,
    id: &'a str,
    cell: Arc<OnceCell<Shared>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.cache.in_flight.lock();
        let Some(flight) = in_flight.get(self.id) else {
            return;
        };
        // the map and this guard are the only holders once nobody else waits
        if Arc::ptr_eq(&flight.cell, &self.cell)
            && (self.cell.initialized() || Arc::strong_count(&self.cell) <= 2)
        {
            in_flight.remove(self.id);
        }
    }
}

impl std::fmt::Debug for TransformCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformCache")
            .field("enabled", &self.enabled)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl TransformCache {
    pub fn new(enabled: bool, capacity: usize, on_error: SharedWarningHandler) -> Self {
        Self {
            enabled,
            capacity: capacity.max(1),
            store: Mutex::new(IndexMap::new()),
            in_flight: Mutex::new(FxHashMap::default()),
            tickets: AtomicU64::new(0),
            on_error,
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(
            config.use_transform_cache,
            config.transform_cache_size,
            Arc::clone(&config.on_warn),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Compiled output for `id`, from the cache when `staleness` allows it.
    ///
    /// Compile failures are reported to the error handler and returned; they
    /// are never cached and drop any entry stored for `id`.
    pub async fn get(
        &self,
        transformer: &dyn Transformer,
        id: &str,
        code: &str,
        staleness: Staleness,
    ) -> Shared {
        if !self.enabled {
            return match transformer.transform(code, id).await {
                Ok(output) => Ok(output.map(Arc::new)),
                Err(err) => {
                    self.on_error.error(&err.diagnostic);
                    Err(err)
                }
            };
        }

        if staleness == Staleness::Unchanged {
            if let Some(hit) = self.touch(id) {
                trace!(target: "svite", "transform cache hit for {}", id);
                return Ok(Some(hit));
            }
        }

        let hash = blake3::hash(code.as_bytes());
        let cell = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(id) {
                Some(flight) if flight.hash == hash => Arc::clone(&flight.cell),
                _ => {
                    let cell = Arc::new(OnceCell::new());
                    in_flight.insert(
                        id.to_string(),
                        InFlight {
                            hash,
                            cell: Arc::clone(&cell),
                        },
                    );
                    cell
                }
            }
        };

        let flight = FlightGuard {
            cache: self,
            id,
            cell,
        };

        flight
            .cell
            .get_or_init(|| async move {
                let ticket = self.tickets.fetch_add(1, Ordering::SeqCst) + 1;
                let result = transformer.transform(code, id).await.map(|o| o.map(Arc::new));
                self.settle(id, ticket, &result);
                result
            })
            .await
            .clone()
    }

    /// Store or drop the outcome of the compile holding `ticket`.
    fn settle(&self, id: &str, ticket: u64, result: &Shared) {
        match result {
            Ok(Some(output)) => {
                let mut store = self.store.lock();
                if store.get(id).is_some_and(|entry| entry.ticket > ticket) {
                    trace!(target: "svite", "skipping outdated compile of {}", id);
                    return;
                }
                store.shift_remove(id);
                store.insert(
                    id.to_string(),
                    CacheEntry {
                        output: Arc::clone(output),
                        ticket,
                    },
                );
                while store.len() > self.capacity {
                    store.shift_remove_index(0);
                }
            }
            Ok(None) => {}
            Err(err) => {
                self.store.lock().shift_remove(id);
                self.on_error.error(&err.diagnostic);
            }
        }
    }

    /// Cached output for `id`, marked as most recently used.
    fn touch(&self, id: &str) -> Option<Arc<CompiledOutput>> {
        let mut store = self.store.lock();
        let (key, entry) = store.shift_remove_entry(id)?;
        let output = Arc::clone(&entry.output);
        store.insert(key, entry);
        Some(output)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.store.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    pub fn invalidate(&self, id: &str) -> bool {
        self.store.lock().shift_remove(id).is_some()
    }

    pub fn clear(&self) {
        self.store.lock().clear();
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use svite_config::{CompilerDiagnostic, WarningHandler};

    #[derive(Debug, Default)]
    struct Errors(AtomicUsize);

    impl WarningHandler for Errors {
        fn warn(&self, _diagnostic: &CompilerDiagnostic) {}

        fn error(&self, _diagnostic: &CompilerDiagnostic) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl Transformer for Counting {
        async fn transform(
            &self,
            code: &str,
            id: &str,
        ) -> Result<Option<CompiledOutput>, TransformError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if code.contains("syntax error") {
                return Err(TransformError::new(id, CompilerDiagnostic::new("unexpected token")));
            }
            Ok(Some(CompiledOutput::new(format!("/* {} #{} */ {}", id, n, code))))
        }
    }

    fn cache(capacity: usize) -> (TransformCache, Arc<Errors>) {
        let errors = Arc::new(Errors::default());
        (TransformCache::new(true, capacity, errors.clone()), errors)
    }

    #[tokio::test]
    async fn unchanged_hit_skips_compiler() {
        let (cache, _) = cache(10);
        let compiler = Counting::default();

        let first = cache.get(&compiler, "a", "x", Staleness::Changed).await.unwrap().unwrap();
        let second = cache.get(&compiler, "a", "x", Staleness::Unchanged).await.unwrap().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn changed_recompiles_and_replaces_entry() {
        let (cache, _) = cache(10);
        let compiler = Counting::default();

        cache.get(&compiler, "a", "x", Staleness::Changed).await.unwrap();
        let fresh = cache.get(&compiler, "a", "y", Staleness::Changed).await.unwrap().unwrap();
        let served = cache.get(&compiler, "a", "y", Staleness::Unchanged).await.unwrap().unwrap();

        assert_eq!(compiler.calls.load(Ordering::SeqCst), 2);
        assert!(Arc::ptr_eq(&fresh, &served));
    }

    #[tokio::test]
    async fn failure_is_reported_and_not_cached() {
        let (cache, errors) = cache(10);
        let compiler = Counting::default();

        cache.get(&compiler, "a", "ok", Staleness::Changed).await.unwrap();
        let err = cache
            .get(&compiler, "a", "syntax error", Staleness::Changed)
            .await
            .unwrap_err();

        assert_eq!(err.id, "a");
        assert!(!cache.contains("a"));
        assert_eq!(errors.0.load(Ordering::SeqCst), 1);

        cache.get(&compiler, "a", "syntax error", Staleness::Unchanged).await.unwrap_err();
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn evicts_least_recently_used() {
        let (cache, _) = cache(2);
        let compiler = Counting::default();

        cache.get(&compiler, "a", "x", Staleness::Changed).await.unwrap();
        cache.get(&compiler, "b", "x", Staleness::Changed).await.unwrap();
        // touch a so b becomes the oldest
        cache.get(&compiler, "a", "x", Staleness::Unchanged).await.unwrap();
        cache.get(&compiler, "c", "x", Staleness::Changed).await.unwrap();

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn disabled_cache_always_compiles() {
        let errors = Arc::new(Errors::default());
        let cache = TransformCache::new(false, 10, errors);
        let compiler = Counting::default();

        cache.get(&compiler, "a", "x", Staleness::Changed).await.unwrap();
        cache.get(&compiler, "a", "x", Staleness::Unchanged).await.unwrap();

        assert_eq!(compiler.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn concurrent_requests_for_same_source_share_a_compile() {
        let (cache, _) = cache(10);
        let compiler = Counting {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        };

        let (a, b) = tokio::join!(
            cache.get(&compiler, "a", "x", Staleness::Changed),
            cache.get(&compiler, "a", "x", Staleness::Changed),
        );

        assert!(Arc::ptr_eq(&a.unwrap().unwrap(), &b.unwrap().unwrap()));
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn older_compile_does_not_replace_newer_entry() {
        let (cache, _) = cache(10);
        let newer = Ok(Some(Arc::new(CompiledOutput::new("new"))));
        let older = Ok(Some(Arc::new(CompiledOutput::new("old"))));

        cache.settle("a", 2, &newer);
        cache.settle("a", 1, &older);

        let served = cache
            .get(&Counting::default(), "a", "x", Staleness::Unchanged)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(served.code, "new");
    }

    #[tokio::test]
    async fn abandoned_compile_releases_its_slot() {
        let (cache, _) = cache(10);
        let compiler = Counting {
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        };

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            cache.get(&compiler, "a", "x", Staleness::Changed),
        )
        .await;

        assert!(abandoned.is_err());
        assert_eq!(cache.in_flight_len(), 0);
        assert!(!cache.contains("a"));
    }

    #[tokio::test]
    async fn finished_compiles_leave_no_slots() {
        let (cache, _) = cache(10);
        let compiler = Counting::default();

        cache.get(&compiler, "a", "x", Staleness::Changed).await.unwrap();
        cache.get(&compiler, "b", "syntax error", Staleness::Changed).await.unwrap_err();

        assert_eq!(cache.in_flight_len(), 0);
    }
}
