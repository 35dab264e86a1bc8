//! Keyed component store
//!
//! Maps [`ComponentKey`] to a live component with two guarantees:
//! - a key's factory runs at most once, even under concurrent first access
//! - a component's cleanup hook runs at most once, at eviction
//!
//! # Layout
//!
//! ```text
//! DashMap<ComponentKey, Arc<Slot>>
//!                           └─ OnceCell<Entry>   (empty = key absent)
//!                                 └─ Arc<T> + cleared flag
//! ```
//!
//! Callers clone the slot's `Arc` and release the shard lock before running a
//! factory, so factories may use the store for other keys. Evicted entries are
//! detached from the map before their cleanup hook runs, so hooks may re-enter
//! the store freely.

use crate::component::RetainedComponent;
use crate::config::RetentionConfig;
use crate::error::{BoxError, CleanupError, StoreError, StoreResult};
use crate::key::ComponentKey;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::convert::Infallible;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A stored component and its one-shot cleanup flag
struct Entry {
    component: Arc<dyn RetainedComponent>,
    instance: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    cleared: AtomicBool,
}

impl Entry {
    fn new<T: RetainedComponent>(value: T) -> Self {
        let value = Arc::new(value);
        Self {
            component: Arc::clone(&value) as Arc<dyn RetainedComponent>,
            instance: value,
            type_name: std::any::type_name::<T>(),
            cleared: AtomicBool::new(false),
        }
    }

    fn downcast<T: RetainedComponent>(&self, key: &ComponentKey) -> StoreResult<Arc<T>> {
        Arc::clone(&self.instance)
            .downcast::<T>()
            .map_err(|_| StoreError::TypeMismatch {
                key: key.clone(),
                expected: std::any::type_name::<T>(),
                actual: self.type_name,
            })
    }
}

type Slot = OnceCell<Entry>;

/// Result of running one entry's cleanup
enum Eviction {
    Cleared,
    Failed(CleanupError),
    AlreadyCleared,
}

/// Summary of a bulk eviction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Entries detached and cleaned up (including failed cleanups)
    pub evicted: usize,
    /// Entries whose cleanup hook failed
    pub failures: Vec<(ComponentKey, CleanupError)>,
}

impl ClearReport {
    /// Check if every cleanup succeeded
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: ClearReport) {
        self.evicted += other.evicted;
        self.failures.extend(other.failures);
    }
}

/// Statistics for store monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Live entries
    pub live: usize,
    /// Factories that produced a component
    pub created: u64,
    /// Components whose cleanup hook ran
    pub evicted: u64,
    /// Cleanup hooks that failed or panicked
    pub cleanup_failures: u64,
    /// Factories that returned an error
    pub factory_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    created: AtomicU64,
    evicted: AtomicU64,
    cleanup_failures: AtomicU64,
    factory_failures: AtomicU64,
}

/// Thread-safe keyed store of retained components
pub struct ComponentStore {
    slots: DashMap<ComponentKey, Arc<Slot>>,
    closed: AtomicBool,
    catch_cleanup_panics: bool,
    counters: Counters,
}

impl ComponentStore {
    /// Create store with default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&RetentionConfig::default())
    }

    /// Create store from configuration
    #[must_use]
    pub fn with_config(config: &RetentionConfig) -> Self {
        let slots = match config.shard_amount {
            Some(shards) if shards > 1 && shards.is_power_of_two() => {
                DashMap::with_shard_amount(shards)
            }
            _ => DashMap::new(),
        };
        Self {
            slots,
            closed: AtomicBool::new(false),
            catch_cleanup_panics: config.catch_cleanup_panics,
            counters: Counters::default(),
        }
    }

    /// Get the component for `key`, creating it with `factory` if absent
    ///
    /// # Errors
    /// - `StoreError::TypeMismatch` if `key` holds a different type
    /// - `StoreError::Closed` if the store has been closed
    pub fn get_or_create<T, F>(&self, key: &ComponentKey, factory: F) -> StoreResult<Arc<T>>
    where
        T: RetainedComponent,
        F: FnOnce() -> T,
    {
        self.try_get_or_create(key, || Ok::<T, Infallible>(factory()))
    }

    /// Get the component for `key`, creating it with a fallible `factory` if absent
    ///
    /// Concurrent callers for the same absent key block until one factory
    /// finishes; all of them receive the same `Arc`. The factory must not
    /// acquire the same key from this store (it would wait on itself).
    ///
    /// # Errors
    /// - `StoreError::Factory` if `factory` fails; the key stays vacant and a
    ///   later call may retry
    /// - `StoreError::TypeMismatch` if `key` holds a different type
    /// - `StoreError::Closed` if the store has been (or was concurrently) closed
    pub fn try_get_or_create<T, E, F>(&self, key: &ComponentKey, factory: F) -> StoreResult<Arc<T>>
    where
        T: RetainedComponent,
        E: Into<BoxError>,
        F: FnOnce() -> Result<T, E>,
    {
        let slot = self.slot(key)?;

        let mut created = false;
        let outcome = slot.get_or_try_init(|| {
            tracing::debug!(key = %key, "creating retained component");
            factory().map(|value| {
                created = true;
                Entry::new(value)
            })
        });

        let entry = match outcome {
            Ok(entry) => entry,
            Err(err) => {
                self.counters.factory_failures.fetch_add(1, Ordering::Relaxed);
                self.discard_vacant(key, &slot);
                let source: BoxError = err.into();
                tracing::warn!(key = %key, error = %source, "factory failed, key left vacant");
                return Err(StoreError::Factory {
                    key: key.clone(),
                    source,
                });
            }
        };

        if created {
            self.counters.created.fetch_add(1, Ordering::Relaxed);
        }

        // Created (or found) while a close was draining the map
        if self.closed.load(Ordering::SeqCst) {
            self.slots
                .remove_if(key, |_, current| Arc::ptr_eq(current, &slot));
            self.evict(key, entry);
            return Err(StoreError::Closed { key: key.clone() });
        }

        entry.downcast(key)
    }

    /// Get the component for `key` without creating it
    ///
    /// # Errors
    /// `StoreError::TypeMismatch` if `key` holds a different type
    pub fn get<T: RetainedComponent>(&self, key: &ComponentKey) -> StoreResult<Option<Arc<T>>> {
        let slot = match self.slots.get(key) {
            Some(slot) => Arc::clone(slot.value()),
            None => return Ok(None),
        };
        slot.get().map(|entry| entry.downcast(key)).transpose()
    }

    /// Evict the component for `key`, running its cleanup hook
    ///
    /// Returns `false` without effect if the key is absent. Cleanup failures
    /// are logged and counted, not returned.
    pub fn remove(&self, key: &ComponentKey) -> bool {
        let Some((key, slot)) = self.slots.remove_if(key, |_, slot| slot.get().is_some()) else {
            tracing::debug!(key = %key, "remove on absent key ignored");
            return false;
        };
        match slot.get() {
            Some(entry) => !matches!(self.evict(&key, entry), Eviction::AlreadyCleared),
            None => false,
        }
    }

    /// Evict every component, isolating per-entry cleanup failures
    ///
    /// # Panics
    /// With `catch_cleanup_panics` disabled, re-raises the first cleanup panic
    /// after every other hook has run.
    pub fn clear(&self) -> ClearReport {
        self.drain(false)
    }

    /// Reject further creations, then evict every component
    ///
    /// Creations in flight when the store closes are cleaned up as soon as
    /// their factory returns, and their callers receive `StoreError::Closed`.
    pub fn close(&self) -> ClearReport {
        self.closed.store(true, Ordering::SeqCst);
        self.drain(true)
    }

    /// Check if the store rejects creations
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Check if `key` holds a live component
    #[must_use]
    pub fn contains(&self, key: &ComponentKey) -> bool {
        self.slots
            .get(key)
            .is_some_and(|slot| slot.value().get().is_some())
    }

    /// Number of live components
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value().get().is_some())
            .count()
    }

    /// Check if no component is live
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of live components
    #[must_use]
    pub fn keys(&self) -> Vec<ComponentKey> {
        self.slots
            .iter()
            .filter(|slot| slot.value().get().is_some())
            .map(|slot| slot.key().clone())
            .collect()
    }

    /// Get store statistics
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            live: self.len(),
            created: self.counters.created.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
            cleanup_failures: self.counters.cleanup_failures.load(Ordering::Relaxed),
            factory_failures: self.counters.factory_failures.load(Ordering::Relaxed),
        }
    }

    fn slot(&self, key: &ComponentKey) -> StoreResult<Arc<Slot>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed { key: key.clone() });
        }
        if let Some(slot) = self.slots.get(key) {
            return Ok(Arc::clone(slot.value()));
        }
        Ok(Arc::clone(self.slots.entry(key.clone()).or_default().value()))
    }

    /// Drop a slot left empty by a failed factory
    ///
    /// Only when nobody else holds it: a waiter may be about to retry its own
    /// factory on the same slot. A vacant slot left behind still reads as absent.
    fn discard_vacant(&self, key: &ComponentKey, slot: &Arc<Slot>) {
        self.slots.remove_if(key, |_, current| {
            Arc::ptr_eq(current, slot) && current.get().is_none() && Arc::strong_count(current) == 2
        });
    }

    fn drain(&self, closing: bool) -> ClearReport {
        let mut drained = Vec::new();
        self.slots.retain(|key, slot| {
            if slot.get().is_some() {
                drained.push((key.clone(), Arc::clone(slot)));
                false
            } else {
                !closing
            }
        });

        // Entries are detached already: every hook must run before a panic escapes
        let mut report = ClearReport::default();
        let mut escaped = None;
        for (key, slot) in drained {
            let Some(entry) = slot.get() else { continue };
            match panic::catch_unwind(AssertUnwindSafe(|| self.evict(&key, entry))) {
                Ok(Eviction::Cleared) => report.evicted += 1,
                Ok(Eviction::Failed(err)) => {
                    report.evicted += 1;
                    report.failures.push((key, err));
                }
                Ok(Eviction::AlreadyCleared) => {}
                Err(payload) => {
                    self.counters.cleanup_failures.fetch_add(1, Ordering::Relaxed);
                    report.evicted += 1;
                    let err = CleanupError::Panicked(panic_message(&*payload));
                    tracing::error!(key = %key, component = entry.type_name, error = %err, "cleanup hook panicked");
                    report.failures.push((key, err));
                    escaped.get_or_insert(payload);
                }
            }
        }
        tracing::debug!(evicted = report.evicted, failures = report.failures.len(), closing, "store drained");
        if let Some(payload) = escaped {
            panic::resume_unwind(payload);
        }
        report
    }

    /// Run the cleanup hook unless it already ran
    fn evict(&self, key: &ComponentKey, entry: &Entry) -> Eviction {
        if entry.cleared.swap(true, Ordering::AcqRel) {
            return Eviction::AlreadyCleared;
        }
        self.counters.evicted.fetch_add(1, Ordering::Relaxed);

        let outcome = if self.catch_cleanup_panics {
            panic::catch_unwind(AssertUnwindSafe(|| entry.component.on_cleared()))
                .unwrap_or_else(|payload| Err(CleanupError::Panicked(panic_message(&*payload))))
        } else {
            entry.component.on_cleared()
        };

        match outcome {
            Ok(()) => {
                tracing::info!(key = %key, component = entry.type_name, "evicted retained component");
                Eviction::Cleared
            }
            Err(err) => {
                self.counters.cleanup_failures.fetch_add(1, Ordering::Relaxed);
                match &err {
                    CleanupError::Panicked(_) => {
                        tracing::error!(key = %key, component = entry.type_name, error = %err, "cleanup hook panicked");
                    }
                    CleanupError::Failed(_) => {
                        tracing::warn!(key = %key, component = entry.type_name, error = %err, "cleanup hook failed");
                    }
                }
                Eviction::Failed(err)
            }
        }
    }
}

impl Default for ComponentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ComponentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentStore")
            .field("live", &self.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::TypeTag;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;

    #[derive(Debug)]
    struct Tracked {
        cleanups: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Tracked {
        fn new(cleanups: &Arc<AtomicUsize>) -> Self {
            Self {
                cleanups: Arc::clone(cleanups),
                fail: false,
            }
        }
    }

    impl RetainedComponent for Tracked {
        fn on_cleared(&self) -> Result<(), CleanupError> {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CleanupError::failed("tracked failure"))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Debug)]
    struct Other;

    impl RetainedComponent for Other {
        fn on_cleared(&self) -> Result<(), CleanupError> {
            Ok(())
        }
    }

    fn key(name: &str) -> ComponentKey {
        ComponentKey::explicit(TypeTag::new("tracked"), name)
    }

    #[test]
    fn get_or_create_returns_existing() {
        let store = ComponentStore::new();
        let cleanups = Arc::new(AtomicUsize::new(0));

        let first = store.get_or_create(&key("a"), || Tracked::new(&cleanups)).unwrap();
        let second = store
            .get_or_create(&key("a"), || -> Tracked { unreachable!("should use stored value") })
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.stats().created, 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let store = ComponentStore::new();
        let cleanups = Arc::new(AtomicUsize::new(0));
        store.get_or_create(&key("a"), || Tracked::new(&cleanups)).unwrap();

        assert!(store.remove(&key("a")));
        assert!(!store.remove(&key("a")));
        assert_eq!(cleanups.load(Ordering::SeqCst), 1);
        assert!(!store.contains(&key("a")));
    }

    #[test]
    fn remove_absent_is_noop() {
        let store = ComponentStore::new();
        assert!(!store.remove(&key("ghost")));
        assert_eq!(store.stats(), StoreStats::default());
    }

    #[test]
    fn factory_failure_leaves_key_vacant() {
        let store = ComponentStore::new();
        let cleanups = Arc::new(AtomicUsize::new(0));

        let err = store
            .try_get_or_create(&key("a"), || Err::<Tracked, _>("no database"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Factory { .. }));
        assert!(!store.contains(&key("a")));
        assert!(store.is_empty());

        let retried = store.try_get_or_create(&key("a"), || Ok::<_, BoxError>(Tracked::new(&cleanups)));
        assert!(retried.is_ok());
        assert_eq!(store.stats().factory_failures, 1);
        assert_eq!(store.stats().created, 1);
    }

    #[test]
    fn type_mismatch_is_reported() {
        let store = ComponentStore::new();
        store.get_or_create(&key("a"), || Other).unwrap();

        let err = store
            .get_or_create(&key("a"), || Tracked::new(&Arc::new(AtomicUsize::new(0))))
            .unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { .. }));
        assert!(store.get::<Tracked>(&key("a")).is_err());
        assert!(store.get::<Other>(&key("a")).unwrap().is_some());
    }

    #[test]
    fn clear_isolates_failures() {
        let store = ComponentStore::new();
        let cleanups = Arc::new(AtomicUsize::new(0));
        for name in ["a", "b", "c"] {
            store
                .get_or_create(&key(name), || Tracked {
                    cleanups: Arc::clone(&cleanups),
                    fail: name == "b",
                })
                .unwrap();
        }

        let report = store.clear();
        assert_eq!(report.evicted, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, key("b"));
        assert_eq!(cleanups.load(Ordering::SeqCst), 3);
        assert!(store.is_empty());
        assert!(!store.is_closed());
    }

    #[test]
    fn close_rejects_new_creations() {
        let store = ComponentStore::new();
        store.close();
        let err = store.get_or_create(&key("a"), || Other).unwrap_err();
        assert!(matches!(err, StoreError::Closed { .. }));
    }

    #[test]
    fn concurrent_first_access_runs_factory_once() {
        const THREADS: usize = 16;
        let store = ComponentStore::new();
        let factory_calls = AtomicUsize::new(0);
        let cleanups = Arc::new(AtomicUsize::new(0));
        let barrier = Barrier::new(THREADS);

        let results: Vec<Arc<Tracked>> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        store
                            .get_or_create(&key("shared"), || {
                                factory_calls.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(std::time::Duration::from_millis(5));
                                Tracked::new(&cleanups)
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[test]
    fn panic_message_extraction() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "non-string panic payload");
    }
}
