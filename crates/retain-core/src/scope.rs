//! Retention scope
//!
//! Binds one [`ComponentStore`] to the lifetime of a host scope (a navigation
//! destination, a window, a whole session). The scope only wires lifecycle
//! decisions to store mutations:
//!
//! ```text
//! build pass      → acquire(key, factory)          → store.get_or_create
//! visual teardown → on_visual_teardown(key, sig)   → classify → store.remove
//! host destroyed  → on_scope_destroyed()           → store.close / store.clear
//! ```

use crate::classifier::{classify, Disposition, LifecycleSignal};
use crate::component::RetainedComponent;
use crate::config::{AfterDestroy, RetentionConfig};
use crate::error::{BoxError, StoreResult};
use crate::key::ComponentKey;
use crate::store::{ClearReport, ComponentStore, StoreStats};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use ulid::Ulid;

/// Unique scope identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(pub Ulid);

impl ScopeId {
    /// Generate new scope ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A component store bound to one host scope's lifetime
#[derive(Debug)]
pub struct RetentionScope {
    id: ScopeId,
    name: Arc<str>,
    store: ComponentStore,
    after_destroy: AfterDestroy,
    destroyed: AtomicBool,
    generation: AtomicU64,
}

impl RetentionScope {
    /// Create scope for a host with default configuration
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self::with_config(name, &RetentionConfig::default())
    }

    /// Create scope for a host from configuration
    #[must_use]
    pub fn with_config(name: impl Into<Arc<str>>, config: &RetentionConfig) -> Self {
        let scope = Self {
            id: ScopeId::new(),
            name: name.into(),
            store: ComponentStore::with_config(config),
            after_destroy: config.after_destroy,
            destroyed: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        };
        tracing::debug!(scope = %scope.name, id = %scope.id, "retention scope created");
        scope
    }

    /// Fetch or create the component for `key`
    ///
    /// # Errors
    /// See [`ComponentStore::get_or_create`]
    #[inline]
    pub fn acquire<T, F>(&self, key: &ComponentKey, factory: F) -> StoreResult<Arc<T>>
    where
        T: RetainedComponent,
        F: FnOnce() -> T,
    {
        self.begin_generation();
        self.store.get_or_create(key, factory)
    }

    /// Fetch or create the component for `key` with a fallible factory
    ///
    /// # Errors
    /// See [`ComponentStore::try_get_or_create`]
    #[inline]
    pub fn try_acquire<T, E, F>(&self, key: &ComponentKey, factory: F) -> StoreResult<Arc<T>>
    where
        T: RetainedComponent,
        E: Into<BoxError>,
        F: FnOnce() -> Result<T, E>,
    {
        self.begin_generation();
        self.store.try_get_or_create(key, factory)
    }

    /// Under `Regenerate`, an acquire after destruction opens the next generation
    fn begin_generation(&self) {
        if self.after_destroy == AfterDestroy::Regenerate && self.destroyed.swap(false, Ordering::AcqRel) {
            tracing::debug!(scope = %self.name, generation = self.generation(), "retention scope regenerated");
        }
    }

    /// Report that the visual node for `key` was torn down under `signal`
    ///
    /// Evicts the component when the teardown is deliberate; keeps it
    /// otherwise. Unknown keys are ignored.
    pub fn on_visual_teardown(&self, key: &ComponentKey, signal: LifecycleSignal) -> Disposition {
        let disposition = classify(signal);
        match disposition {
            Disposition::Evict => {
                let evicted = self.store.remove(key);
                tracing::debug!(scope = %self.name, key = %key, %signal, evicted, "teardown evicts");
            }
            Disposition::Retain(reason) => {
                tracing::debug!(scope = %self.name, key = %key, %signal, ?reason, "teardown retains");
            }
        }
        disposition
    }

    /// Report that the host scope will never be re-entered
    ///
    /// Evicts every component. With [`AfterDestroy::Reject`] later acquires
    /// fail and repeated calls are no-ops. With [`AfterDestroy::Regenerate`]
    /// the call ends the current generation, the next acquire starts a fresh
    /// one, and repeated calls with no acquire in between are no-ops.
    pub fn on_scope_destroyed(&self) -> ClearReport {
        let report = match self.after_destroy {
            AfterDestroy::Reject => {
                if self.destroyed.swap(true, Ordering::AcqRel) {
                    tracing::debug!(scope = %self.name, "scope already destroyed");
                    return ClearReport::default();
                }
                self.store.close()
            }
            AfterDestroy::Regenerate => {
                let already = self.destroyed.swap(true, Ordering::AcqRel);
                let report = self.store.clear();
                if already && report.evicted == 0 {
                    tracing::debug!(scope = %self.name, "generation already destroyed");
                    return report;
                }
                self.generation.fetch_add(1, Ordering::AcqRel);
                report
            }
        };
        tracing::info!(
            scope = %self.name,
            id = %self.id,
            evicted = report.evicted,
            failures = report.failures.len(),
            "retention scope destroyed"
        );
        report
    }

    /// Scope identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Host name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if the scope is destroyed
    ///
    /// Under `Regenerate` this holds only until the next acquire.
    #[inline]
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Number of completed destroy cycles (only advances under `Regenerate`)
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Check if `key` holds a live component
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &ComponentKey) -> bool {
        self.store.contains(key)
    }

    /// Number of live components
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if no component is live
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Get store statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Backing store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &ComponentStore {
        &self.store
    }
}

impl Drop for RetentionScope {
    fn drop(&mut self) {
        if self.store.is_empty() {
            return;
        }
        tracing::warn!(
            scope = %self.name,
            live = self.store.len(),
            "retention scope dropped without on_scope_destroyed, evicting"
        );
        self.store.close();
    }
}
