//! Typed retention binding
//!
//! The entry point a UI layer calls on each build pass of a visual node:
//!
//! ```rust,ignore
//! let counter = scope.retain("counter", || CounterPresenter::new(&repo))?;
//! counter.increment();
//! // ... node removed from the tree:
//! counter.teardown(host.sampled_signal());
//! ```
//!
//! The key is the component's [`ComponentKind::TYPE_TAG`] plus either an
//! explicit key or a tree position supplied by the host.

use crate::classifier::{Disposition, LifecycleSignal};
use crate::component::ComponentKind;
use crate::error::{BoxError, StoreResult};
use crate::key::{ComponentKey, PositionalId, TypeTag};
use crate::scope::RetentionScope;
use std::ops::Deref;
use std::sync::Arc;

/// A component acquired from a scope for one visual node
#[derive(Debug)]
#[must_use = "a retained handle should be torn down when its visual node goes away"]
pub struct Retained<'s, T> {
    scope: &'s RetentionScope,
    key: ComponentKey,
    component: Arc<T>,
}

impl<'s, T> Retained<'s, T> {
    /// Key the component is stored under
    #[inline]
    #[must_use]
    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    /// Shared handle to the component
    #[inline]
    #[must_use]
    pub fn component(&self) -> &Arc<T> {
        &self.component
    }

    /// Scope the component lives in
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &'s RetentionScope {
        self.scope
    }

    /// Report that the visual node was torn down under `signal`
    pub fn teardown(self, signal: LifecycleSignal) -> Disposition {
        self.scope.on_visual_teardown(&self.key, signal)
    }
}

impl<T> Deref for Retained<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.component
    }
}

impl RetentionScope {
    fn bind<T>(&self, key: ComponentKey, component: Arc<T>) -> Retained<'_, T> {
        Retained {
            scope: self,
            key,
            component,
        }
    }

    /// Fetch or create the component of kind `T` stored under `key`
    ///
    /// # Errors
    /// See [`ComponentStore::get_or_create`](crate::ComponentStore::get_or_create)
    pub fn retain<T, F>(&self, key: &str, factory: F) -> StoreResult<Retained<'_, T>>
    where
        T: ComponentKind,
        F: FnOnce() -> T,
    {
        let key = ComponentKey::explicit(TypeTag::of::<T>(), key);
        let component = self.acquire(&key, factory)?;
        Ok(self.bind(key, component))
    }

    /// Fetch or create the component of kind `T` at a host-supplied tree position
    ///
    /// The position must be stable across rebuilds of the same visual node and
    /// distinct between sibling nodes. [`PositionalId::caller`] satisfies the
    /// first but not the second when one call site builds several nodes.
    ///
    /// # Errors
    /// See [`ComponentStore::get_or_create`](crate::ComponentStore::get_or_create)
    pub fn retain_at<T, F>(&self, position: PositionalId, factory: F) -> StoreResult<Retained<'_, T>>
    where
        T: ComponentKind,
        F: FnOnce() -> T,
    {
        let key = ComponentKey::positional(TypeTag::of::<T>(), position);
        let component = self.acquire(&key, factory)?;
        Ok(self.bind(key, component))
    }

    /// [`retain`](Self::retain) with a fallible factory
    ///
    /// # Errors
    /// See [`ComponentStore::try_get_or_create`](crate::ComponentStore::try_get_or_create)
    pub fn try_retain<T, E, F>(&self, key: &str, factory: F) -> StoreResult<Retained<'_, T>>
    where
        T: ComponentKind,
        E: Into<BoxError>,
        F: FnOnce() -> Result<T, E>,
    {
        let key = ComponentKey::explicit(TypeTag::of::<T>(), key);
        let component = self.try_acquire(&key, factory)?;
        Ok(self.bind(key, component))
    }
}
