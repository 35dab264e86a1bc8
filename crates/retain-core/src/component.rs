//! Retained component capability
//!
//! The store needs exactly one thing from a component: a cleanup hook it can
//! invoke once, at eviction. Everything else about the component is opaque.

use crate::error::CleanupError;

/// A stateful component owned by a [`ComponentStore`](crate::ComponentStore)
///
/// `on_cleared` is called at most once, when the component is evicted. It must
/// return promptly: background work owned by the component is cancelled
/// (initiated) here, not awaited.
pub trait RetainedComponent: Send + Sync + 'static {
    /// Release resources and cancel background work
    ///
    /// # Errors
    /// A returned error is logged and reported by the store; it never stops
    /// the eviction itself.
    fn on_cleared(&self) -> Result<(), CleanupError>;
}

/// A component kind with a stable tag, used by the typed bindings to build keys
pub trait ComponentKind: RetainedComponent {
    /// Tag distinguishing this kind from every other kind in a scope
    const TYPE_TAG: &'static str;
}
