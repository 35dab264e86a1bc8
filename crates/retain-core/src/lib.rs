//! Retain Core
//!
//! Keeps stateful components alive across rebuilds of the visual tree that
//! owns them, and evicts them when the owner removes them on purpose.
//!
//! # Core Concepts
//!
//! - [`ComponentKey`]: type tag + explicit or positional discriminator
//! - [`ComponentStore`]: create-once-per-key cache with exactly-once cleanup
//! - [`classify`] / [`should_evict`]: teardown signal → evict or retain
//! - [`RetentionScope`]: store bound to one host scope's lifetime
//! - [`ScopeRegistry`]: host id → scope, for hosts with many destinations
//! - [`Retained`]: typed handle returned by [`RetentionScope::retain`]
//!
//! # Architecture
//!
//! ```text
//! UI build pass ──acquire──▶ RetentionScope ──get_or_create──▶ ComponentStore
//! UI teardown ──(key, signal)──▶ RetentionScope ──classify──▶ remove? ──▶ on_cleared()
//! host destroyed ──────────────▶ RetentionScope ──close──────▶ on_cleared() × N
//! ```
//!
//! # Example
//!
//! ```rust
//! use retain_core::prelude::*;
//!
//! struct Counter;
//!
//! impl RetainedComponent for Counter {
//!     fn on_cleared(&self) -> Result<(), CleanupError> {
//!         Ok(())
//!     }
//! }
//!
//! impl ComponentKind for Counter {
//!     const TYPE_TAG: &'static str = "counter";
//! }
//!
//! let scope = RetentionScope::new("home");
//! let counter = scope.retain("main", || Counter).unwrap();
//! let key = counter.key().clone();
//!
//! // navigated away: kept
//! counter.teardown(LifecycleSignal::Suspended);
//! assert!(scope.contains(&key));
//!
//! // removed while on screen: evicted
//! scope.on_visual_teardown(&key, LifecycleSignal::Active);
//! assert!(!scope.contains(&key));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod classifier;
pub mod component;
pub mod config;
pub mod error;
pub mod key;
pub mod registry;
pub mod retained;
pub mod scope;
pub mod store;

// Re-exports for convenience
pub use classifier::{classify, should_evict, Disposition, HostState, LifecycleSignal, RetainReason};
pub use component::{ComponentKind, RetainedComponent};
pub use config::{AfterDestroy, RetentionConfig};
pub use error::{BoxError, CleanupError, ConfigError, StoreError, StoreResult};
pub use key::{ComponentKey, Discriminator, PositionalId, TypeTag};
pub use registry::ScopeRegistry;
pub use retained::Retained;
pub use scope::{RetentionScope, ScopeId};
pub use store::{ClearReport, ComponentStore, StoreStats};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with retained components
    pub use crate::classifier::{Disposition, HostState, LifecycleSignal};
    pub use crate::component::{ComponentKind, RetainedComponent};
    pub use crate::error::{CleanupError, StoreError, StoreResult};
    pub use crate::key::{ComponentKey, PositionalId, TypeTag};
    pub use crate::registry::ScopeRegistry;
    pub use crate::retained::Retained;
    pub use crate::scope::RetentionScope;
    pub use crate::store::{ClearReport, ComponentStore};
}
