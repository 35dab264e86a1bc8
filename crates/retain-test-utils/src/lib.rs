//! Testing utilities for the retain workspace
//!
//! Shared probe components, key helpers, and tracing setup.

#![allow(missing_docs)]

use retain_core::{CleanupError, ComponentKey, ComponentKind, RetainedComponent, TypeTag};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

/// What a probe does when cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupBehavior {
    Succeed,
    Fail,
    Panic,
}

/// Component that records how often its cleanup hook ran
#[derive(Debug)]
pub struct Probe {
    pub label: String,
    behavior: CleanupBehavior,
    cleanups: Arc<AtomicUsize>,
}

impl Probe {
    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }
}

impl RetainedComponent for Probe {
    fn on_cleared(&self) -> Result<(), CleanupError> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            CleanupBehavior::Succeed => Ok(()),
            CleanupBehavior::Fail => Err(CleanupError::failed(format!("{} refused", self.label))),
            CleanupBehavior::Panic => panic!("{} panicked during cleanup", self.label),
        }
    }
}

impl ComponentKind for Probe {
    const TYPE_TAG: &'static str = "probe";
}

/// Factory for probes sharing one cleanup counter, plus a factory-call counter
#[derive(Debug, Clone, Default)]
pub struct ProbeFactory {
    cleanups: Arc<AtomicUsize>,
    created: Arc<AtomicUsize>,
}

impl ProbeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self, label: &str) -> Probe {
        self.with_behavior(label, CleanupBehavior::Succeed)
    }

    pub fn failing(&self, label: &str) -> Probe {
        self.with_behavior(label, CleanupBehavior::Fail)
    }

    pub fn panicking(&self, label: &str) -> Probe {
        self.with_behavior(label, CleanupBehavior::Panic)
    }

    pub fn with_behavior(&self, label: &str, behavior: CleanupBehavior) -> Probe {
        self.created.fetch_add(1, Ordering::SeqCst);
        Probe {
            label: label.to_string(),
            behavior,
            cleanups: Arc::clone(&self.cleanups),
        }
    }

    /// Cleanup hooks run across all probes from this factory
    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::SeqCst)
    }

    /// Probes constructed by this factory
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

/// Explicit probe key
pub fn probe_key(name: &str) -> ComponentKey {
    ComponentKey::explicit(TypeTag::of::<Probe>(), name)
}

/// Install a test-writer subscriber once per process (honours `RUST_LOG`)
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}
