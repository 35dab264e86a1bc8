//! Scope registry
//!
//! Process-wide map from host id to [`RetentionScope`]. Hosts enter their
//! scope on every (re)build and destroy it exactly when they are permanently
//! gone, e.g. when a navigation destination is popped off the back stack.

use crate::config::RetentionConfig;
use crate::scope::RetentionScope;
use crate::store::ClearReport;
use dashmap::DashMap;
use std::sync::Arc;

/// Registry of retention scopes keyed by host id
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    scopes: DashMap<String, Arc<RetentionScope>>,
    config: RetentionConfig,
}

impl ScopeRegistry {
    /// Create empty registry with default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create empty registry whose scopes use `config`
    #[inline]
    #[must_use]
    pub fn with_config(config: RetentionConfig) -> Self {
        Self {
            scopes: DashMap::new(),
            config,
        }
    }

    /// Get the scope for `host`, creating it on first entry
    ///
    /// A scope destroyed directly through
    /// [`RetentionScope::on_scope_destroyed`] is replaced by a fresh one.
    #[must_use]
    pub fn enter(&self, host: &str) -> Arc<RetentionScope> {
        if let Some(scope) = self.scopes.get(host) {
            if !scope.is_destroyed() {
                return Arc::clone(scope.value());
            }
        }
        if self.scopes.remove_if(host, |_, scope| scope.is_destroyed()).is_some() {
            tracing::debug!(host, "replacing destroyed retention scope");
        }
        let scope = self
            .scopes
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(RetentionScope::with_config(host, &self.config)));
        Arc::clone(scope.value())
    }

    /// Get the scope for `host` if it has been entered
    #[inline]
    #[must_use]
    pub fn get(&self, host: &str) -> Option<Arc<RetentionScope>> {
        self.scopes.get(host).map(|scope| Arc::clone(scope.value()))
    }

    /// Check if `host` has a live scope
    #[inline]
    #[must_use]
    pub fn contains(&self, host: &str) -> bool {
        self.scopes.contains_key(host)
    }

    /// Number of live scopes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Check if no scope is live
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Host ids with live scopes
    #[must_use]
    pub fn hosts(&self) -> Vec<String> {
        self.scopes.iter().map(|scope| scope.key().clone()).collect()
    }

    /// Detach and destroy the scope for `host`
    ///
    /// Returns `None` if the host has no scope.
    pub fn destroy(&self, host: &str) -> Option<ClearReport> {
        let (_, scope) = self.scopes.remove(host)?;
        Some(scope.on_scope_destroyed())
    }

    /// Detach and destroy every scope
    pub fn destroy_all(&self) -> ClearReport {
        let mut detached = Vec::new();
        self.scopes.retain(|_, scope| {
            detached.push(Arc::clone(scope));
            false
        });

        let mut report = ClearReport::default();
        for scope in detached {
            report.merge(scope.on_scope_destroyed());
        }
        report
    }
}
