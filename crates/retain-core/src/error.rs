//! Error types for the retention store
//!
//! Provides error handling for:
//! - Component creation (factory failures, type mismatches, closed stores)
//! - Component cleanup (isolated per entry, reported but never propagated)
//! - Configuration loading

use crate::key::ComponentKey;
use std::path::PathBuf;

/// Boxed error produced by a component factory
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors while acquiring a component
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Factory failed; the key was left vacant
    #[error("factory for {key} failed: {source}")]
    Factory {
        key: ComponentKey,
        #[source]
        source: BoxError,
    },

    /// The entry under this key holds a different component type
    #[error("type mismatch for {key}: expected {expected}, got {actual}")]
    TypeMismatch {
        key: ComponentKey,
        expected: &'static str,
        actual: &'static str,
    },

    /// The store was closed by scope destruction
    #[error("store is closed, rejected {key}")]
    Closed { key: ComponentKey },
}

impl StoreError {
    /// Key the failed operation targeted
    #[inline]
    #[must_use]
    pub fn key(&self) -> &ComponentKey {
        match self {
            Self::Factory { key, .. } | Self::TypeMismatch { key, .. } | Self::Closed { key } => {
                key
            }
        }
    }

    /// Check if retrying the same acquire can succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Factory { .. })
    }
}

/// Errors raised by a component's cleanup hook
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CleanupError {
    /// Hook returned an error
    #[error("cleanup failed: {0}")]
    Failed(String),

    /// Hook panicked
    #[error("cleanup panicked: {0}")]
    Panicked(String),
}

impl CleanupError {
    /// Create failure with message
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Errors while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Well-formed but unusable value
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
