//! Error types for presenter scopes

use thiserror::Error;

/// Errors raised when scheduling work on a presenter scope
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PresenterError {
    /// Called outside a tokio runtime and no handle was supplied
    #[error("no tokio runtime available for presenter scope {label}")]
    NoRuntime {
        /// Scope label
        label: String,
    },

    /// Scope was already cancelled; the task was not spawned
    #[error("presenter scope {label} is cancelled, refused task {task}")]
    Cancelled {
        /// Scope label
        label: String,
        /// Name of the refused task
        task: String,
    },
}

/// Result type for presenter operations
pub type PresenterResult<T> = Result<T, PresenterError>;
