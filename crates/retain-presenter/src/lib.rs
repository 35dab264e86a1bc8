//! Retain Presenter
//!
//! Background work owned by a retained component. A [`PresenterScope`] lives
//! inside the component, spawns tasks onto a tokio runtime, and is cancelled
//! from the component's cleanup hook.
//!
//! Cancellation is fire-and-forget: [`PresenterScope::cancel`] returns
//! immediately and tasks observe it at their next await point.
//!
//! ```rust
//! use retain_core::prelude::*;
//! use retain_presenter::PresenterScope;
//!
//! struct Feed {
//!     work: PresenterScope,
//! }
//!
//! impl RetainedComponent for Feed {
//!     fn on_cleared(&self) -> Result<(), CleanupError> {
//!         self.work.on_cleared()
//!     }
//! }
//!
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! let feed = Feed { work: PresenterScope::new("feed", rt.handle().clone()) };
//! feed.work.spawn("poll", std::future::pending::<()>()).unwrap();
//! feed.on_cleared().unwrap();
//! assert!(feed.work.is_cancelled());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;

pub use error::{PresenterError, PresenterResult};

use retain_core::CleanupError;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, trace};

/// How a presenter task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskExit {
    /// The future ran to completion
    Completed,
    /// The scope was cancelled first
    Cancelled,
}

/// Decrements the live-task counter however the task ends.
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Cancellable task group bound to one retained component
pub struct PresenterScope {
    label: Arc<str>,
    token: CancellationToken,
    handle: Handle,
    active: Arc<AtomicUsize>,
}

impl PresenterScope {
    /// Create a scope that spawns onto `handle`
    pub fn new(label: impl Into<Arc<str>>, handle: Handle) -> Self {
        Self {
            label: label.into(),
            token: CancellationToken::new(),
            handle,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a scope on the runtime the caller is running in
    pub fn current(label: impl Into<Arc<str>>) -> PresenterResult<Self> {
        let label = label.into();
        match Handle::try_current() {
            Ok(handle) => Ok(Self::new(label, handle)),
            Err(_) => Err(PresenterError::NoRuntime {
                label: label.to_string(),
            }),
        }
    }

    /// Run `future` until it completes or the scope is cancelled
    ///
    /// Refuses to spawn once the scope is cancelled.
    pub fn spawn<F>(&self, name: &str, future: F) -> PresenterResult<JoinHandle<TaskExit>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.token.is_cancelled() {
            return Err(PresenterError::Cancelled {
                label: self.label.to_string(),
                task: name.to_string(),
            });
        }

        let token = self.token.clone();
        let guard = ActiveGuard::enter(&self.active);
        let label = Arc::clone(&self.label);
        let task = name.to_string();
        trace!(scope = %label, task = %task, "presenter.spawn");

        Ok(self.handle.spawn(async move {
            let _guard = guard;
            let exit = tokio::select! {
                biased;
                () = token.cancelled() => TaskExit::Cancelled,
                _ = future => TaskExit::Completed,
            };
            trace!(scope = %label, task = %task, ?exit, "presenter.exit");
            exit
        }))
    }

    /// Signal every task to stop; does not wait for them
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!(
                scope = %self.label,
                active = self.active_tasks(),
                "Cancelling presenter scope"
            );
        }
        self.token.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Tasks spawned and not yet finished
    pub fn active_tasks(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Resolves once the scope is cancelled
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Token cancelled together with this scope, for work spawned elsewhere
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Scope label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Cleanup-hook body for components that own this scope
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches [`retain_core::RetainedComponent::on_cleared`].
    pub fn on_cleared(&self) -> Result<(), CleanupError> {
        self.cancel();
        Ok(())
    }
}

impl fmt::Debug for PresenterScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenterScope")
            .field("label", &self.label)
            .field("cancelled", &self.is_cancelled())
            .field("active", &self.active_tasks())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_current_without_runtime() {
        let err = PresenterScope::current("orphan").unwrap_err();
        assert_eq!(
            err,
            PresenterError::NoRuntime {
                label: "orphan".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_spawn_completes() {
        let scope = PresenterScope::current("feed").unwrap();
        let exit = scope.spawn("once", async { 7 }).unwrap().await.unwrap();
        assert_eq!(exit, TaskExit::Completed);
        assert_eq!(scope.active_tasks(), 0);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_task() {
        let scope = PresenterScope::current("feed").unwrap();
        let task = scope.spawn("forever", std::future::pending::<()>()).unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(scope.active_tasks(), 1);

        scope.cancel();
        assert!(scope.is_cancelled());
        assert_eq!(task.await.unwrap(), TaskExit::Cancelled);
        assert_eq!(scope.active_tasks(), 0);
    }

    #[tokio::test]
    async fn test_spawn_after_cancel_is_refused() {
        let scope = PresenterScope::current("feed").unwrap();
        scope.cancel();
        let err = scope.spawn("late", async {}).unwrap_err();
        assert!(matches!(err, PresenterError::Cancelled { ref task, .. } if task == "late"));
    }

    #[tokio::test]
    async fn test_child_token_follows_scope() {
        let scope = PresenterScope::current("feed").unwrap();
        let child = scope.child_token();
        scope.on_cleared().unwrap();
        assert!(child.is_cancelled());
        scope.cancelled().await;
    }
}
