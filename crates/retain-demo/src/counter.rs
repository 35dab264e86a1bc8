//! Counter screen: a repository, and a presenter retained across rebuilds.

use parking_lot::RwLock;
use retain_core::{CleanupError, ComponentKind, RetainedComponent};
use retain_presenter::{PresenterResult, PresenterScope};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// Process-wide counter storage shared by every presenter
#[derive(Debug, Default)]
pub(crate) struct CounterRepository {
    values: RwLock<HashMap<String, u64>>,
    writes: AtomicU64,
}

impl CounterRepository {
    pub(crate) fn load(&self, id: &str) -> u64 {
        self.values.read().get(id).copied().unwrap_or(0)
    }

    pub(crate) fn store(&self, id: &str, value: u64) {
        self.values.write().insert(id.to_string(), value);
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

/// Holds one counter's state and persists every change in the background
#[derive(Debug)]
pub(crate) struct CounterPresenter {
    id: String,
    value: watch::Sender<u64>,
    work: PresenterScope,
    instance: u64,
}

static INSTANCES: AtomicU64 = AtomicU64::new(0);

impl CounterPresenter {
    /// Build a presenter seeded from the repository; must run inside a tokio runtime
    pub(crate) fn open(id: &str, repository: &Arc<CounterRepository>) -> PresenterResult<Self> {
        let work = PresenterScope::current(format!("counter/{id}"))?;
        let (value, mut changes) = watch::channel(repository.load(id));

        let repo = Arc::clone(repository);
        let owner = id.to_string();
        work.spawn("persist", async move {
            while changes.changed().await.is_ok() {
                let latest = *changes.borrow_and_update();
                repo.store(&owner, latest);
            }
        })?;

        let instance = INSTANCES.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(counter = %id, instance, "Opened counter presenter");
        Ok(Self {
            id: id.to_string(),
            value,
            work,
            instance,
        })
    }

    pub(crate) fn increment(&self) -> u64 {
        self.value.send_modify(|v| *v += 1);
        self.current()
    }

    pub(crate) fn current(&self) -> u64 {
        *self.value.borrow()
    }

    /// Distinguishes presenter instances in scenario output
    pub(crate) fn instance(&self) -> u64 {
        self.instance
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.work.is_cancelled()
    }
}

impl RetainedComponent for CounterPresenter {
    fn on_cleared(&self) -> Result<(), CleanupError> {
        debug!(counter = %self.id, instance = self.instance, "Clearing counter presenter");
        self.work.on_cleared()
    }
}

impl ComponentKind for CounterPresenter {
    const TYPE_TAG: &'static str = "counter-presenter";
}
