//! Many threads acquiring and evicting a small key space.

use retain_core::{
    ClearReport, CleanupError, ComponentKey, ComponentKind, ComponentStore, RetainedComponent,
    RetentionConfig, TypeTag,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::debug;

struct Tally {
    cleanups: Arc<AtomicU64>,
}

impl RetainedComponent for Tally {
    fn on_cleared(&self) -> Result<(), CleanupError> {
        self.cleanups.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl ComponentKind for Tally {
    const TYPE_TAG: &'static str = "tally";
}

/// Shape of a stress run
#[derive(Debug, Clone, Copy)]
pub(crate) struct StressConfig {
    pub(crate) threads: usize,
    pub(crate) keys: usize,
    pub(crate) rounds: usize,
}

/// Counts gathered from a stress run
#[derive(Debug)]
pub(crate) struct StressReport {
    pub(crate) acquires: u64,
    pub(crate) created: u64,
    pub(crate) cleanups: u64,
    pub(crate) elapsed_ms: u128,
    pub(crate) final_clear: ClearReport,
}

impl StressReport {
    /// Every created component was cleaned exactly once
    pub(crate) fn success(&self) -> bool {
        self.created == self.cleanups && self.final_clear.is_clean()
    }
}

/// Run the churn loop on `threads` threads against one store
pub(crate) fn run_stress(stress: StressConfig, retention: &RetentionConfig) -> StressReport {
    let store = ComponentStore::with_config(retention);
    let cleanups = Arc::new(AtomicU64::new(0));
    let acquires = AtomicU64::new(0);
    let keys: Vec<ComponentKey> = (0..stress.keys.max(1))
        .map(|i| ComponentKey::explicit(TypeTag::of::<Tally>(), format!("k{i}")))
        .collect();

    let start = Instant::now();
    thread::scope(|s| {
        for worker in 0..stress.threads.max(1) {
            let (store, keys, cleanups, acquires) = (&store, &keys, &cleanups, &acquires);
            s.spawn(move || {
                for round in 0..stress.rounds {
                    let key = &keys[(worker * 31 + round) % keys.len()];
                    let acquired = store.get_or_create(key, || Tally {
                        cleanups: Arc::clone(cleanups),
                    });
                    if acquired.is_ok() {
                        acquires.fetch_add(1, Ordering::Relaxed);
                    }
                    if round % 4 == worker % 4 {
                        store.remove(key);
                    }
                }
                debug!(worker, "stress worker done");
            });
        }
    });
    let final_clear = store.clear();
    let elapsed_ms = start.elapsed().as_millis();

    StressReport {
        acquires: acquires.load(Ordering::Relaxed),
        created: store.stats().created,
        cleanups: cleanups.load(Ordering::Relaxed),
        elapsed_ms,
        final_clear,
    }
}
