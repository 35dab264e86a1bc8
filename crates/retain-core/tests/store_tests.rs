//! Store-level guarantees under concurrency, failure, and re-entrancy.

use retain_core::{
    CleanupError, ComponentKey, ComponentStore, RetainedComponent, RetentionConfig, StoreError,
    TypeTag,
};
use retain_test_utils::{init_tracing, probe_key, Probe, ProbeFactory};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn concurrent_callers_share_one_instance() {
    init_tracing();
    const THREADS: usize = 32;
    let store = ComponentStore::new();
    let probes = ProbeFactory::new();
    let barrier = Barrier::new(THREADS);

    let results: Vec<Arc<Probe>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    store
                        .get_or_create(&probe_key("shared"), || {
                            thread::sleep(Duration::from_millis(10));
                            probes.probe("shared")
                        })
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(probes.created(), 1);
    assert!(results.iter().all(|probe| Arc::ptr_eq(probe, &results[0])));
    assert_eq!(store.len(), 1);
}

#[test]
fn concurrent_churn_cleans_every_instance_once() {
    init_tracing();
    const THREADS: usize = 8;
    const ROUNDS: usize = 500;
    const KEYS: usize = 16;
    let store = ComponentStore::with_config(&RetentionConfig::new().with_shard_amount(4));
    let probes = ProbeFactory::new();

    thread::scope(|s| {
        for worker in 0..THREADS {
            let store = &store;
            let probes = &probes;
            s.spawn(move || {
                for round in 0..ROUNDS {
                    let key = probe_key(&format!("k{}", (worker * 7 + round) % KEYS));
                    store.get_or_create(&key, || probes.probe("churn")).unwrap();
                    if round % 3 == 0 {
                        store.remove(&key);
                    }
                }
            });
        }
    });

    let report = store.clear();
    assert!(report.is_clean());
    assert!(store.is_empty());
    assert_eq!(probes.created(), probes.cleanups());

    let stats = store.stats();
    assert_eq!(stats.created as usize, probes.created());
    assert_eq!(stats.evicted, stats.created);
}

#[test]
fn double_remove_runs_cleanup_once() {
    let store = ComponentStore::new();
    let probes = ProbeFactory::new();
    store.get_or_create(&probe_key("a"), || probes.probe("a")).unwrap();

    assert!(store.remove(&probe_key("a")));
    assert!(!store.remove(&probe_key("a")));
    assert_eq!(probes.cleanups(), 1);
}

#[test]
fn clear_runs_every_hook_despite_failures_and_panics() {
    init_tracing();
    let store = ComponentStore::new();
    let probes = ProbeFactory::new();
    store.get_or_create(&probe_key("ok-1"), || probes.probe("ok-1")).unwrap();
    store.get_or_create(&probe_key("fails"), || probes.failing("fails")).unwrap();
    store.get_or_create(&probe_key("panics"), || probes.panicking("panics")).unwrap();
    store.get_or_create(&probe_key("ok-2"), || probes.probe("ok-2")).unwrap();

    let report = store.clear();

    assert_eq!(report.evicted, 4);
    assert_eq!(probes.cleanups(), 4);
    assert_eq!(report.failures.len(), 2);
    assert!(report
        .failures
        .iter()
        .any(|(key, err)| *key == probe_key("fails") && matches!(err, CleanupError::Failed(_))));
    assert!(report
        .failures
        .iter()
        .any(|(key, err)| *key == probe_key("panics") && matches!(err, CleanupError::Panicked(_))));
    assert_eq!(store.stats().cleanup_failures, 2);
    assert!(store.is_empty());
}

#[test]
fn failing_cleanup_still_evicts_on_remove() {
    let store = ComponentStore::new();
    let probes = ProbeFactory::new();
    store.get_or_create(&probe_key("a"), || probes.failing("a")).unwrap();

    assert!(store.remove(&probe_key("a")));
    assert!(!store.contains(&probe_key("a")));
    assert_eq!(probes.cleanups(), 1);
}

#[test]
fn factory_error_then_retry() {
    let store = ComponentStore::new();
    let probes = ProbeFactory::new();

    let err = store
        .try_get_or_create(&probe_key("a"), || -> Result<Probe, std::io::Error> {
            Err(std::io::Error::other("offline"))
        })
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.key(), &probe_key("a"));
    assert!(!store.contains(&probe_key("a")));

    let probe = store
        .try_get_or_create(&probe_key("a"), || Ok::<_, std::io::Error>(probes.probe("a")))
        .unwrap();
    assert_eq!(probe.label, "a");
    assert_eq!(store.len(), 1);
}

#[test]
fn factory_panic_leaves_key_vacant() {
    let store = ComponentStore::new();
    let probes = ProbeFactory::new();

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        store.get_or_create(&probe_key("a"), || -> Probe { panic!("constructor exploded") })
    }));
    assert!(outcome.is_err());
    assert!(!store.contains(&probe_key("a")));

    store.get_or_create(&probe_key("a"), || probes.probe("a")).unwrap();
    assert!(store.contains(&probe_key("a")));
}

/// Component whose cleanup evicts a dependent entry from the same store.
struct Parent {
    store: Arc<ComponentStore>,
    child: ComponentKey,
}

impl RetainedComponent for Parent {
    fn on_cleared(&self) -> Result<(), CleanupError> {
        self.store.remove(&self.child);
        Ok(())
    }
}

fn parent_key() -> ComponentKey {
    ComponentKey::explicit(TypeTag::new("parent"), "p")
}

#[test]
fn cleanup_may_reenter_store() {
    let store = Arc::new(ComponentStore::new());
    let probes = ProbeFactory::new();
    store.get_or_create(&probe_key("child"), || probes.probe("child")).unwrap();
    store
        .get_or_create(&parent_key(), || Parent {
            store: Arc::clone(&store),
            child: probe_key("child"),
        })
        .unwrap();

    assert!(store.remove(&parent_key()));
    assert!(!store.contains(&probe_key("child")));
    assert_eq!(probes.cleanups(), 1);
}

#[test]
fn reentrant_cleanup_during_clear_cleans_child_once() {
    let store = Arc::new(ComponentStore::new());
    let probes = ProbeFactory::new();
    store.get_or_create(&probe_key("child"), || probes.probe("child")).unwrap();
    store
        .get_or_create(&parent_key(), || Parent {
            store: Arc::clone(&store),
            child: probe_key("child"),
        })
        .unwrap();

    let report = store.clear();
    assert_eq!(report.evicted, 2);
    assert_eq!(probes.cleanups(), 1);
    assert!(store.is_empty());
}

#[test]
fn factory_may_acquire_other_keys() {
    struct Composite {
        inner: Arc<Probe>,
    }

    impl RetainedComponent for Composite {
        fn on_cleared(&self) -> Result<(), CleanupError> {
            Ok(())
        }
    }

    let store = ComponentStore::new();
    let probes = ProbeFactory::new();
    let composite = store
        .get_or_create(&ComponentKey::explicit(TypeTag::new("composite"), "c"), || Composite {
            inner: store
                .get_or_create(&probe_key("inner"), || probes.probe("inner"))
                .unwrap(),
        })
        .unwrap();

    let inner = store.get::<Probe>(&probe_key("inner")).unwrap().unwrap();
    assert!(Arc::ptr_eq(&composite.inner, &inner));
    assert_eq!(store.len(), 2);
}

#[test]
fn close_during_inflight_creation_rejects_and_cleans() {
    let store = ComponentStore::new();
    let probes = ProbeFactory::new();
    let (started_tx, started_rx) = mpsc::channel();
    let (go_tx, go_rx) = mpsc::channel::<()>();

    let outcome = thread::scope(|s| {
        let (store, probes) = (&store, &probes);
        let creator = s.spawn(move || {
            store.get_or_create(&probe_key("slow"), || {
                started_tx.send(()).unwrap();
                go_rx.recv().unwrap();
                probes.probe("slow")
            })
        });

        started_rx.recv().unwrap();
        let report = store.close();
        assert_eq!(report.evicted, 0);
        go_tx.send(()).unwrap();
        creator.join().unwrap()
    });

    assert!(matches!(outcome, Err(StoreError::Closed { .. })));
    assert_eq!(probes.created(), 1);
    assert_eq!(probes.cleanups(), 1);
    assert!(store.is_empty());
}

#[test]
fn uncaught_cleanup_panic_propagates_when_disabled() {
    let store = ComponentStore::with_config(&RetentionConfig::new().with_catch_cleanup_panics(false));
    let probes = ProbeFactory::new();
    store.get_or_create(&probe_key("p"), || probes.panicking("p")).unwrap();

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| store.remove(&probe_key("p"))));
    assert!(outcome.is_err());
    assert!(!store.contains(&probe_key("p")));
    // cleanup is never retried
    assert!(!store.remove(&probe_key("p")));
    assert_eq!(probes.cleanups(), 1);
}

#[test]
fn uncaught_panic_during_clear_still_cleans_every_entry() {
    init_tracing();
    let store = ComponentStore::with_config(&RetentionConfig::new().with_catch_cleanup_panics(false));
    let probes = ProbeFactory::new();
    store.get_or_create(&probe_key("boom"), || probes.panicking("boom")).unwrap();
    for i in 0..16 {
        let name = format!("ok-{i}");
        store.get_or_create(&probe_key(&name), || probes.probe(&name)).unwrap();
    }

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| store.clear()));

    assert!(outcome.is_err());
    assert_eq!(probes.created(), 17);
    assert_eq!(probes.cleanups(), 17);
    assert!(store.is_empty());
    assert_eq!(store.stats().cleanup_failures, 1);
}

#[test]
fn uncaught_panic_during_close_still_cleans_every_entry() {
    let store = ComponentStore::with_config(&RetentionConfig::new().with_catch_cleanup_panics(false));
    let probes = ProbeFactory::new();
    store.get_or_create(&probe_key("a"), || probes.probe("a")).unwrap();
    store.get_or_create(&probe_key("boom"), || probes.panicking("boom")).unwrap();
    store.get_or_create(&probe_key("b"), || probes.probe("b")).unwrap();

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| store.close()));

    assert!(outcome.is_err());
    assert_eq!(probes.cleanups(), 3);
    assert!(store.is_closed());
    assert!(store.is_empty());
}

#[test]
fn keys_and_stats_track_live_entries() {
    let store = ComponentStore::new();
    let probes = ProbeFactory::new();
    for name in ["a", "b"] {
        store.get_or_create(&probe_key(name), || probes.probe(name)).unwrap();
    }
    let mut keys: Vec<String> = store.keys().iter().map(ToString::to_string).collect();
    keys.sort();
    assert_eq!(keys, vec!["probe:a", "probe:b"]);

    store.remove(&probe_key("a"));
    let stats = store.stats();
    assert_eq!(stats.live, 1);
    assert_eq!(stats.created, 2);
    assert_eq!(stats.evicted, 1);
}

#[test]
fn counter_is_not_shared_between_stores() {
    let calls = AtomicUsize::new(0);
    let probes = ProbeFactory::new();
    let first = ComponentStore::new();
    let second = ComponentStore::new();
    for store in [&first, &second] {
        store
            .get_or_create(&probe_key("a"), || {
                calls.fetch_add(1, Ordering::SeqCst);
                probes.probe("a")
            })
            .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
