//! Scripted walk through a host's lifecycle with one counter screen.

use crate::counter::{CounterPresenter, CounterRepository};
use anyhow::{Context, Result};
use retain_core::{
    AfterDestroy, Disposition, HostState, LifecycleSignal, RetentionConfig, ScopeRegistry,
    StoreError,
};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const HOST: &str = "home";
const COUNTER: &str = "main";

/// One observed step of the scenario
#[derive(Debug, Clone)]
pub(crate) struct Check {
    pub(crate) step: &'static str,
    pub(crate) passed: bool,
    pub(crate) detail: String,
}

/// Outcome of [`run_scenario`]
#[derive(Debug, Default)]
pub(crate) struct ScenarioReport {
    pub(crate) checks: Vec<Check>,
}

impl ScenarioReport {
    fn record(&mut self, step: &'static str, passed: bool, detail: impl Into<String>) {
        let detail = detail.into();
        info!(step, passed, %detail, "scenario step");
        self.checks.push(Check {
            step,
            passed,
            detail,
        });
    }

    pub(crate) fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }

    pub(crate) fn generate_text(&self) -> String {
        let mut out = String::from("Scenario Report:\n");
        for check in &self.checks {
            let mark = if check.passed { "ok" } else { "FAIL" };
            let _ = writeln!(out, "  [{mark:>4}] {:<10} {}", check.step, check.detail);
        }
        let _ = write!(
            out,
            "  Status: {}",
            if self.passed() { "PASSED" } else { "FAILED" }
        );
        out
    }
}

/// Wait for the background persistence task to catch up
async fn settle(repository: &CounterRepository, expected: u64) -> bool {
    for _ in 0..200 {
        if repository.load(COUNTER) == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    false
}

/// Build, rebuild, navigate, rotate, dismiss, reshow, and finally destroy the host
pub(crate) async fn run_scenario(config: RetentionConfig) -> Result<ScenarioReport> {
    let after_destroy = config.after_destroy;
    let repository = Arc::new(CounterRepository::default());
    let registry = ScopeRegistry::with_config(config);
    let scope = registry.enter(HOST);
    let mut report = ScenarioReport::default();

    let open = || CounterPresenter::open(COUNTER, &repository);

    // first build
    let counter = scope
        .try_retain(COUNTER, open)
        .context("first build")?;
    let first = Arc::clone(counter.component());
    first.increment();
    first.increment();
    report.record(
        "build",
        first.current() == 2,
        format!("instance #{} counts {}", first.instance(), first.current()),
    );

    // rebuild without teardown
    let rebuilt = scope.try_retain(COUNTER, open).context("rebuild")?;
    report.record(
        "rebuild",
        Arc::ptr_eq(rebuilt.component(), &first),
        format!("instance #{}", rebuilt.instance()),
    );

    // navigate forward, then back
    let disposition = rebuilt.teardown(HostState::Started.into());
    let back = scope.try_retain(COUNTER, open).context("back")?;
    report.record(
        "navigate",
        !disposition.is_evict() && Arc::ptr_eq(back.component(), &first),
        format!("{disposition:?}, counts {}", back.current()),
    );

    // configuration change rebuilds the host
    let disposition = back.teardown(LifecycleSignal::TearingDown);
    let rotated = scope.try_retain(COUNTER, open).context("rotate")?;
    report.record(
        "rotate",
        !disposition.is_evict() && Arc::ptr_eq(rotated.component(), &first),
        format!("{disposition:?}, counts {}", rotated.current()),
    );

    // removed from the screen on purpose
    let persisted = settle(&repository, first.current()).await;
    let disposition = rotated.teardown(HostState::Resumed.into());
    report.record(
        "hide",
        disposition == Disposition::Evict && first.is_cancelled() && persisted,
        format!(
            "{disposition:?}, presenter cancelled: {}, persisted: {persisted} ({} writes)",
            first.is_cancelled(),
            repository.writes()
        ),
    );

    // shown again: a fresh presenter reloads the stored value
    let shown = scope.try_retain(COUNTER, open).context("show")?;
    let second = Arc::clone(shown.component());
    report.record(
        "show",
        !Arc::ptr_eq(&second, &first) && second.current() == 2,
        format!("instance #{} counts {}", second.instance(), second.current()),
    );
    drop(shown);

    // the host itself goes away
    let cleared = registry.destroy(HOST).unwrap_or_default();
    report.record(
        "destroy",
        cleared.evicted == 1 && cleared.is_clean() && second.is_cancelled(),
        format!(
            "evicted {}, failures {}, scopes left {}",
            cleared.evicted,
            cleared.failures.len(),
            registry.len()
        ),
    );

    // late access through a stale scope handle
    let late = scope.try_retain(COUNTER, open);
    let (passed, detail) = match (after_destroy, late) {
        (AfterDestroy::Reject, Err(StoreError::Closed { key })) => {
            (true, format!("rejected {key}"))
        }
        (AfterDestroy::Regenerate, Ok(fresh)) => (
            !Arc::ptr_eq(fresh.component(), &second),
            format!("regenerated instance #{} in generation {}", fresh.instance(), scope.generation()),
        ),
        (_, Ok(fresh)) => (false, format!("unexpected instance #{}", fresh.instance())),
        (_, Err(err)) => (false, format!("unexpected error: {err}")),
    };
    report.record("late", passed, detail);

    // no-op unless a late access regenerated the scope
    scope.on_scope_destroyed();
    Ok(report)
}
