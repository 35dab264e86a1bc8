//! Lifecycle classification of visual teardowns
//!
//! When a visual node disappears, the host's lifecycle state at that exact
//! moment is the only signal telling a deliberate removal apart from a
//! rebuild. The signal must be sampled at teardown, not at creation: the same
//! key can appear and disappear many times over a component's retained life.
//!
//! | signal        | meaning                                   | decision |
//! |---------------|-------------------------------------------|----------|
//! | `Active`      | host fully foregrounded, node removed     | evict    |
//! | `Suspended`   | host navigated past but still reachable   | retain   |
//! | `TearingDown` | host structure rebuilt, scope survives    | retain   |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Host lifecycle signal sampled at teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleSignal {
    /// Host is interactive; the disappearance is deliberate
    Active,
    /// Host is transitioning away (navigation); the disappearance is incidental
    Suspended,
    /// Host structure is being rebuilt (configuration change); incidental
    TearingDown,
}

impl fmt::Display for LifecycleSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::TearingDown => "tearing_down",
        })
    }
}

/// Finer-grained host lifecycle, as tracked by typical UI hosts
///
/// Hosts that track these states can sample one and convert it with
/// [`LifecycleSignal::from`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostState {
    /// Host object exists but has not been created yet
    Initialized,
    /// Host created, not visible
    Created,
    /// Host visible but not interactive (e.g. mid-navigation)
    Started,
    /// Host visible and interactive
    Resumed,
    /// Host destroyed
    Destroyed,
}

impl From<HostState> for LifecycleSignal {
    fn from(state: HostState) -> Self {
        match state {
            HostState::Resumed => Self::Active,
            HostState::Started => Self::Suspended,
            HostState::Initialized | HostState::Created | HostState::Destroyed => {
                Self::TearingDown
            }
        }
    }
}

/// Why a component was kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetainReason {
    /// Host navigated away but stays reachable
    Navigation,
    /// Host structure is being rebuilt
    Rebuild,
}

/// Outcome of classifying a teardown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Evict the backing component now
    Evict,
    /// Keep the backing component
    Retain(RetainReason),
}

impl Disposition {
    /// Check if the component is evicted
    #[inline]
    #[must_use]
    pub fn is_evict(self) -> bool {
        matches!(self, Self::Evict)
    }
}

/// Classify a teardown observed under `signal`
#[must_use]
pub const fn classify(signal: LifecycleSignal) -> Disposition {
    match signal {
        LifecycleSignal::Active => Disposition::Evict,
        LifecycleSignal::Suspended => Disposition::Retain(RetainReason::Navigation),
        LifecycleSignal::TearingDown => Disposition::Retain(RetainReason::Rebuild),
    }
}

/// Whether a teardown observed under `signal` evicts the component
#[inline]
#[must_use]
pub const fn should_evict(signal: LifecycleSignal) -> bool {
    matches!(classify(signal), Disposition::Evict)
}
