//! Process-wide readiness, set once at startup and read on every request.
//!
//! Lifecycle: `loading` (uninitialized) moves exactly once to either a ready
//! strategy or an unready detail. There is no way back. A strategy that
//! stands in for a backend that failed to load keeps the failure cause.

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::provider::ResponseStrategy;

/// Why the service is (or is not) able to generate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthDetail {
    Loading,
    BackendMissing,
    WeightsMissing,
    LoadFailed,
    Ready,
}

impl HealthDetail {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::BackendMissing => "backend_missing",
            Self::WeightsMissing => "weights_missing",
            Self::LoadFailed => "load_failed",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for HealthDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of startup backend resolution.
#[derive(Clone)]
pub enum Readiness {
    Ready(Arc<dyn ResponseStrategy>),
    /// Serving through a substitute strategy; `cause` is why the preferred
    /// backend is not.
    Fallback {
        strategy: Arc<dyn ResponseStrategy>,
        cause: HealthDetail,
    },
    Unready(HealthDetail),
}

impl fmt::Debug for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(strategy) => f.debug_tuple("Ready").field(&strategy.name()).finish(),
            Self::Fallback { strategy, cause } => f
                .debug_struct("Fallback")
                .field("strategy", &strategy.name())
                .field("cause", cause)
                .finish(),
            Self::Unready(detail) => f.debug_tuple("Unready").field(detail).finish(),
        }
    }
}

/// Read-only view used by health endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub ready: bool,
    pub detail: HealthDetail,
    /// Set when serving through a fallback strategy.
    pub fallback_cause: Option<HealthDetail>,
}

/// Once-set readiness holder. Shared through `Arc`, injected where needed.
#[derive(Default)]
pub struct ServiceHealthState {
    state: OnceLock<Readiness>,
}

impl ServiceHealthState {
    /// Uninitialized: reports `loading` until [`initialize`](Self::initialize).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready(strategy: Arc<dyn ResponseStrategy>) -> Self {
        Self::initialized(Readiness::Ready(strategy))
    }

    pub fn unready(detail: HealthDetail) -> Self {
        Self::initialized(Readiness::Unready(detail))
    }

    fn initialized(readiness: Readiness) -> Self {
        let state = OnceLock::new();
        let _ = state.set(readiness);
        Self { state }
    }

    /// Record the startup outcome. A second call is rejected and hands the
    /// value back.
    pub fn initialize(&self, readiness: Readiness) -> Result<(), Readiness> {
        self.state.set(readiness)
    }

    pub fn is_ready(&self) -> bool {
        self.strategy().is_some()
    }

    pub fn detail(&self) -> HealthDetail {
        match self.state.get() {
            None => HealthDetail::Loading,
            Some(Readiness::Ready(_) | Readiness::Fallback { .. }) => HealthDetail::Ready,
            Some(Readiness::Unready(detail)) => *detail,
        }
    }

    /// The active strategy, present only when ready.
    pub fn strategy(&self) -> Option<&Arc<dyn ResponseStrategy>> {
        match self.state.get() {
            Some(Readiness::Ready(strategy) | Readiness::Fallback { strategy, .. }) => {
                Some(strategy)
            }
            _ => None,
        }
    }

    /// Why the preferred backend is not the one serving, if it isn't.
    pub fn fallback_cause(&self) -> Option<HealthDetail> {
        match self.state.get() {
            Some(Readiness::Fallback { cause, .. }) => Some(*cause),
            _ => None,
        }
    }

    pub fn backend_name(&self) -> Option<&str> {
        self.strategy().map(|s| s.name())
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            ready: self.is_ready(),
            detail: self.detail(),
            fallback_cause: self.fallback_cause(),
        }
    }
}
