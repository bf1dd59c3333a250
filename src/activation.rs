//! Activation orchestrator: make one entry the active build root.
//!
//! ```text
//! Resolving -> Loading -> Activating -> EnablingProfiles -> Done
//! ```
//!
//! `Resolving` and `Loading` fail synchronously and leave the tracker
//! untouched. `EnablingProfiles` is queued on the dispatcher after the
//! configured settle delay, so the host's own load has a chance to start
//! before its profiles are read. The delay is a heuristic; a late host is
//! covered by the engine being idempotent on the next activation.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::dispatch::DispatchHandle;
use crate::engine::{EnableReport, ProfileEngine};
use crate::entry::Entry;
use crate::error::{MuxError, Result};
use crate::host::{BuildHost, Target, TargetResolver};
use crate::selection::SelectionTracker;

/// Default gap between the load request and the profile pass.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Orchestration states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    Resolving,
    Loading,
    Activating,
    EnablingProfiles,
    Done,
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolving => "resolving",
            Self::Loading => "loading",
            Self::Activating => "activating",
            Self::EnablingProfiles => "enabling_profiles",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Handle on an activation whose profile pass may still be queued.
#[derive(Debug, Clone)]
pub struct Activation {
    target: Target,
    selection_changed: bool,
    report: Arc<OnceLock<EnableReport>>,
}

impl Activation {
    /// The resolved build root.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// False when the entry was already active.
    pub fn selection_changed(&self) -> bool {
        self.selection_changed
    }

    /// Engine report, once the deferred pass has run.
    pub fn report(&self) -> Option<&EnableReport> {
        self.report.get()
    }

    /// `Done` once the report is in, else `EnablingProfiles`.
    pub fn state(&self) -> ActivationState {
        if self.report.get().is_some() {
            ActivationState::Done
        } else {
            ActivationState::EnablingProfiles
        }
    }
}

/// Sequences activation requests for one session.
pub struct Activator {
    resolver: Arc<dyn TargetResolver>,
    host: Arc<dyn BuildHost>,
    tracker: Arc<SelectionTracker>,
    engine: ProfileEngine,
    dispatch: DispatchHandle,
    settle_delay: Duration,
}

impl fmt::Debug for Activator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activator")
            .field("host", &self.host.name())
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}

impl Activator {
    pub fn new(
        resolver: Arc<dyn TargetResolver>,
        host: Arc<dyn BuildHost>,
        tracker: Arc<SelectionTracker>,
        dispatch: DispatchHandle,
    ) -> Self {
        Self {
            resolver,
            engine: ProfileEngine::new(Arc::clone(&host)),
            host,
            tracker,
            dispatch,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Activate `entry`.
    ///
    /// Returns once the tracker is updated; the profile pass runs on a later
    /// dispatcher turn. Fails with [`MuxError::TargetNotFound`] or
    /// [`MuxError::HostCapabilityMissing`] before any state changes.
    #[instrument(skip(self, entry), fields(path = %entry.path(), host = self.host.name()))]
    pub fn activate(&self, entry: &Entry) -> Result<Activation> {
        step(ActivationState::Resolving);
        let target = self.resolver.resolve(entry.path())?;

        step(ActivationState::Loading);
        if !self.host.supports_load() {
            return Err(MuxError::capability("load build root"));
        }
        self.host.load_build_root(&target)?;

        step(ActivationState::Activating);
        let selection_changed = self.tracker.set_active(Some(target.normalized()));

        step(ActivationState::EnablingProfiles);
        let report = Arc::new(OnceLock::new());
        let slot = Arc::clone(&report);
        let engine = self.engine.clone();
        let patterns = entry.patterns.clone();
        self.dispatch.invoke_after(self.settle_delay, move || {
            let outcome = engine.enable_matching(&patterns);
            let _ = slot.set(outcome);
            step(ActivationState::Done);
        });

        info!(
            target = target.normalized(),
            selection_changed, "Activated build root"
        );
        Ok(Activation {
            target,
            selection_changed,
            report,
        })
    }
}

fn step(state: ActivationState) {
    debug!(%state, "Activation state");
}
