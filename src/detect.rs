//! Best-effort discovery of the build root the host already has loaded.
//!
//! At session start the tracker is empty. The detector asks the host for its
//! loaded root on a later dispatcher turn and, if the host cannot tell yet,
//! retries a bounded number of times. Every attempt first checks whether
//! something else set the selection meanwhile and stops if so. Failures are
//! only logged.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::dispatch::DispatchHandle;
use crate::host::BuildHost;
use crate::selection::SelectionTracker;

/// Retry schedule for auto-detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectPolicy {
    /// Attempts after the first one.
    pub retries: u32,
    pub interval: Duration,
}

impl Default for DetectPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            interval: Duration::from_millis(200),
        }
    }
}

/// Outcome of a single detection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// The tracker was already set; nothing to do.
    AlreadySet,
    /// The host reported this root and the tracker now holds it.
    Found(String),
    /// The host could not tell.
    Unknown,
}

/// Seeds the tracker from the host's loaded root.
#[derive(Clone)]
pub struct Detector {
    host: Arc<dyn BuildHost>,
    tracker: Arc<SelectionTracker>,
    policy: DetectPolicy,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("host", &self.host.name())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Detector {
    pub fn new(host: Arc<dyn BuildHost>, tracker: Arc<SelectionTracker>, policy: DetectPolicy) -> Self {
        Self {
            host,
            tracker,
            policy,
        }
    }

    /// One attempt, now.
    pub fn probe(&self) -> Probe {
        if self.tracker.get_active().is_some() {
            return Probe::AlreadySet;
        }
        let root = match self.host.loaded_build_root() {
            Ok(Some(root)) => root,
            Ok(None) => return Probe::Unknown,
            Err(e) => {
                debug!(error = %e, "Loaded root query failed");
                return Probe::Unknown;
            }
        };
        let root = root.to_string_lossy().into_owned();
        // Lost a race with another writer between the check and here.
        if !self.tracker.set_active(Some(&root)) {
            return Probe::AlreadySet;
        }
        info!(root = %root, "Detected active build root");
        match self.tracker.get_active() {
            Some(active) => Probe::Found(active),
            None => Probe::Unknown,
        }
    }

    /// Start detecting on a later turn of `dispatch`.
    pub fn start(&self, dispatch: &DispatchHandle) {
        let detector = self.clone();
        let handle = dispatch.clone();
        dispatch.invoke_later(move || detector.attempt(&handle, 0));
    }

    fn attempt(&self, dispatch: &DispatchHandle, attempt: u32) {
        match self.probe() {
            Probe::AlreadySet => trace!(attempt, "Selection already set, detection stopped"),
            Probe::Found(_) => {}
            Probe::Unknown if attempt < self.policy.retries => {
                trace!(attempt, "Loaded root unknown, retrying");
                let detector = self.clone();
                let handle = dispatch.clone();
                dispatch.invoke_after(self.policy.interval, move || {
                    detector.attempt(&handle, attempt + 1);
                });
            }
            Probe::Unknown => debug!(attempts = attempt + 1, "Gave up detecting loaded root"),
        }
    }
}
