//! Active build-root tracking.
//!
//! Holds at most one active path for the session. Setting the value that is
//! already active does nothing; any real change is announced on
//! [`Topic::ActiveSelectionChanged`] before `set_active` returns.

use std::sync::{Mutex, PoisonError};

use tracing::{debug, instrument};

use crate::bus::{EventBus, Topic};
use crate::entry::{normalize_path, path_key, paths_equal};

/// The session's active selection.
#[derive(Debug)]
pub struct SelectionTracker {
    active: Mutex<Option<String>>,
    bus: EventBus,
}

impl SelectionTracker {
    pub fn new(bus: EventBus) -> Self {
        Self {
            active: Mutex::new(None),
            bus,
        }
    }

    /// The active path, if any.
    pub fn get_active(&self) -> Option<String> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True if `path` is the active path.
    pub fn is_active(&self, path: &str) -> bool {
        self.get_active()
            .is_some_and(|active| paths_equal(&active, path))
    }

    /// Set (or clear, with `None`) the active path.
    ///
    /// Paths are normalized before comparison; a path that cannot be
    /// normalized is kept verbatim. Returns true if the value changed.
    #[instrument(skip(self))]
    pub fn set_active(&self, path: Option<&str>) -> bool {
        let next = path.map(|p| normalize_path(p).unwrap_or_else(|_| p.to_string()));
        {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            let unchanged = match (active.as_deref(), next.as_deref()) {
                (None, None) => true,
                (Some(current), Some(next)) => path_key(current) == path_key(next),
                _ => false,
            };
            if unchanged {
                return false;
            }
            debug!(previous = ?*active, next = ?next, "Active selection changed");
            *active = next;
        }
        self.bus.publish(Topic::ActiveSelectionChanged);
        true
    }
}
