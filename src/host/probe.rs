//! Capability probing over ordered integration strategies.
//!
//! Each host capability (preset import, profile read, profile write-back,
//! reload) is an ordered list of strategies. A strategy answers `Ok(None)` or
//! `Ok(false)` when it does not apply to the running host, and `Err` when it
//! applied but failed; both move the probe on to the next candidate. Errors
//! are logged at debug level and never escape the probe.

use std::fmt;

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::Result;

/// A named integration point.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;
}

/// Refreshes the host's profiles from preset definitions.
pub trait PresetImporter: Strategy {
    /// Returns the number of newly imported profiles, or `None` when not
    /// applicable.
    fn import_presets(&self) -> Result<Option<usize>>;
}

/// Reads the host's profile collection.
pub trait ProfileSource: Strategy {
    fn fetch(&self) -> Result<Option<Vec<Profile>>>;
}

/// Writes a profile collection back to the host.
pub trait ProfileSink: Strategy {
    /// Returns false when this sink does not apply.
    fn store(&self, profiles: &[Profile]) -> Result<bool>;
}

/// Asks the host to reload its build model.
pub trait ReloadScheduler: Strategy {
    /// Returns false when this scheduler does not apply.
    fn schedule_reload(&self) -> Result<bool>;
}

/// A host profile as read through a [`ProfileSource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    /// Primary name.
    pub name: Option<String>,
    /// Fallback name.
    pub display_name: Option<String>,
    /// Enabled flag; `None` when the host does not report one.
    pub enabled: Option<bool>,
}

impl Profile {
    /// A profile with a primary name and an explicit flag.
    pub fn named(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: Some(name.into()),
            display_name: None,
            enabled: Some(enabled),
        }
    }

    /// Primary name if non-empty, else the display name if non-empty.
    pub fn resolved_name(&self) -> Option<&str> {
        [self.name.as_deref(), self.display_name.as_deref()]
            .into_iter()
            .flatten()
            .find(|n| !n.is_empty())
    }

    /// Unknown flags count as disabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled == Some(true)
    }
}

/// A profile collection borrowed from the host for one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileCollection {
    /// Strategy that produced the collection.
    pub source: &'static str,
    pub profiles: Vec<Profile>,
}

/// Ordered integration strategies for one host.
#[derive(Default)]
pub struct Integrations {
    pub importers: Vec<Box<dyn PresetImporter>>,
    pub sources: Vec<Box<dyn ProfileSource>>,
    pub sinks: Vec<Box<dyn ProfileSink>>,
    pub reloaders: Vec<Box<dyn ReloadScheduler>>,
}

impl fmt::Debug for Integrations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |list: Vec<&'static str>| list.join(",");
        f.debug_struct("Integrations")
            .field("importers", &names(self.importers.iter().map(|s| s.name()).collect()))
            .field("sources", &names(self.sources.iter().map(|s| s.name()).collect()))
            .field("sinks", &names(self.sinks.iter().map(|s| s.name()).collect()))
            .field("reloaders", &names(self.reloaders.iter().map(|s| s.name()).collect()))
            .finish()
    }
}

/// Try `attempt` on each strategy in order; first `Some` wins.
fn probe_first<S, T>(
    capability: &str,
    strategies: &[Box<S>],
    mut attempt: impl FnMut(&S) -> Result<Option<T>>,
) -> Option<(&'static str, T)>
where
    S: Strategy + ?Sized,
{
    for strategy in strategies {
        match attempt(strategy.as_ref()) {
            Ok(Some(value)) => {
                trace!(capability, strategy = strategy.name(), "Strategy applied");
                return Some((strategy.name(), value));
            }
            Ok(None) => trace!(capability, strategy = strategy.name(), "Strategy not applicable"),
            Err(e) => debug!(capability, strategy = strategy.name(), error = %e, "Strategy failed"),
        }
    }
    None
}

impl Integrations {
    /// True if no strategy of any kind is available.
    pub fn is_empty(&self) -> bool {
        self.importers.is_empty()
            && self.sources.is_empty()
            && self.sinks.is_empty()
            && self.reloaders.is_empty()
    }

    /// Run the first applicable preset importer.
    pub fn import_presets(&self) -> Option<(&'static str, usize)> {
        probe_first("import_presets", &self.importers, |s| s.import_presets())
    }

    /// Fetch profiles from the first source that yields a collection.
    pub fn fetch_profiles(&self) -> Option<ProfileCollection> {
        probe_first("fetch_profiles", &self.sources, |s| s.fetch())
            .map(|(source, profiles)| ProfileCollection { source, profiles })
    }

    /// Write `collection` back through the first sink that accepts it.
    pub fn store_profiles(&self, collection: &ProfileCollection) -> Option<&'static str> {
        probe_first("store_profiles", &self.sinks, |s| {
            Ok(s.store(&collection.profiles)?.then_some(()))
        })
        .map(|(name, ())| name)
    }

    /// Schedule a reload through the first scheduler that accepts it.
    pub fn schedule_reload(&self) -> Option<&'static str> {
        probe_first("schedule_reload", &self.reloaders, |s| {
            Ok(s.schedule_reload()?.then_some(()))
        })
        .map(|(name, ())| name)
    }
}
