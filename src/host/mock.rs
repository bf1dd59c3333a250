//! Mock host for unit and integration testing.
//!
//! Records every host call and lets tests switch individual capabilities
//! off to exercise the degraded paths.
//!
//! # Example
//!
//! ```rust,ignore
//! use cmux::host::mock::{HostOp, MockHost};
//!
//! let host = MockHost::new().with_profiles(&[("Debug", false), ("Release", false)]);
//! // ... run the engine against `host` ...
//! assert_eq!(host.enabled_names(), vec!["Debug"]);
//! assert!(host.operations().contains(&HostOp::ScheduleReload));
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::probe::{
    Integrations, PresetImporter, Profile, ProfileSink, ProfileSource, ReloadScheduler, Strategy,
};
use super::{BuildHost, Target};
use crate::error::{MuxError, Result};

/// Recorded host call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    Load { path: String },
    ImportPresets,
    FetchProfiles,
    StoreProfiles { enabled: Vec<String> },
    ScheduleReload,
}

#[derive(Debug, Default)]
struct MockState {
    profiles: Option<Vec<Profile>>,
    presets: Vec<String>,
    loaded_root: Option<PathBuf>,
    can_load: bool,
    fail_load: bool,
    can_import: bool,
    can_store: bool,
    can_reload: bool,
    fail_fetch: bool,
    ops: Vec<HostOp>,
}

/// In-memory host. Clones share state.
#[derive(Debug, Clone)]
pub struct MockHost {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHost {
    /// A host with every capability and an empty profile list.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                profiles: Some(Vec::new()),
                can_load: true,
                can_import: true,
                can_store: true,
                can_reload: true,
                ..MockState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, op: HostOp) {
        debug!(?op, "Mock host call");
        self.lock().ops.push(op);
    }

    /// Replace the profile list with named profiles.
    #[must_use]
    pub fn with_profiles(self, profiles: &[(&str, bool)]) -> Self {
        self.lock().profiles = Some(
            profiles
                .iter()
                .map(|&(name, enabled)| Profile::named(name, enabled))
                .collect(),
        );
        self
    }

    /// Append an arbitrary profile record.
    #[must_use]
    pub fn with_profile(self, profile: Profile) -> Self {
        self.lock().profiles.get_or_insert_with(Vec::new).push(profile);
        self
    }

    /// Presets that the importer turns into disabled profiles.
    #[must_use]
    pub fn with_presets(self, presets: &[&str]) -> Self {
        self.lock().presets = presets.iter().map(|p| (*p).to_string()).collect();
        self
    }

    /// Build root the host reports as loaded.
    #[must_use]
    pub fn with_loaded_root(self, root: impl Into<PathBuf>) -> Self {
        self.lock().loaded_root = Some(root.into());
        self
    }

    /// Remove the profile source entirely.
    #[must_use]
    pub fn without_profiles(self) -> Self {
        self.lock().profiles = None;
        self
    }

    /// Remove the load operation.
    #[must_use]
    pub fn without_load(self) -> Self {
        self.lock().can_load = false;
        self
    }

    /// Make the load operation fail.
    #[must_use]
    pub fn failing_load(self) -> Self {
        self.lock().fail_load = true;
        self
    }

    /// Remove the preset importer.
    #[must_use]
    pub fn without_import(self) -> Self {
        self.lock().can_import = false;
        self
    }

    /// Remove the write-back sink.
    #[must_use]
    pub fn without_store(self) -> Self {
        self.lock().can_store = false;
        self
    }

    /// Remove the reload scheduler.
    #[must_use]
    pub fn without_reload(self) -> Self {
        self.lock().can_reload = false;
        self
    }

    /// Make the profile source fail with an error.
    #[must_use]
    pub fn failing_fetch(self) -> Self {
        self.lock().fail_fetch = true;
        self
    }

    /// Set the reported loaded root after construction.
    pub fn set_loaded_root(&self, root: Option<PathBuf>) {
        self.lock().loaded_root = root;
    }

    /// Current profiles as `(name, enabled)`.
    pub fn profiles(&self) -> Vec<(String, bool)> {
        self.lock()
            .profiles
            .iter()
            .flatten()
            .map(|p| {
                (
                    p.resolved_name().unwrap_or_default().to_string(),
                    p.is_enabled(),
                )
            })
            .collect()
    }

    /// Names of enabled profiles, in order.
    pub fn enabled_names(&self) -> Vec<String> {
        self.profiles()
            .into_iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(name, _)| name)
            .collect()
    }

    /// All recorded calls.
    pub fn operations(&self) -> Vec<HostOp> {
        self.lock().ops.clone()
    }

    /// Forget recorded calls.
    pub fn clear_operations(&self) {
        self.lock().ops.clear();
    }
}

impl BuildHost for MockHost {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports_load(&self) -> bool {
        self.lock().can_load
    }

    fn load_build_root(&self, target: &Target) -> Result<()> {
        if !self.supports_load() {
            return Err(MuxError::capability("load build root"));
        }
        self.record(HostOp::Load {
            path: target.normalized().to_string(),
        });
        let mut state = self.lock();
        if state.fail_load {
            return Err(MuxError::Other("mock load failure".into()));
        }
        state.loaded_root = Some(target.file().to_path_buf());
        Ok(())
    }

    fn loaded_build_root(&self) -> Result<Option<PathBuf>> {
        Ok(self.lock().loaded_root.clone())
    }

    fn integrations(&self) -> Integrations {
        let (import, store, reload) = {
            let state = self.lock();
            (state.can_import, state.can_store, state.can_reload)
        };
        let part = || MockPart { host: self.clone() };

        let mut integrations = Integrations {
            sources: vec![Box::new(part())],
            ..Integrations::default()
        };
        if import {
            integrations.importers.push(Box::new(part()));
        }
        if store {
            integrations.sinks.push(Box::new(part()));
        }
        if reload {
            integrations.reloaders.push(Box::new(part()));
        }
        integrations
    }
}

struct MockPart {
    host: MockHost,
}

impl Strategy for MockPart {
    fn name(&self) -> &'static str {
        "mock"
    }
}

impl PresetImporter for MockPart {
    fn import_presets(&self) -> Result<Option<usize>> {
        self.host.record(HostOp::ImportPresets);
        let mut state = self.host.lock();
        let presets = state.presets.clone();
        let Some(profiles) = state.profiles.as_mut() else {
            return Ok(None);
        };
        let mut added = 0;
        for preset in presets {
            if !profiles.iter().any(|p| p.resolved_name() == Some(preset.as_str())) {
                profiles.push(Profile::named(preset, false));
                added += 1;
            }
        }
        Ok(Some(added))
    }
}

impl ProfileSource for MockPart {
    fn fetch(&self) -> Result<Option<Vec<Profile>>> {
        self.host.record(HostOp::FetchProfiles);
        let state = self.host.lock();
        if state.fail_fetch {
            return Err(MuxError::Other("mock fetch failure".into()));
        }
        Ok(state.profiles.clone())
    }
}

impl ProfileSink for MockPart {
    fn store(&self, profiles: &[Profile]) -> Result<bool> {
        let enabled = profiles
            .iter()
            .filter(|p| p.is_enabled())
            .filter_map(|p| p.resolved_name().map(str::to_string))
            .collect();
        self.host.record(HostOp::StoreProfiles { enabled });
        let mut state = self.host.lock();
        let Some(current) = state.profiles.as_mut() else {
            return Ok(false);
        };
        *current = profiles.to_vec();
        Ok(true)
    }
}

impl ReloadScheduler for MockPart {
    fn schedule_reload(&self) -> Result<bool> {
        self.host.record(HostOp::ScheduleReload);
        Ok(true)
    }
}
