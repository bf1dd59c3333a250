//! One workspace session: the store, tracker, bus, dispatcher and host,
//! constructed together and dropped together.
//!
//! Collaborators get the services through this value instead of looking
//! them up globally. Selectors accepted by [`MuxSession::find`] are a
//! 1-based ordinal, an exact nickname, or a path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::activation::{Activation, Activator};
use crate::bus::EventBus;
use crate::config::MuxConfig;
use crate::detect::{Detector, Probe};
use crate::dispatch::{DispatchHandle, Dispatcher};
use crate::engine::compile_pattern;
use crate::entry::{default_nickname, is_build_root_file, normalize_path, Entry, Move};
use crate::error::{MuxError, Result};
use crate::host::{BuildHost, FsResolver, ProfileCollection, TargetResolver, WorkspaceHost};
use crate::pick::{quick_pick, QuickPick};
use crate::selection::SelectionTracker;
use crate::store::{EntryStore, STORE_FILE_NAME};

/// Services for one workspace.
pub struct MuxSession {
    workspace: PathBuf,
    state_dir: Option<PathBuf>,
    config: MuxConfig,
    bus: EventBus,
    store: Arc<EntryStore>,
    tracker: Arc<SelectionTracker>,
    host: Arc<dyn BuildHost>,
    dispatcher: Dispatcher,
    activator: Activator,
    detector: Detector,
}

impl std::fmt::Debug for MuxSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MuxSession")
            .field("workspace", &self.workspace)
            .field("state_dir", &self.state_dir)
            .field("host", &self.host.name())
            .field("entries", &self.store.len())
            .finish_non_exhaustive()
    }
}

/// Assembles a [`MuxSession`].
#[derive(Default)]
pub struct SessionBuilder {
    workspace: Option<PathBuf>,
    state_dir: Option<PathBuf>,
    in_memory: bool,
    config: MuxConfig,
    host: Option<Arc<dyn BuildHost>>,
    resolver: Option<Arc<dyn TargetResolver>>,
}

impl SessionBuilder {
    #[must_use]
    pub fn workspace(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workspace = Some(dir.into());
        self
    }

    /// Override the state directory from the config.
    #[must_use]
    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    /// Keep entries in memory only.
    #[must_use]
    pub fn in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    #[must_use]
    pub fn config(mut self, config: MuxConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `host` instead of the workspace host document.
    #[must_use]
    pub fn host(mut self, host: Arc<dyn BuildHost>) -> Self {
        self.host = Some(host);
        self
    }

    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn TargetResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[instrument(skip(self))]
    pub fn build(self) -> Result<MuxSession> {
        let workspace = match self.workspace {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        let state_dir = if self.in_memory {
            self.state_dir
        } else {
            Some(match self.state_dir {
                Some(dir) => dir,
                None => self.config.state_dir_for(&workspace)?,
            })
        };

        let bus = EventBus::new();
        let store = Arc::new(match (&state_dir, self.in_memory) {
            (Some(dir), false) => EntryStore::open(dir.join(STORE_FILE_NAME), bus.clone())?,
            _ => EntryStore::in_memory(bus.clone()),
        });
        let host = match (self.host, &state_dir) {
            (Some(host), _) => host,
            (None, Some(dir)) => Arc::new(WorkspaceHost::new(dir)) as Arc<dyn BuildHost>,
            (None, None) => {
                return Err(MuxError::validation(
                    "an in-memory session needs an explicit host",
                ));
            }
        };
        let resolver = self.resolver.unwrap_or_else(|| Arc::new(FsResolver));
        let tracker = Arc::new(SelectionTracker::new(bus.clone()));
        let dispatcher = Dispatcher::new()?;
        let activator = Activator::new(
            resolver,
            Arc::clone(&host),
            Arc::clone(&tracker),
            dispatcher.handle(),
        )
        .with_settle_delay(self.config.settle_delay());
        let detector = Detector::new(
            Arc::clone(&host),
            Arc::clone(&tracker),
            self.config.detect_policy(),
        );

        debug!(workspace = %workspace.display(), host = host.name(), "Session ready");
        Ok(MuxSession {
            workspace,
            state_dir,
            config: self.config,
            bus,
            store,
            tracker,
            host,
            dispatcher,
            activator,
            detector,
        })
    }
}

impl MuxSession {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Open the file-backed session for `workspace`.
    pub fn open(workspace: impl Into<PathBuf>, config: MuxConfig) -> Result<Self> {
        Self::builder().workspace(workspace).config(config).build()
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// State directory, unless the session is in memory.
    pub fn state_dir(&self) -> Option<&Path> {
        self.state_dir.as_deref()
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn tracker(&self) -> &SelectionTracker {
        &self.tracker
    }

    pub fn host(&self) -> &dyn BuildHost {
        self.host.as_ref()
    }

    pub fn dispatch(&self) -> DispatchHandle {
        self.dispatcher.handle()
    }

    /// Drain the dispatcher. Returns the number of jobs run.
    pub fn run_until_idle(&self) -> usize {
        self.dispatcher.run_until_idle()
    }

    /// Make `path` absolute against the workspace.
    fn absolute(&self, path: &str) -> Result<String> {
        normalize_path(path)
            .or_else(|_| normalize_path(&self.workspace.join(path.trim()).to_string_lossy()))
    }

    /// Find the entry named by `selector`: a 1-based ordinal within range,
    /// then an exact nickname, then a path. A number past the end of the
    /// list is tried as a nickname.
    pub fn find(&self, selector: &str) -> Result<Entry> {
        let entries = self.store.list();
        let selector = selector.trim();
        let not_found = || MuxError::EntryNotFound {
            selector: selector.to_string(),
        };

        let by_ordinal = selector
            .parse::<usize>()
            .ok()
            .and_then(|ordinal| ordinal.checked_sub(1))
            .and_then(|i| entries.get(i));
        if let Some(entry) = by_ordinal {
            return Ok(entry.clone());
        }

        let mut by_name = entries.iter().filter(|e| e.nickname == selector);
        if let Some(first) = by_name.next() {
            if by_name.next().is_some() {
                return Err(MuxError::validation(format!(
                    "nickname '{selector}' is ambiguous; use an ordinal or path"
                )));
            }
            return Ok(first.clone());
        }

        let path = self.absolute(selector).map_err(|_| not_found())?;
        self.store.get(&path).ok_or_else(not_found)
    }

    /// Register a build root file.
    ///
    /// Re-adding a registered path replaces the entry in place. Only
    /// `CMakeLists.txt` files are accepted unless `force` is set.
    #[instrument(skip(self, patterns))]
    pub fn add(
        &self,
        file: &str,
        nickname: Option<&str>,
        patterns: &[String],
        force: bool,
    ) -> Result<Entry> {
        let path = self.absolute(file)?;
        if !Path::new(&path).is_file() {
            return Err(MuxError::TargetNotFound { path });
        }
        if !force && !is_build_root_file(&path) {
            return Err(MuxError::validation(format!(
                "{path} is not a CMakeLists.txt file (use --force to add it anyway)"
            )));
        }

        let nickname = nickname
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(|| default_nickname(&path), str::to_string);
        let mut entry = Entry::new(nickname, &path)?;
        for pattern in patterns {
            compile_pattern(pattern)?;
            entry.add_pattern(pattern)?;
        }
        self.store.add_or_replace(entry.clone())?;
        info!(path = entry.path(), nickname = %entry.nickname, "Entry added");
        Ok(entry)
    }

    pub fn rename(&self, selector: &str, nickname: &str) -> Result<Entry> {
        let entry = self.find(selector)?;
        self.store.rename(entry.path(), nickname)?;
        self.store.get(entry.path()).ok_or_else(|| MuxError::EntryNotFound {
            selector: selector.to_string(),
        })
    }

    /// Remove the selected entry, clearing the selection if it was active.
    pub fn remove(&self, selector: &str) -> Result<Entry> {
        let entry = self.find(selector)?;
        self.store.remove_by_path(entry.path())?;
        if self.tracker.is_active(entry.path()) {
            self.tracker.set_active(None);
        }
        Ok(entry)
    }

    /// Move the selected entry one step. Returns false at the ends.
    pub fn reorder(&self, selector: &str, delta: Move) -> Result<bool> {
        let entry = self.find(selector)?;
        let index = self
            .store
            .position(entry.path())
            .ok_or_else(|| MuxError::EntryNotFound {
                selector: selector.to_string(),
            })?;
        self.store.reorder(index, delta)
    }

    /// Append a pattern; it must compile.
    pub fn add_pattern(&self, selector: &str, pattern: &str) -> Result<Entry> {
        compile_pattern(pattern.trim())?;
        self.edit_patterns(selector, |entry| entry.add_pattern(pattern))
    }

    /// Replace the pattern at `index` (0-based); it must compile.
    pub fn edit_pattern(&self, selector: &str, index: usize, pattern: &str) -> Result<Entry> {
        compile_pattern(pattern.trim())?;
        self.edit_patterns(selector, |entry| entry.edit_pattern(index, pattern))
    }

    /// Remove the pattern at `index` (0-based), returning it.
    pub fn remove_pattern(&self, selector: &str, index: usize) -> Result<String> {
        let entry = self.find(selector)?;
        self.store
            .update_patterns(entry.path(), |entry| entry.remove_pattern(index))
    }

    /// Move the pattern at `index` (0-based) one step.
    pub fn move_pattern(&self, selector: &str, index: usize, delta: Move) -> Result<bool> {
        let entry = self.find(selector)?;
        self.store
            .update_patterns(entry.path(), |entry| Ok(entry.move_pattern(index, delta)))
    }

    fn edit_patterns(
        &self,
        selector: &str,
        edit: impl FnOnce(&mut Entry) -> Result<()>,
    ) -> Result<Entry> {
        let entry = self.find(selector)?;
        self.store.update_patterns(entry.path(), edit)?;
        self.store.get(entry.path()).ok_or_else(|| MuxError::EntryNotFound {
            selector: selector.to_string(),
        })
    }

    /// Activate the selected entry. The profile pass stays queued until
    /// the dispatcher runs.
    pub fn activate(&self, selector: &str) -> Result<Activation> {
        let entry = self.find(selector)?;
        self.activator.activate(&entry)
    }

    /// Activate an entry that may not be in the store.
    pub fn activate_entry(&self, entry: &Entry) -> Result<Activation> {
        self.activator.activate(entry)
    }

    /// One detection attempt, now.
    pub fn detect_now(&self) -> Probe {
        self.detector.probe()
    }

    /// Queue detection with retries.
    pub fn start_detection(&self) {
        self.detector.start(&self.dispatcher.handle());
    }

    /// Quick-pick over the stored entries.
    pub fn quick_pick(&self) -> QuickPick {
        let active = self.tracker.get_active();
        quick_pick(
            &self.store.list(),
            active.as_deref(),
            self.config.quick_pick_limit,
        )
    }

    /// The host's current profiles, read through the probe.
    pub fn profiles(&self) -> Option<ProfileCollection> {
        self.host.integrations().fetch_profiles()
    }
}
