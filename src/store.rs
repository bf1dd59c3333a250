//! Ordered, path-keyed entry store with durable persistence.
//!
//! All mutations are serialized through one writer lock, persisted before
//! they return, and only then announced on [`Topic::EntriesChanged`].
//! Readers get snapshot copies from [`EntryStore::list`] and never hold a
//! reference into the live collection.
//!
//! # File format
//!
//! ```json
//! {
//!   "entries": [
//!     { "nickname": "app", "path": "/p/CMakeLists.txt", "patterns": ["^debug"] }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};

use crate::bus::{EventBus, Topic};
use crate::entry::{move_item, Entry, Move};
use crate::error::{MuxError, Result, ResultExt};

/// Name of the store file inside the state directory.
pub const STORE_FILE_NAME: &str = "entries.json";

#[derive(Debug, Default, Deserialize)]
struct StoreFile {
    #[serde(default)]
    entries: Vec<Entry>,
}

#[derive(Serialize)]
struct StoreFileRef<'a> {
    entries: &'a [Entry],
}

/// What a mutation did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    /// Nothing changed; skip persistence and notification.
    Unchanged,
    /// Persist, but do not notify.
    Silent,
    /// Persist and notify.
    Notify,
}

/// The entry collection for one workspace session.
#[derive(Debug)]
pub struct EntryStore {
    entries: RwLock<Vec<Entry>>,
    writer: Mutex<()>,
    file: Option<PathBuf>,
    bus: EventBus,
}

impl EntryStore {
    /// Create a store that lives only in memory.
    pub fn in_memory(bus: EventBus) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            writer: Mutex::new(()),
            file: None,
            bus,
        }
    }

    /// Open the store backed by `file`, loading existing entries.
    ///
    /// A missing file yields an empty store; it is created on first write.
    #[instrument(skip(bus), fields(file = %file.as_ref().display()))]
    pub fn open(file: impl AsRef<Path>, bus: EventBus) -> Result<Self> {
        let file = file.as_ref().to_path_buf();
        let entries = load_entries(&file)?;
        info!(count = entries.len(), "Loaded entry store");
        Ok(Self {
            entries: RwLock::new(entries),
            writer: Mutex::new(()),
            file: Some(file),
            bus,
        })
    }

    /// Backing file, if persistent.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of all entries in order.
    pub fn list(&self) -> Vec<Entry> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy of the entry stored under `path`.
    pub fn get(&self, path: &str) -> Option<Entry> {
        self.read().iter().find(|e| e.matches_path(path)).cloned()
    }

    /// Position of the entry stored under `path`.
    pub fn position(&self, path: &str) -> Option<usize> {
        self.read().iter().position(|e| e.matches_path(path))
    }

    /// Insert `entry`, or replace the entry with the same path in place.
    #[instrument(skip(self, entry), fields(path = %entry.path(), nickname = %entry.nickname))]
    pub fn add_or_replace(&self, entry: Entry) -> Result<()> {
        let mut entry = entry;
        entry.renormalize()?;
        self.commit(move |entries| {
            if let Some(slot) = entries.iter_mut().find(|e| **e == entry) {
                debug!("Replacing existing entry");
                *slot = entry;
            } else {
                debug!("Appending new entry");
                entries.push(entry);
            }
            Ok(((), Effect::Notify))
        })
    }

    /// Remove the entry stored under `path`. Returns true if one was removed.
    #[instrument(skip(self))]
    pub fn remove_by_path(&self, path: &str) -> Result<bool> {
        self.commit(|entries| {
            let before = entries.len();
            entries.retain(|e| !e.matches_path(path));
            if entries.len() == before {
                trace!("No entry to remove");
                Ok((false, Effect::Unchanged))
            } else {
                Ok((true, Effect::Notify))
            }
        })
    }

    /// Move the entry at `index` one step. Out-of-bounds moves are no-ops.
    #[instrument(skip(self))]
    pub fn reorder(&self, index: usize, delta: Move) -> Result<bool> {
        self.commit(|entries| {
            if move_item(entries, index, delta) {
                Ok((true, Effect::Notify))
            } else {
                trace!("Reorder out of bounds");
                Ok((false, Effect::Unchanged))
            }
        })
    }

    /// Change the nickname of the entry stored under `path`.
    #[instrument(skip(self))]
    pub fn rename(&self, path: &str, nickname: &str) -> Result<()> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(MuxError::validation("nickname is empty"));
        }
        self.commit(|entries| {
            let entry = find_mut(entries, path)?;
            if entry.nickname == nickname {
                return Ok(((), Effect::Unchanged));
            }
            entry.nickname = nickname.to_string();
            Ok(((), Effect::Notify))
        })
    }

    /// Replace the patterns of the entry stored under `path`.
    ///
    /// Persisted immediately but not announced: pattern edits do not change
    /// the entry list itself.
    #[instrument(skip(self, patterns), fields(count = patterns.len()))]
    pub fn set_patterns(&self, path: &str, patterns: Vec<String>) -> Result<()> {
        self.commit(|entries| {
            let entry = find_mut(entries, path)?;
            if entry.patterns == patterns {
                return Ok(((), Effect::Unchanged));
            }
            entry.patterns = patterns;
            Ok(((), Effect::Silent))
        })
    }

    /// Edit one entry's pattern list through `edit`, then store it like
    /// [`EntryStore::set_patterns`].
    ///
    /// `edit` runs on the live entry under the writer lock, so concurrent
    /// edits never overwrite each other; `edit` must not call back into the
    /// store. Nothing is kept if `edit` fails.
    pub fn update_patterns<R>(
        &self,
        path: &str,
        edit: impl FnOnce(&mut Entry) -> Result<R>,
    ) -> Result<R> {
        self.commit(|entries| {
            let entry = find_mut(entries, path)?;
            let before = entry.patterns.clone();
            let value = edit(entry)?;
            let effect = if entry.patterns == before {
                Effect::Unchanged
            } else {
                Effect::Silent
            };
            Ok((value, effect))
        })
    }

    /// Apply `mutate` under the writer lock, persist, then notify.
    ///
    /// On any error the collection is restored to its previous contents.
    /// The writer lock is released before subscribers run, so they may
    /// mutate the store again.
    fn commit<R>(
        &self,
        mutate: impl FnOnce(&mut Vec<Entry>) -> Result<(R, Effect)>,
    ) -> Result<R> {
        let (value, effect) = {
            let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            let mut entries = self.write();
            let before = entries.clone();
            let outcome = mutate(&mut *entries).and_then(|(value, effect)| {
                if effect != Effect::Unchanged {
                    self.persist(&entries[..])?;
                }
                Ok((value, effect))
            });
            match outcome {
                Ok(done) => done,
                Err(e) => {
                    *entries = before;
                    return Err(e);
                }
            }
        };

        if effect == Effect::Notify {
            self.bus.publish(Topic::EntriesChanged);
        }
        Ok(value)
    }

    fn persist(&self, entries: &[Entry]) -> Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };

        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&StoreFileRef { entries })
            .with_context(|| "Serializing entries")?;

        let tmp = file.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, file)?;
        trace!(file = %file.display(), count = entries.len(), "Persisted entries");
        Ok(())
    }
}

fn find_mut<'a>(entries: &'a mut [Entry], path: &str) -> Result<&'a mut Entry> {
    entries
        .iter_mut()
        .find(|e| e.matches_path(path))
        .ok_or_else(|| MuxError::EntryNotFound {
            selector: path.to_string(),
        })
}

/// Read and repair the stored entries.
///
/// Records whose path cannot be normalized are dropped, as are later
/// duplicates of an earlier path.
fn load_entries(file: &Path) -> Result<Vec<Entry>> {
    let text = match fs::read_to_string(file) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Store file missing, starting empty");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let stored: StoreFile = serde_json::from_str(&text)
        .map_err(|e| MuxError::StoreParse(format!("{}: {e}", file.display())))?;

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(stored.entries.len());
    for mut entry in stored.entries {
        if let Err(e) = entry.renormalize() {
            warn!(path = %entry.path(), error = %e, "Dropping stored entry with invalid path");
            continue;
        }
        if !seen.insert(entry.key()) {
            warn!(path = %entry.path(), "Dropping duplicate stored entry");
            continue;
        }
        entries.push(entry);
    }
    Ok(entries)
}
