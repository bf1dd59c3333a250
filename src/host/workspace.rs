//! File-backed host adapter.
//!
//! The host state lives in a JSON document (`host.json` in the state
//! directory). Different writers of that document have used different
//! shapes for the profile list, so reads and write-backs probe them in
//! order:
//!
//! | Strategy | Location | Name keys | Flag keys |
//! |----------|----------|-----------|-----------|
//! | `profiles` | `/profiles` | `name`, `displayName` | `enabled`, `active` |
//! | `configurations` | `/configurations` | same | same |
//! | `state.profiles` | `/state/profiles` | same | same |
//! | `state.configurations` | `/state/configurations` | same | same |
//!
//! Preset import reads `configurePresets` from `CMakePresets.json` and
//! `CMakeUserPresets.json` next to the loaded build root.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, trace};

use super::probe::{
    Integrations, PresetImporter, Profile, ProfileSink, ProfileSource, ReloadScheduler, Strategy,
};
use super::{BuildHost, Target};
use crate::entry::BUILD_ROOT_FILE;
use crate::error::{MuxError, Result, ResultExt};

/// Name of the host document inside the state directory.
pub const HOST_FILE_NAME: &str = "host.json";

const LOADED_ROOT: &str = "loadedRoot";
const LOADED_AT: &str = "loadedAt";
const RELOAD_REQUESTED_AT: &str = "reloadRequestedAt";

const PRESET_FILES: [&str; 2] = ["CMakePresets.json", "CMakeUserPresets.json"];

/// Profile list locations, in probe order.
const SHAPES: [(&str, &str); 4] = [
    ("profiles", "/profiles"),
    ("configurations", "/configurations"),
    ("state.profiles", "/state/profiles"),
    ("state.configurations", "/state/configurations"),
];

/// Serialized access to the host document.
#[derive(Debug)]
struct HostDocument {
    file: PathBuf,
    lock: Mutex<()>,
}

impl HostDocument {
    fn read_unlocked(&self) -> Result<Value> {
        match fs::read_to_string(&self.file) {
            Ok(text) if text.trim().is_empty() => Ok(Value::Object(Map::new())),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| MuxError::Other(format!("{}: {e}", self.file.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Value::Object(Map::new())),
            Err(e) => Err(e.into()),
        }
    }

    fn read(&self) -> Result<Value> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_unlocked()
    }

    /// Read, modify and write back atomically. `edit` returning `None`
    /// leaves the file untouched.
    fn update<R>(&self, edit: impl FnOnce(&mut Value) -> Result<Option<R>>) -> Result<Option<R>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut doc = self.read_unlocked()?;
        let Some(value) = edit(&mut doc)? else {
            return Ok(None);
        };

        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&doc).with_context(|| "Serializing host state")?;
        let tmp = self.file.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.file)?;
        trace!(file = %self.file.display(), "Host document written");
        Ok(Some(value))
    }
}

/// Host adapter over a JSON document in the state directory.
#[derive(Debug, Clone)]
pub struct WorkspaceHost {
    doc: Arc<HostDocument>,
}

impl WorkspaceHost {
    /// Host backed by `<state_dir>/host.json`.
    pub fn new(state_dir: &Path) -> Self {
        Self::with_file(state_dir.join(HOST_FILE_NAME))
    }

    /// Host backed by an explicit document path.
    pub fn with_file(file: PathBuf) -> Self {
        Self {
            doc: Arc::new(HostDocument {
                file,
                lock: Mutex::new(()),
            }),
        }
    }

    /// Path of the host document.
    pub fn file(&self) -> &Path {
        &self.doc.file
    }
}

impl BuildHost for WorkspaceHost {
    fn name(&self) -> &str {
        "workspace"
    }

    fn supports_load(&self) -> bool {
        true
    }

    #[instrument(skip(self), fields(target = %target.normalized()))]
    fn load_build_root(&self, target: &Target) -> Result<()> {
        self.doc.update(|doc| {
            let obj = as_object(doc)?;
            obj.insert(LOADED_ROOT.into(), json!(target.normalized()));
            obj.insert(LOADED_AT.into(), json!(Utc::now().to_rfc3339()));
            Ok(Some(()))
        })?;
        info!("Build root loaded");
        Ok(())
    }

    fn loaded_build_root(&self) -> Result<Option<PathBuf>> {
        let doc = self.doc.read()?;
        let Some(root) = doc.get(LOADED_ROOT).and_then(Value::as_str) else {
            return Ok(None);
        };
        // Report the build root file of the loaded project directory, and
        // only if it still exists.
        let candidate = Path::new(root)
            .parent()
            .map(|dir| dir.join(BUILD_ROOT_FILE))
            .filter(|file| file.is_file());
        Ok(candidate)
    }

    fn integrations(&self) -> Integrations {
        let shape_sources = SHAPES.iter().map(|&(name, pointer)| {
            Box::new(ShapeStrategy {
                name,
                pointer,
                doc: Arc::clone(&self.doc),
            }) as Box<dyn ProfileSource>
        });
        let shape_sinks = SHAPES.iter().map(|&(name, pointer)| {
            Box::new(ShapeStrategy {
                name,
                pointer,
                doc: Arc::clone(&self.doc),
            }) as Box<dyn ProfileSink>
        });

        Integrations {
            importers: vec![Box::new(PresetFileImporter {
                doc: Arc::clone(&self.doc),
            })],
            sources: shape_sources.collect(),
            sinks: shape_sinks.collect(),
            reloaders: vec![Box::new(DocumentReloader {
                doc: Arc::clone(&self.doc),
            })],
        }
    }
}

fn as_object(doc: &mut Value) -> Result<&mut Map<String, Value>> {
    doc.as_object_mut()
        .ok_or_else(|| MuxError::Other("host document is not a JSON object".into()))
}

/// One profile-list location in the document.
struct ShapeStrategy {
    name: &'static str,
    pointer: &'static str,
    doc: Arc<HostDocument>,
}

impl Strategy for ShapeStrategy {
    fn name(&self) -> &'static str {
        self.name
    }
}

impl ProfileSource for ShapeStrategy {
    fn fetch(&self) -> Result<Option<Vec<Profile>>> {
        let doc = self.doc.read()?;
        let Some(items) = doc.pointer(self.pointer).and_then(Value::as_array) else {
            return Ok(None);
        };
        Ok(Some(items.iter().map(read_profile).collect()))
    }
}

impl ProfileSink for ShapeStrategy {
    fn store(&self, profiles: &[Profile]) -> Result<bool> {
        let stored = self.doc.update(|doc| {
            let Some(items) = doc.pointer_mut(self.pointer).and_then(Value::as_array_mut) else {
                return Ok(None);
            };
            if items.len() != profiles.len() {
                return Err(MuxError::Other(format!(
                    "profile list at {} changed size ({} != {})",
                    self.pointer,
                    items.len(),
                    profiles.len()
                )));
            }
            for (item, profile) in items.iter_mut().zip(profiles) {
                write_flag(item, profile.enabled);
            }
            Ok(Some(()))
        })?;
        Ok(stored.is_some())
    }
}

fn read_profile(item: &Value) -> Profile {
    let text = |key: &str| item.get(key).and_then(Value::as_str).map(str::to_string);
    let flag = item
        .get("enabled")
        .and_then(Value::as_bool)
        .or_else(|| item.get("active").and_then(Value::as_bool));
    Profile {
        name: text("name"),
        display_name: text("displayName"),
        enabled: flag,
    }
}

/// Write the flag back under the key the record already uses.
fn write_flag(item: &mut Value, enabled: Option<bool>) {
    let (Some(obj), Some(enabled)) = (item.as_object_mut(), enabled) else {
        return;
    };
    let key = if !obj.contains_key("enabled") && obj.contains_key("active") {
        "active"
    } else {
        "enabled"
    };
    obj.insert(key.into(), Value::Bool(enabled));
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresetFile {
    #[serde(default)]
    configure_presets: Vec<ConfigurePreset>,
}

#[derive(Debug, Deserialize)]
struct ConfigurePreset {
    name: String,
    #[serde(default)]
    hidden: bool,
}

/// Imports configure presets next to the loaded root as disabled profiles.
struct PresetFileImporter {
    doc: Arc<HostDocument>,
}

impl Strategy for PresetFileImporter {
    fn name(&self) -> &'static str {
        "preset-files"
    }
}

impl PresetImporter for PresetFileImporter {
    fn import_presets(&self) -> Result<Option<usize>> {
        let added = self.doc.update(|doc| {
            let Some(root_dir) = doc
                .get(LOADED_ROOT)
                .and_then(Value::as_str)
                .and_then(|root| Path::new(root).parent().map(Path::to_path_buf))
            else {
                return Ok(None);
            };

            let names = read_preset_names(&root_dir)?;
            if names.is_empty() {
                return Ok(None);
            }

            let pointer = SHAPES
                .iter()
                .map(|&(_, pointer)| pointer)
                .find(|pointer| doc.pointer(pointer).is_some_and(Value::is_array))
                .unwrap_or("/profiles");
            if doc.pointer(pointer).is_none() {
                as_object(doc)?.insert("profiles".into(), Value::Array(Vec::new()));
            }
            let Some(items) = doc.pointer_mut(pointer).and_then(Value::as_array_mut) else {
                return Ok(None);
            };

            let mut added = 0usize;
            for name in names {
                let known = items
                    .iter()
                    .any(|item| read_profile(item).resolved_name() == Some(name.as_str()));
                if !known {
                    items.push(json!({ "name": name, "enabled": false }));
                    added += 1;
                }
            }
            debug!(added, "Imported presets");
            Ok(Some(added))
        })?;
        Ok(added)
    }
}

fn read_preset_names(root_dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for file_name in PRESET_FILES {
        let path = root_dir.join(file_name);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        let presets: PresetFile = serde_json::from_str(&text)
            .map_err(|e| MuxError::Other(format!("{}: {e}", path.display())))?;
        for preset in presets.configure_presets {
            if !preset.hidden && !names.contains(&preset.name) {
                names.push(preset.name);
            }
        }
    }
    Ok(names)
}

/// Records a reload request in the document.
struct DocumentReloader {
    doc: Arc<HostDocument>,
}

impl Strategy for DocumentReloader {
    fn name(&self) -> &'static str {
        "document"
    }
}

impl ReloadScheduler for DocumentReloader {
    fn schedule_reload(&self) -> Result<bool> {
        let done = self.doc.update(|doc| {
            as_object(doc)?.insert(RELOAD_REQUESTED_AT.into(), json!(Utc::now().to_rfc3339()));
            Ok(Some(()))
        })?;
        Ok(done.is_some())
    }
}
