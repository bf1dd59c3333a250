//! Test fixture helpers for creating temporary workspaces.
//!
//! A workspace holds CMake projects (each a directory with a
//! `CMakeLists.txt`), optional preset files, and the `.cmux` state
//! directory. Everything is removed when the fixture is dropped.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;

/// A temporary workspace directory.
///
/// # Example
///
/// ```ignore
/// let ws = TestWorkspace::new();
/// let root = ws.project("app");
/// ws.presets("app", &["debug", "release"]);
/// ```
pub struct TestWorkspace {
    /// The temporary directory.
    pub dir: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    /// Create an empty workspace.
    ///
    /// # Panics
    ///
    /// Panics if the directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Root of the workspace.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Default state directory.
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.path().join(".cmux")
    }

    /// Create `<name>/CMakeLists.txt` and return its path.
    ///
    /// # Panics
    ///
    /// Panics if the files cannot be written.
    #[must_use]
    pub fn project(&self, name: &str) -> PathBuf {
        let dir = self.path().join(name);
        fs::create_dir_all(&dir).expect("Failed to create project dir");
        let file = dir.join("CMakeLists.txt");
        fs::write(&file, format!("cmake_minimum_required(VERSION 3.20)\nproject({name})\n"))
            .expect("Failed to write CMakeLists.txt");
        file
    }

    /// Same as [`TestWorkspace::project`], as a string.
    #[must_use]
    pub fn project_str(&self, name: &str) -> String {
        self.project(name).to_string_lossy().into_owned()
    }

    /// Write `CMakePresets.json` with the given configure presets.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn presets(&self, project: &str, names: &[&str]) {
        let presets: Vec<Value> = names
            .iter()
            .map(|name| serde_json::json!({ "name": name, "generator": "Ninja" }))
            .collect();
        let doc = serde_json::json!({ "version": 3, "configurePresets": presets });
        let file = self.path().join(project).join("CMakePresets.json");
        fs::write(file, serde_json::to_string_pretty(&doc).unwrap())
            .expect("Failed to write presets");
    }

    /// Write the host document.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be written.
    pub fn write_host(&self, doc: &Value) {
        fs::create_dir_all(self.state_dir()).expect("Failed to create state dir");
        fs::write(
            self.state_dir().join("host.json"),
            serde_json::to_string_pretty(doc).unwrap(),
        )
        .expect("Failed to write host.json");
    }

    /// Host document with the given `(name, enabled)` profiles.
    pub fn host_with_profiles(&self, profiles: &[(&str, bool)]) {
        let list: Vec<Value> = profiles
            .iter()
            .map(|(name, enabled)| serde_json::json!({ "name": name, "enabled": enabled }))
            .collect();
        self.write_host(&serde_json::json!({ "profiles": list }));
    }

    /// Read the host document.
    ///
    /// # Panics
    ///
    /// Panics if the file is missing or not JSON.
    #[must_use]
    pub fn read_host(&self) -> Value {
        read_json(&self.state_dir().join("host.json"))
    }

    /// Read the entry store file.
    ///
    /// # Panics
    ///
    /// Panics if the file is missing or not JSON.
    #[must_use]
    pub fn read_entries(&self) -> Value {
        read_json(&self.state_dir().join("entries.json"))
    }

    /// Names of enabled profiles in the host document's top-level list.
    #[must_use]
    pub fn enabled_profiles(&self) -> Vec<String> {
        self.read_host()["profiles"]
            .as_array()
            .into_iter()
            .flatten()
            .filter(|p| p["enabled"].as_bool() == Some(true))
            .filter_map(|p| p["name"].as_str().map(str::to_string))
            .collect()
    }
}

fn read_json(path: &Path) -> Value {
    let text = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
    serde_json::from_str(&text)
        .unwrap_or_else(|e| panic!("Invalid JSON in {}: {e}", path.display()))
}
