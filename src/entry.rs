//! Registered build roots.
//!
//! An [`Entry`] pins one `CMakeLists.txt` under a nickname together with the
//! ordered list of patterns used to pick profiles when it is activated.
//! Identity is the normalized path: two entries with the same normalized
//! path are the same entry regardless of nickname or patterns.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::trace;

use crate::error::{MuxError, Result};

/// File name that marks a CMake build root.
pub const BUILD_ROOT_FILE: &str = "CMakeLists.txt";

/// Nickname used when the build root has no parent directory name.
const FALLBACK_NICKNAME: &str = "CMakeLists";

/// A registered build root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Display label, not required to be unique.
    #[serde(default)]
    pub nickname: String,
    path: String,
    /// Profile-selection patterns, in insertion order.
    #[serde(default, alias = "regexps", deserialize_with = "null_as_empty")]
    pub patterns: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Entry {
    /// Create an entry with no patterns.
    pub fn new(nickname: impl Into<String>, path: &str) -> Result<Self> {
        Ok(Self {
            nickname: nickname.into(),
            path: normalize_path(path)?,
            patterns: Vec::new(),
        })
    }

    /// Create an entry with an initial pattern list.
    pub fn with_patterns(
        nickname: impl Into<String>,
        path: &str,
        patterns: Vec<String>,
    ) -> Result<Self> {
        let mut entry = Self::new(nickname, path)?;
        entry.patterns = patterns;
        Ok(entry)
    }

    /// The normalized absolute path of the build root file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Key used for identity comparisons.
    pub fn key(&self) -> String {
        path_key(&self.path)
    }

    /// True if `path` names this entry.
    pub fn matches_path(&self, path: &str) -> bool {
        paths_equal(&self.path, path)
    }

    /// Nickname, or the path when the nickname is blank.
    pub fn title(&self) -> &str {
        if self.nickname.trim().is_empty() {
            &self.path
        } else {
            &self.nickname
        }
    }

    /// Re-normalize a path read from storage.
    pub(crate) fn renormalize(&mut self) -> Result<()> {
        self.path = normalize_path(&self.path)?;
        Ok(())
    }

    /// Append a pattern.
    pub fn add_pattern(&mut self, pattern: &str) -> Result<()> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(MuxError::validation("pattern is empty"));
        }
        self.patterns.push(pattern.to_string());
        Ok(())
    }

    /// Replace the pattern at `index`.
    pub fn edit_pattern(&mut self, index: usize, pattern: &str) -> Result<()> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(MuxError::validation("pattern is empty"));
        }
        let slot = self.patterns.get_mut(index).ok_or_else(|| {
            MuxError::validation(format!("no pattern at position {}", index + 1))
        })?;
        *slot = pattern.to_string();
        Ok(())
    }

    /// Remove and return the pattern at `index`.
    pub fn remove_pattern(&mut self, index: usize) -> Result<String> {
        if index >= self.patterns.len() {
            return Err(MuxError::validation(format!(
                "no pattern at position {}",
                index + 1
            )));
        }
        Ok(self.patterns.remove(index))
    }

    /// Move the pattern at `index` by one step. Returns false when the move
    /// would leave the list bounds.
    pub fn move_pattern(&mut self, index: usize, delta: Move) -> bool {
        move_item(&mut self.patterns, index, delta)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Entry {}

impl Hash for Entry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// Direction of a one-step reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Up,
    Down,
}

/// Swap `items[index]` with its neighbour in `delta` direction.
pub(crate) fn move_item<T>(items: &mut [T], index: usize, delta: Move) -> bool {
    let target = match delta {
        Move::Up => index.checked_sub(1),
        Move::Down => index.checked_add(1),
    };
    match target {
        Some(target) if index < items.len() && target < items.len() => {
            items.swap(index, target);
            true
        }
        _ => false,
    }
}

/// Normalize a build-root path.
///
/// Separators become `/`, `.` and `..` segments are resolved lexically,
/// duplicate and trailing separators are dropped, and Windows drive letters
/// are upper-cased. The path must be absolute.
pub fn normalize_path(raw: &str) -> Result<String> {
    let unified = raw.trim().replace('\\', "/");
    if unified.is_empty() {
        return Err(MuxError::validation("path is empty"));
    }

    let (prefix, rest) = if let Some(rest) = unified.strip_prefix('/') {
        ("/".to_string(), rest)
    } else if is_drive_prefix(&unified) {
        let drive = unified[..1].to_ascii_uppercase();
        (format!("{drive}:/"), &unified[3..])
    } else {
        return Err(MuxError::validation(format!(
            "path must be absolute: {raw}"
        )));
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let normalized = format!("{prefix}{}", segments.join("/"));
    trace!(raw, normalized = %normalized, "Normalized path");
    Ok(normalized)
}

fn is_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}

/// Comparison key for a normalized path. Case is folded on platforms whose
/// default filesystems are case-insensitive.
pub fn path_key(normalized: &str) -> String {
    if cfg!(any(windows, target_os = "macos")) {
        normalized.to_lowercase()
    } else {
        normalized.to_string()
    }
}

/// Compare two paths after normalization. Unnormalizable paths never match.
pub fn paths_equal(a: &str, b: &str) -> bool {
    match (normalize_path(a), normalize_path(b)) {
        (Ok(a), Ok(b)) => path_key(&a) == path_key(&b),
        _ => false,
    }
}

/// Default nickname for a build root: its parent directory name.
pub fn default_nickname(path: &str) -> String {
    normalize_path(path)
        .ok()
        .and_then(|p| {
            let mut parts = p.rsplit('/');
            parts.next();
            parts
                .next()
                .filter(|dir| !dir.is_empty() && !dir.ends_with(':'))
                .map(str::to_string)
        })
        .unwrap_or_else(|| FALLBACK_NICKNAME.to_string())
}

/// True if the file name is `CMakeLists.txt`.
pub fn is_build_root_file(path: &str) -> bool {
    path.replace('\\', "/")
        .rsplit('/')
        .next()
        .is_some_and(|name| name == BUILD_ROOT_FILE)
}
