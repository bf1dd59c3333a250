//! Path resolution for configuration values.
//!
//! Supports absolute paths, paths relative to a base directory, and "~" home
//! directory expansion.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{MuxError, Result};

/// Resolve a configured path.
///
/// Resolution rules:
/// 1. Paths starting with `~`: expanded to home directory
/// 2. Absolute paths: used as-is
/// 3. Relative paths: resolved against `base`
pub fn resolve_path(path: &Path, base: &Path) -> Result<PathBuf> {
    trace!(path = %path.display(), base = %base.display(), "Resolving path");

    let path_str = path.to_string_lossy();

    if path_str == "~" || path_str.starts_with("~/") {
        let home = home_dir()?;
        let rest = path_str.strip_prefix("~/").unwrap_or("");
        let resolved = if rest.is_empty() { home } else { home.join(rest) };
        debug!(
            original = %path.display(),
            resolved = %resolved.display(),
            "Expanded home directory path"
        );
        return Ok(resolved);
    }

    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    Ok(base.join(path))
}

/// The user's home directory.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| MuxError::ConfigParse("Could not determine home directory".to_string()))
}

/// Default location of the configuration file, if the platform has one.
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cmux").join("config.toml"))
}
