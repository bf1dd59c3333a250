//! Configuration for CMake Mux sessions.
//!
//! Values come from, in increasing precedence: built-in defaults, a TOML
//! file (`$CMUX_CONFIG`, else `<config_dir>/cmux/config.toml`), and CLI
//! flags applied by the caller.
//!
//! ```toml
//! settle_delay_ms = 100
//! detect_retries = 5
//! detect_interval_ms = 200
//! quick_pick_limit = 9
//! state_dir = ".cmux"
//! ```

mod path;

pub use path::{default_config_file, home_dir, resolve_path};

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::detect::DetectPolicy;
use crate::error::{MuxError, Result};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CMUX_CONFIG";

/// State directory name inside a workspace.
pub const DEFAULT_STATE_DIR: &str = ".cmux";

/// Tunables for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MuxConfig {
    /// Delay between the host load request and the profile pass.
    pub settle_delay_ms: u64,
    /// Auto-detection attempts after the first.
    pub detect_retries: u32,
    pub detect_interval_ms: u64,
    /// Entries offered by the quick-pick.
    pub quick_pick_limit: usize,
    /// State directory; relative paths are taken from the workspace.
    pub state_dir: Option<PathBuf>,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 100,
            detect_retries: 5,
            detect_interval_ms: 200,
            quick_pick_limit: crate::pick::DEFAULT_LIMIT,
            state_dir: None,
        }
    }
}

impl MuxConfig {
    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        match config_file(std::env::var_os(CONFIG_ENV)) {
            Some(file) => Self::load_from(&file),
            None => Ok(Self::default()),
        }
    }

    /// Load from `file`. A missing file yields defaults.
    #[instrument(fields(file = %file.display()))]
    pub fn load_from(file: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(file) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config = Self::parse(&text).map_err(|e| match e {
            MuxError::ConfigParse(reason) => {
                MuxError::ConfigParse(format!("{}: {reason}", file.display()))
            }
            other => other,
        })?;
        debug!(?config, "Loaded config");
        Ok(config)
    }

    /// Parse TOML text and validate it.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| MuxError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.quick_pick_limit == 0 {
            return Err(MuxError::ConfigParse(
                "quick_pick_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn detect_policy(&self) -> DetectPolicy {
        DetectPolicy {
            retries: self.detect_retries,
            interval: Duration::from_millis(self.detect_interval_ms),
        }
    }

    /// State directory for `workspace`.
    pub fn state_dir_for(&self, workspace: &Path) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => resolve_path(dir, workspace),
            None => Ok(workspace.join(DEFAULT_STATE_DIR)),
        }
    }
}

/// Config file to read: the env override, else the platform default.
fn config_file(env_override: Option<OsString>) -> Option<PathBuf> {
    env_override
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(default_config_file)
}
