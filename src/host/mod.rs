//! Host build-configuration subsystem abstraction.
//!
//! The host owns the build profiles and performs the actual load/generate
//! work. Its surface varies between host versions, so everything beyond the
//! load operation is reached through ordered lists of integration strategies
//! (see [`Integrations`]) that are probed at call time; the first strategy
//! that applies wins.

pub mod mock;
mod probe;
pub mod workspace;

pub use probe::{
    Integrations, PresetImporter, Profile, ProfileCollection, ProfileSink, ProfileSource,
    ReloadScheduler, Strategy,
};
pub use workspace::WorkspaceHost;

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::entry::normalize_path;
use crate::error::{MuxError, Result};

/// A resolved, openable build root file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    file: PathBuf,
    normalized: String,
}

impl Target {
    /// Wrap an existing file path.
    pub fn new(file: PathBuf) -> Result<Self> {
        let normalized = normalize_path(&file.to_string_lossy())?;
        Ok(Self { file, normalized })
    }

    /// The file on disk.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Normalized path string, as stored in entries and the tracker.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Directory containing the build root file.
    pub fn root_dir(&self) -> Option<&Path> {
        self.file.parent()
    }
}

/// Maps a stored path to an openable target.
pub trait TargetResolver: Send + Sync {
    /// Resolve `path`, failing with [`MuxError::TargetNotFound`] when there
    /// is no such file.
    fn resolve(&self, path: &str) -> Result<Target>;
}

/// Resolves targets against the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsResolver;

impl TargetResolver for FsResolver {
    #[instrument(skip(self))]
    fn resolve(&self, path: &str) -> Result<Target> {
        let not_found = || MuxError::TargetNotFound {
            path: path.to_string(),
        };
        let normalized = normalize_path(path).map_err(|_| not_found())?;
        let file = PathBuf::from(&normalized);
        if !file.is_file() {
            debug!(path, "Target is not a file");
            return Err(not_found());
        }
        Target::new(file)
    }
}

/// The host's build-configuration subsystem.
pub trait BuildHost: Send + Sync {
    /// Short host name for logs.
    fn name(&self) -> &str;

    /// True if the host exposes a "load build root" operation.
    fn supports_load(&self) -> bool;

    /// Ask the host to load `target` as its build root. The host may finish
    /// the load asynchronously.
    fn load_build_root(&self, target: &Target) -> Result<()>;

    /// The build root the host currently has loaded, if it can tell.
    fn loaded_build_root(&self) -> Result<Option<PathBuf>>;

    /// Profile integrations, in probe order.
    fn integrations(&self) -> Integrations;
}
