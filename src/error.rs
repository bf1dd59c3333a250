//! Error types for CMake Mux operations.

use thiserror::Error;

/// Primary error type for CMake Mux operations.
#[derive(Error, Debug)]
pub enum MuxError {
    // Store errors
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("No entry matches '{selector}'")]
    EntryNotFound { selector: String },

    #[error("Entry store is corrupt: {0}")]
    StoreParse(String),

    // Activation errors
    #[error("Cannot locate file: {path}")]
    TargetNotFound { path: String },

    #[error("Host capability unavailable: {capability}")]
    HostCapabilityMissing { capability: String },

    // Pattern errors
    #[error("Invalid pattern '{pattern}': {reason}")]
    PatternCompile { pattern: String, reason: String },

    // Configuration errors
    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl MuxError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for a missing host integration point.
    pub fn capability(capability: impl Into<String>) -> Self {
        Self::HostCapabilityMissing {
            capability: capability.into(),
        }
    }

    /// Returns true if the error is recoverable by the user.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::EntryNotFound { .. }
                | Self::TargetNotFound { .. }
                | Self::PatternCompile { .. }
                | Self::ConfigParse(_)
        )
    }

    /// Returns a suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::EntryNotFound { .. } => Some("Run: cmux list"),
            Self::TargetNotFound { .. } => {
                Some("The file was moved or deleted; remove the entry or add it again")
            }
            Self::HostCapabilityMissing { .. } => {
                Some("Check that the host state directory is writable")
            }
            Self::StoreParse(_) => Some("Fix or delete the entries.json file in the state directory"),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using MuxError.
pub type Result<T> = std::result::Result<T, MuxError>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| MuxError::Other(format!("{}: {e}", f().into())))
    }
}
