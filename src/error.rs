//! Error types shared across the runner.

use std::path::PathBuf;
use thiserror::Error;

/// A browser action that did not succeed.
///
/// The display text is exactly the message of the FAILED step that was
/// logged for the action, so a caller can match the two.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ActionFailure {
    pub message: String,
}

impl ActionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Runner-level failures that are not tied to a single action.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// No config file was found walking up from the start directory.
    #[error("lumi-acceptance.json not found (searched upwards from {})", searched_from.display())]
    ConfigNotFound { searched_from: PathBuf },

    /// The config file exists but is unreadable, corrupt, or misses a field.
    #[error("invalid config: {0}")]
    Config(String),

    /// Device name that is not part of the supported profile table.
    #[error("unknown device profile: {0}")]
    UnknownDevice(String),

    /// A suite named in the queue could not be loaded.
    #[error("failed to load suite '{name}': {reason}")]
    Suite { name: String, reason: String },

    /// One-time password secret missing or unusable.
    #[error("one-time password error: {0}")]
    Otp(String),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
