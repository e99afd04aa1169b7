//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// `name=value` argument without `=`
    #[error("Invalid {flag} argument '{value}': expected NAME=VALUE")]
    InvalidAssignment { flag: &'static str, value: String },

    /// Chunk or recording file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bad `synth --pattern`
    #[error("Invalid pattern segment '{segment}': {message}")]
    Pattern { segment: String, message: String },

    /// Device has no active session and none was named
    #[error("Device '{device}' has no active session; pass --session or --new-session")]
    NoActiveSession { device: String },
}

impl CliError {
    pub fn input_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::InputRead {
            path: path.into(),
            source,
        }
    }

    pub fn pattern(segment: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pattern {
            segment: segment.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
