//! Store error types

use std::path::PathBuf;

use contracts::ContractError;
use thiserror::Error;

/// Storage backend failures
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure
    #[error("{operation} failed on '{}': {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record (de)serialization failure
    #[error("{operation} failed to encode/decode: {source}")]
    Serde {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Ledger line that cannot be parsed
    #[error("corrupt ledger '{}' at line {line}: {message}", path.display())]
    Corrupt {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Failure injected by a test or wrapper store
    #[error("{operation} unavailable: {message}")]
    Unavailable {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub fn serde(operation: &'static str, source: serde_json::Error) -> Self {
        Self::Serde { operation, source }
    }

    pub fn unavailable(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            message: message.into(),
        }
    }

    /// Operation label carried into [`ContractError::Storage`]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Io { operation, .. }
            | Self::Serde { operation, .. }
            | Self::Unavailable { operation, .. } => operation,
            Self::Corrupt { .. } => "session_totals",
        }
    }
}

impl From<StoreError> for ContractError {
    fn from(err: StoreError) -> Self {
        ContractError::storage(err.operation(), err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
