//! Layered error definitions
//!
//! Categorized by source: config / session / storage / payload

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Session Errors =====
    /// No active session and the caller did not ask for a new one
    #[error(
        "no active session for device '{device_id}'; resend the chunk with start-session intent"
    )]
    MissingSession { device_id: String },

    /// Explicit session id that the registry does not know
    #[error("unknown session '{session_id}' for device '{device_id}'")]
    UnknownSession {
        device_id: String,
        session_id: String,
    },

    // ===== Payload Errors =====
    /// Sample payload absent or not decodable
    #[error("payload decode error for device '{device_id}': {message}")]
    PayloadDecode { device_id: String, message: String },

    // ===== Storage Errors =====
    /// Storage collaborator read/write failure
    #[error("storage error during {operation}: {message}")]
    Storage { operation: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing_session(device_id: impl Into<String>) -> Self {
        Self::MissingSession {
            device_id: device_id.into(),
        }
    }

    pub fn unknown_session(device_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::UnknownSession {
            device_id: device_id.into(),
            session_id: session_id.into(),
        }
    }

    pub fn payload_decode(device_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PayloadDecode {
            device_id: device_id.into(),
            message: message.into(),
        }
    }

    /// Create storage error
    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Caller-side precondition failures (not retryable without changing the request)
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::MissingSession { .. } | Self::UnknownSession { .. } | Self::PayloadDecode { .. }
        )
    }
}
