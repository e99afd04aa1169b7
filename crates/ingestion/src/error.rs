//! Ingestion error types

use contracts::ContractError;
use thiserror::Error;

/// Chunk decode error
///
/// Raised before any session state is touched. Truncated trailing bytes are
/// not an error.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Chunk carried no sample payload
    #[error("chunk from device {device_id} has no sample payload")]
    MissingPayload {
        /// Device ID
        device_id: String,
    },

    /// Transport encoding could not be decoded
    #[error("invalid payload encoding from device {device_id}: {message}")]
    InvalidEncoding {
        /// Device ID
        device_id: String,
        /// Decoder message
        message: String,
    },
}

impl IngestionError {
    pub fn device_id(&self) -> &str {
        match self {
            Self::MissingPayload { device_id } | Self::InvalidEncoding { device_id, .. } => {
                device_id
            }
        }
    }
}

impl From<IngestionError> for ContractError {
    fn from(err: IngestionError) -> Self {
        ContractError::payload_decode(err.device_id().to_string(), err.to_string())
    }
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
