//! Step engine errors

use contracts::ContractError;
use ingestion::IngestionError;
use thiserror::Error;

/// Chunk / session operation failure
#[derive(Debug, Error)]
pub enum EngineError {
    /// Payload absent or undecodable; nothing was mutated
    #[error(transparent)]
    Decode(#[from] IngestionError),

    /// Session precondition, invalid params or storage failure
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl EngineError {
    /// Failure the caller must fix before resending
    pub fn is_precondition(&self) -> bool {
        match self {
            Self::Decode(_) => true,
            Self::Contract(e) => e.is_precondition(),
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Contract(ContractError::Storage { .. }))
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode_error",
            Self::Contract(ContractError::MissingSession { .. })
            | Self::Contract(ContractError::UnknownSession { .. }) => "session_error",
            Self::Contract(ContractError::ConfigValidation { .. }) => "invalid_params",
            Self::Contract(ContractError::Storage { .. }) | Self::Contract(ContractError::Io(_)) => {
                "storage_error"
            }
            Self::Contract(_) => "error",
        }
    }
}

impl From<EngineError> for ContractError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Decode(e) => e.into(),
            EngineError::Contract(e) => e,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
