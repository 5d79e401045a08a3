//! Error types for swm-qc
//!
//! Detection paths absorb storage errors and log them; mutation paths surface
//! them wrapped in [`QcError::Consolidation`]. Malformed values handed to the
//! classifier are never errors.

use thiserror::Error;

/// Result alias for engine operations
pub type QcResult<T> = std::result::Result<T, QcError>;

#[derive(Debug, Error)]
pub enum QcError {
    /// No worst-case direction rule exists for this parameter
    #[error("Unknown parameter kind: no worst-case rule for parameter '{0}'")]
    UnknownParameterKind(String),

    /// Connection or query failure
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// swm-common error (database setup, configuration)
    #[error("{0}")]
    Common(#[from] swm_common::Error),

    /// Field-work log could not be interpreted
    #[error("Field log error: {0}")]
    FieldLog(String),

    /// Consolidation run failed and was rolled back
    #[error("Failed to consolidate replicate samples: {0}")]
    Consolidation(#[source] Box<QcError>),
}

impl QcError {
    /// Wrap a mid-run failure as a consolidation failure
    pub fn consolidation(cause: QcError) -> Self {
        match cause {
            already @ QcError::Consolidation(_) => already,
            other => QcError::Consolidation(Box::new(other)),
        }
    }
}
