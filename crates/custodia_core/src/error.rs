//! Error types for Custodia core.

use custodia_engine::EngineError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Custodia core operations.
///
/// Expected misses (an unknown identity, a type without a default
/// constructor) are not errors; they surface as `Ok(None)`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Backend failure while acquiring a session, loading, flushing or
    /// committing. Engine errors never cross this layer unwrapped.
    #[error("transaction error: {0}")]
    Transaction(#[from] EngineError),

    /// A transaction was closed while still active. The backend
    /// transaction has already been rolled back when this is returned.
    #[error("invalid resource state: {message}")]
    ResourceState {
        /// Description of the state violation.
        message: String,
    },

    /// A result stream was traversed more than once.
    #[error("result stream over {entity} was already traversed")]
    ConcurrentUse {
        /// Entity the stream reads.
        entity: String,
    },

    /// The backend cursor produced a null row.
    #[error("null row in result stream over {entity}")]
    NullRow {
        /// Entity the stream reads.
        entity: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a resource state error.
    pub fn resource_state(message: impl Into<String>) -> Self {
        Self::ResourceState {
            message: message.into(),
        }
    }

    /// Creates a concurrent use error.
    pub fn concurrent_use(entity: impl Into<String>) -> Self {
        Self::ConcurrentUse {
            entity: entity.into(),
        }
    }

    /// Creates a null row error.
    pub fn null_row(entity: impl Into<String>) -> Self {
        Self::NullRow {
            entity: entity.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns the wrapped engine error, if any.
    #[must_use]
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            Self::Transaction(e) => Some(e),
            _ => None,
        }
    }
}
