//! Error types for engine operations.

use crate::id::EntityId;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by a backing engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine has no current session to hand out.
    #[error("no current session available")]
    NoSession,

    /// The session exists but is not connected.
    #[error("session is not connected")]
    NotConnected,

    /// A lazily loaded reference has no backing row.
    #[error("no row for {entity} with id {id}")]
    ObjectNotFound {
        /// Entity name.
        entity: String,
        /// Identity that was looked up.
        id: EntityId,
    },

    /// The entity name is not mapped by the engine.
    #[error("unknown entity: {name}")]
    UnknownEntity {
        /// Entity name.
        name: String,
    },

    /// A persist collided with an existing row.
    #[error("duplicate key for {entity} with id {id}")]
    DuplicateKey {
        /// Entity name.
        entity: String,
        /// Colliding identity.
        id: EntityId,
    },

    /// The operation requires an active backend transaction.
    #[error("no active transaction")]
    TransactionNotActive,

    /// A transaction is already open on the session.
    #[error("transaction already active")]
    TransactionAlreadyActive,

    /// The cursor is not positioned on a row.
    #[error("cursor has no current row")]
    NoCurrentRow,

    /// A row could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// A fault injected for testing fired.
    #[error("injected fault at {point}")]
    Injected {
        /// Where the fault fired.
        point: String,
    },
}

impl EngineError {
    /// Creates an object-not-found error.
    pub fn object_not_found(entity: impl Into<String>, id: EntityId) -> Self {
        Self::ObjectNotFound {
            entity: entity.into(),
            id,
        }
    }

    /// Creates an unknown-entity error.
    pub fn unknown_entity(name: impl Into<String>) -> Self {
        Self::UnknownEntity { name: name.into() }
    }

    /// Creates a codec error.
    pub fn codec(message: impl ToString) -> Self {
        Self::Codec(message.to_string())
    }

    /// Returns true if the error only reports a missing row.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_classified() {
        let err = EngineError::object_not_found("book", EntityId::new());
        assert!(err.is_not_found());
        assert!(!EngineError::NoSession.is_not_found());
    }

    #[test]
    fn display_includes_entity() {
        let err = EngineError::unknown_entity("author");
        assert_eq!(err.to_string(), "unknown entity: author");
    }
}
