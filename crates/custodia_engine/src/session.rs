//! Backing engine contract.
//!
//! The data-access layer never talks to storage directly. It drives an
//! [`Engine`] that hands out [`Session`]s, and a session owns one backend
//! transaction, a persistence context, and the cursors it opens.
//!
//! # Invariants
//!
//! - A session is used by exactly one transaction at a time
//! - `persist` / `save_or_update` / `delete` only register intent; nothing
//!   reaches the backend transaction before `flush`
//! - `load` may return a reference without touching storage; existence is
//!   only checked by `initialize`
//! - Cursors are forward-only and positioned before the first row

use crate::error::EngineResult;
use crate::id::EntityId;
use std::fmt;
use std::sync::Arc;

/// A stored row.
///
/// Rows are CBOR values; entities map to them through serde.
pub type Row = ciborium::Value;

/// Status of the backend transaction owned by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// No transaction was started.
    NotActive,
    /// A transaction is open.
    Active,
    /// The transaction committed.
    Committed,
    /// The transaction rolled back.
    RolledBack,
}

impl TransactionStatus {
    /// Returns true for `Committed` and `RolledBack`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

/// An object the engine knows how to store.
pub trait Persistable: Send + Sync {
    /// Name of the entity table the object belongs to.
    fn entity_name(&self) -> &str;

    /// Identity of the object.
    fn entity_id(&self) -> EntityId;

    /// Snapshot of the object's current state as a row.
    fn to_row(&self) -> EngineResult<Row>;
}

/// A backend-specific filter fragment.
///
/// Fragments compose into a tree; the engine decides how to execute it.
pub trait Predicate: Clone + fmt::Debug + Send + Sync {
    /// Conjunction of `self` and `other`.
    #[must_use]
    fn and(self, other: Self) -> Self;

    /// Disjunction of `self` and `other`.
    #[must_use]
    fn or(self, other: Self) -> Self;
}

/// A forward-only cursor over rows.
pub trait Cursor {
    /// Moves to the first row. Returns false if there are no rows.
    fn first(&mut self) -> EngineResult<bool>;

    /// Moves to the next row. Returns false once past the last row.
    fn next(&mut self) -> EngineResult<bool>;

    /// Reads the current row. `None` means the engine produced a null.
    fn get(&self) -> EngineResult<Option<Row>>;
}

/// A reference returned by [`Session::load`] whose existence is unchecked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyRef {
    entity: String,
    id: EntityId,
}

impl LazyRef {
    /// Creates a lazy reference.
    pub fn new(entity: impl Into<String>, id: EntityId) -> Self {
        Self {
            entity: entity.into(),
            id,
        }
    }

    /// Entity name.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Referenced identity.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }
}

/// Metadata the engine holds for one mapped entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityMetadata {
    name: String,
}

impl EntityMetadata {
    /// Creates metadata for an entity name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The mapped entity name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One unit of engine work.
pub trait Session: Send {
    /// Filter fragments this session can execute.
    type Predicate: Predicate;
    /// Cursor type produced by [`Session::scroll`].
    type Cursor: Cursor;

    /// Returns true if the session can still reach the backend.
    fn is_connected(&self) -> bool;

    /// Starts the backend transaction.
    fn begin_transaction(&mut self) -> EngineResult<()>;

    /// Status of the backend transaction.
    fn transaction_status(&self) -> TransactionStatus;

    /// Commits the backend transaction.
    fn commit(&mut self) -> EngineResult<()>;

    /// Rolls the backend transaction back.
    fn rollback(&mut self) -> EngineResult<()>;

    /// Makes a new object managed; it is inserted at the next flush.
    fn persist(&mut self, object: Arc<dyn Persistable>) -> EngineResult<()>;

    /// Makes an object managed; it is inserted or updated at the next flush.
    fn save_or_update(&mut self, object: Arc<dyn Persistable>) -> EngineResult<()>;

    /// Schedules removal of an object at the next flush.
    fn delete(&mut self, object: Arc<dyn Persistable>) -> EngineResult<()>;

    /// Synchronizes managed object state into the backend transaction.
    fn flush(&mut self) -> EngineResult<()>;

    /// Returns a lazy reference to a row.
    fn load(&mut self, entity: &str, id: EntityId) -> EngineResult<LazyRef>;

    /// Resolves a lazy reference, failing with `ObjectNotFound` if the row
    /// does not exist.
    fn initialize(&mut self, reference: &LazyRef) -> EngineResult<Row>;

    /// Opens a forward-only cursor over an entity table.
    fn scroll(
        &mut self,
        entity: &str,
        predicate: Option<&Self::Predicate>,
    ) -> EngineResult<Self::Cursor>;
}

/// A backing persistence engine.
pub trait Engine: Send + Sync {
    /// Session type handed out by the engine.
    type Session: Session;

    /// Metadata of every mapped entity.
    fn metadata(&self) -> Vec<EntityMetadata>;

    /// Returns the engine's current session, or `None` if it has none.
    fn current_session(&self) -> EngineResult<Option<Self::Session>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(TransactionStatus::Committed.is_terminal());
        assert!(TransactionStatus::RolledBack.is_terminal());
        assert!(!TransactionStatus::Active.is_terminal());
        assert!(!TransactionStatus::NotActive.is_terminal());
    }

    #[test]
    fn lazy_ref_accessors() {
        let id = EntityId::new();
        let reference = LazyRef::new("book", id);
        assert_eq!(reference.entity(), "book");
        assert_eq!(reference.id(), id);
    }
}
