//! Entity trait and shared entity handles.

use custodia_engine::{EngineError, EngineResult, EntityId, Persistable, Row};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Trait for application types stored through a [`crate::Transaction`].
///
/// Entities map to engine rows through serde, so a derive is usually all
/// that is needed:
///
/// ```rust
/// use custodia_core::Entity;
/// use custodia_engine::EntityId;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct Book {
///     id: EntityId,
///     title: String,
/// }
///
/// impl Entity for Book {
///     const NAME: &'static str = "book";
///
///     fn entity_id(&self) -> EntityId {
///         self.id
///     }
///
///     fn instantiate() -> Option<Self> {
///         Some(Self::default())
///     }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name of the entity table in the engine.
    const NAME: &'static str;

    /// Returns the entity's identifier.
    ///
    /// This ID must not change over the entity's lifetime.
    fn entity_id(&self) -> EntityId;

    /// Default-constructs a fresh instance.
    ///
    /// Returns `None` for types that have no meaningful default, which makes
    /// `Transaction::create_object` report absence instead of failing.
    fn instantiate() -> Option<Self>
    where
        Self: Sized,
    {
        None
    }
}

/// Reference identity of a live entity object.
///
/// Two handles have the same identity only if they point at the same
/// object, regardless of the entity IDs they carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectIdentity(usize);

/// The shared cell behind an [`EntityRef`].
struct Managed<T>(RwLock<T>);

impl<T: Entity> Persistable for Managed<T> {
    fn entity_name(&self) -> &str {
        T::NAME
    }

    fn entity_id(&self) -> EntityId {
        self.0.read().entity_id()
    }

    fn to_row(&self) -> EngineResult<Row> {
        Row::serialized(&*self.0.read()).map_err(EngineError::codec)
    }
}

/// A shared, mutable handle to a live entity.
///
/// Cloning the handle shares the object. Writes queued on a transaction
/// capture the handle, so changes made through any clone before the flush
/// are what gets stored.
pub struct EntityRef<T> {
    cell: Arc<Managed<T>>,
}

impl<T: Entity> EntityRef<T> {
    /// Wraps a value in a new handle with a fresh identity.
    pub fn new(value: T) -> Self {
        Self {
            cell: Arc::new(Managed(RwLock::new(value))),
        }
    }

    /// Decodes a row into a new handle.
    pub(crate) fn from_row(row: &Row) -> EngineResult<Self> {
        let value: T = row.deserialized().map_err(EngineError::codec)?;
        Ok(Self::new(value))
    }

    /// Locks the entity for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.cell.0.read()
    }

    /// Locks the entity for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.cell.0.write()
    }

    /// The entity's identifier.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.read().entity_id()
    }

    /// Reference identity of the underlying object.
    #[must_use]
    pub fn identity(&self) -> ObjectIdentity {
        ObjectIdentity(Arc::as_ptr(&self.cell) as *const () as usize)
    }

    /// Returns true if both handles point at the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Type-erased view used by the write queue.
    #[must_use]
    pub fn erase(&self) -> ErasedRef {
        ErasedRef {
            identity: self.identity(),
            object: Arc::clone(&self.cell) as Arc<dyn Persistable>,
        }
    }
}

impl<T: Entity + Clone> EntityRef<T> {
    /// Returns a copy of the current value.
    #[must_use]
    pub fn snapshot(&self) -> T {
        self.read().clone()
    }
}

impl<T> Clone for EntityRef<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Entity + fmt::Debug> fmt::Debug for EntityRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityRef").field(&*self.read()).finish()
    }
}

/// A type-erased entity handle.
///
/// Keeps the object alive, so its identity cannot be reused while the
/// handle exists.
#[derive(Clone)]
pub struct ErasedRef {
    identity: ObjectIdentity,
    object: Arc<dyn Persistable>,
}

impl ErasedRef {
    /// Reference identity of the object.
    #[must_use]
    pub fn identity(&self) -> ObjectIdentity {
        self.identity
    }

    /// Entity table name.
    #[must_use]
    pub fn entity_name(&self) -> &str {
        self.object.entity_name()
    }

    /// The engine-facing object.
    #[must_use]
    pub fn persistable(&self) -> Arc<dyn Persistable> {
        Arc::clone(&self.object)
    }
}

impl fmt::Debug for ErasedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedRef")
            .field("entity", &self.object.entity_name())
            .field("id", &self.object.entity_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tag {
        id: EntityId,
        label: String,
    }

    impl Entity for Tag {
        const NAME: &'static str = "tag";

        fn entity_id(&self) -> EntityId {
            self.id
        }
    }

    fn tag(label: &str) -> EntityRef<Tag> {
        EntityRef::new(Tag {
            id: EntityId::new(),
            label: label.to_string(),
        })
    }

    #[test]
    fn instantiate_defaults_to_none() {
        assert!(Tag::instantiate().is_none());
    }

    #[test]
    fn clones_share_identity() {
        let a = tag("rust");
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.identity(), b.identity());

        b.write().label = "serde".to_string();
        assert_eq!(a.read().label, "serde");
    }

    #[test]
    fn equal_values_have_distinct_identity() {
        let a = tag("rust");
        let b = EntityRef::new(a.snapshot());
        assert_eq!(a.id(), b.id());
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn erased_ref_keeps_identity_and_name() {
        let a = tag("rust");
        let erased = a.erase();
        assert_eq!(erased.identity(), a.identity());
        assert_eq!(erased.entity_name(), "tag");
        assert_eq!(erased.persistable().entity_id(), a.id());
    }

    #[test]
    fn row_roundtrip_creates_new_object() {
        let a = tag("rust");
        let row = a.erase().persistable().to_row().unwrap();
        let b: EntityRef<Tag> = EntityRef::from_row(&row).unwrap();
        assert_eq!(b.snapshot(), a.snapshot());
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn malformed_row_is_codec_error() {
        let err = EntityRef::<Tag>::from_row(&Row::Bool(true)).unwrap_err();
        assert!(matches!(err, EngineError::Codec(_)));
    }
}
