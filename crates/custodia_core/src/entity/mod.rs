//! Entity model: typed entities, shared handles, and the entity dictionary.

mod dictionary;
mod handle;

pub use dictionary::{EntityDictionary, EntityRegistry};
pub use handle::{Entity, EntityRef, ErasedRef, ObjectIdentity};
