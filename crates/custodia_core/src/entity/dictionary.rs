//! Entity dictionary.

use custodia_engine::EntityMetadata;
use std::collections::BTreeMap;

/// A registry that entity bindings are published into.
///
/// [`crate::Store::populate_entity_dictionary`] calls `bind_entity` once per
/// entity the engine maps.
pub trait EntityRegistry {
    /// Binds one mapped entity.
    fn bind_entity(&mut self, metadata: &EntityMetadata);
}

/// The default [`EntityRegistry`]: a name-indexed set of bindings.
#[derive(Debug, Default, Clone)]
pub struct EntityDictionary {
    bindings: BTreeMap<String, EntityMetadata>,
}

impl EntityDictionary {
    /// Creates an empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the entity name is bound.
    #[must_use]
    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Looks up a binding by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EntityMetadata> {
        self.bindings.get(name)
    }

    /// All bindings, ordered by name.
    pub fn bindings(&self) -> impl Iterator<Item = &EntityMetadata> {
        self.bindings.values()
    }

    /// Number of bound entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl EntityRegistry for EntityDictionary {
    fn bind_entity(&mut self, metadata: &EntityMetadata) {
        self.bindings
            .insert(metadata.name().to_string(), metadata.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_is_idempotent() {
        let mut dictionary = EntityDictionary::new();
        dictionary.bind_entity(&EntityMetadata::new("book"));
        dictionary.bind_entity(&EntityMetadata::new("book"));
        dictionary.bind_entity(&EntityMetadata::new("author"));

        assert_eq!(dictionary.len(), 2);
        assert!(dictionary.is_bound("book"));
        assert!(!dictionary.is_bound("shelf"));
        let names: Vec<_> = dictionary.bindings().map(EntityMetadata::name).collect();
        assert_eq!(names, vec!["author", "book"]);
    }
}
