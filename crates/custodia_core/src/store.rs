//! Store entry point.

use crate::config::Config;
use crate::entity::EntityRegistry;
use crate::error::CoreResult;
use crate::transaction::Transaction;
use crate::types::TransactionId;
use custodia_engine::{Engine, EngineError, Session};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Hands out transactions over an [`Engine`].
///
/// # Example
///
/// ```rust
/// use custodia_core::{Config, Store};
/// use custodia_engine::MemoryEngine;
///
/// let engine = MemoryEngine::new();
/// engine.map_entity("book");
///
/// let store = Store::new(engine, Config::default());
/// let mut txn = store.begin_transaction().unwrap();
/// txn.commit().unwrap();
/// txn.close().unwrap();
/// ```
#[derive(Debug)]
pub struct Store<E: Engine> {
    engine: E,
    config: Config,
    next_txid: AtomicU64,
}

impl<E: Engine> Store<E> {
    /// Creates a store over `engine`.
    pub fn new(engine: E, config: Config) -> Self {
        Self {
            engine,
            config,
            next_txid: AtomicU64::new(1),
        }
    }

    /// The backing engine.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The store configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Binds every entity the engine maps into `registry`.
    pub fn populate_entity_dictionary<R: EntityRegistry + ?Sized>(&self, registry: &mut R) {
        let metadata = self.engine.metadata();
        for entity in &metadata {
            registry.bind_entity(entity);
        }
        debug!(entities = metadata.len(), "entity dictionary populated");
    }

    /// Starts a transaction on the engine's current session.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Transaction` wrapping `NoSession` if the engine
    /// has no current session, `NotConnected` if the session is not
    /// connected, or the error from starting the backend transaction.
    pub fn begin_transaction(&self) -> CoreResult<Transaction<E::Session>> {
        let mut session = self.engine.current_session()?.ok_or(EngineError::NoSession)?;
        if !session.is_connected() {
            return Err(EngineError::NotConnected.into());
        }
        session.begin_transaction()?;

        let id = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        debug!(txn = %id, "transaction started");
        Ok(Transaction::new(id, session, self.config.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityDictionary;
    use crate::error::CoreError;
    use custodia_engine::MemoryEngine;

    #[test]
    fn transaction_ids_increase() {
        let store = Store::new(MemoryEngine::new(), Config::default());
        let mut first = store.begin_transaction().unwrap();
        let mut second = store.begin_transaction().unwrap();
        assert!(first.id() < second.id());
        first.rollback().unwrap();
        second.rollback().unwrap();
    }

    #[test]
    fn no_session_is_transaction_error() {
        let engine = MemoryEngine::new();
        engine.shutdown();
        let store = Store::new(engine, Config::default());
        let err = store.begin_transaction().unwrap_err();
        assert!(matches!(
            err,
            CoreError::Transaction(EngineError::NoSession)
        ));
    }

    #[test]
    fn disconnected_session_is_transaction_error() {
        let engine = MemoryEngine::new();
        engine.disconnect();
        let store = Store::new(engine, Config::default());
        let err = store.begin_transaction().unwrap_err();
        assert!(matches!(
            err,
            CoreError::Transaction(EngineError::NotConnected)
        ));
    }

    #[test]
    fn dictionary_gets_every_mapped_entity() {
        let engine = MemoryEngine::new();
        engine.map_entity("book");
        engine.map_entity("author");
        let store = Store::new(engine, Config::default());

        let mut dictionary = EntityDictionary::new();
        store.populate_entity_dictionary(&mut dictionary);
        assert_eq!(dictionary.len(), 2);
        assert!(dictionary.is_bound("book"));
        assert!(dictionary.is_bound("author"));
    }
}
