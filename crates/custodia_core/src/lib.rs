//! # Custodia Core
//!
//! Policy-aware transactional data access for Custodia.
//!
//! This crate provides:
//! - [`Store`] and [`Transaction`] over a pluggable [`custodia_engine::Engine`]
//! - Buffered writes, dispatched in order at flush and commit
//! - Lazy single-pass [`ResultStream`]s over engine cursors
//! - Pushdown of [`FilterPolicy`] checks into storage predicates
//!
//! ## Filtered loads
//!
//! A filtered load narrows what the engine returns only when the whole
//! policy can be expressed as a predicate. Otherwise it returns every
//! object. Filtering here is an optimization: callers must still enforce
//! the policy on each loaded object.
//!
//! ## Example
//!
//! ```rust
//! use custodia_core::{Config, Entity, EntityRef, Store};
//! use custodia_engine::{EntityId, MemoryEngine};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Book {
//!     id: EntityId,
//!     title: String,
//! }
//!
//! impl Entity for Book {
//!     const NAME: &'static str = "book";
//!
//!     fn entity_id(&self) -> EntityId {
//!         self.id
//!     }
//! }
//!
//! let engine = MemoryEngine::new();
//! engine.map_entity(Book::NAME);
//! let store = Store::new(engine, Config::default());
//!
//! let book = EntityRef::new(Book { id: EntityId::new(), title: "Dune".into() });
//! let mut txn = store.begin_transaction().unwrap();
//! txn.save(&book).unwrap();
//! txn.commit().unwrap();
//! txn.close().unwrap();
//!
//! let mut txn = store.begin_transaction().unwrap();
//! let loaded = txn.load_object::<Book>(book.id()).unwrap().unwrap();
//! assert_eq!(loaded.read().title, "Dune");
//! txn.rollback().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod entity;
mod error;
mod filter;
mod policy;
mod store;
mod stream;
mod transaction;
mod types;

pub use config::Config;
pub use entity::{Entity, EntityDictionary, EntityRef, EntityRegistry, ErasedRef, ObjectIdentity};
pub use error::{CoreError, CoreResult};
pub use filter::FilterPredicateBuilder;
pub use policy::{
    Check, CheckOutcome, Combinator, FilterPolicy, NativeFilterCheck, Principal, RequestScope,
    RuntimeCheck,
};
pub use store::Store;
pub use stream::{IntoIter, ResultStream, Traversal};
pub use transaction::{Transaction, WriteKind, WriteOperation, WriteQueue};
pub use types::{TransactionId, TransactionState};
