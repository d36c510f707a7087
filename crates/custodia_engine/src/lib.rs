//! # Custodia Engine
//!
//! Backing engine contract and implementations for Custodia.
//!
//! The data-access layer in `custodia_core` is written against the traits in
//! this crate and never against a concrete store:
//!
//! - [`Engine`] - entity metadata and the current [`Session`]
//! - [`Session`] - one backend transaction plus its persistence context
//! - [`Cursor`] - forward-only row cursor
//! - [`Predicate`] - composable filter fragment
//! - [`Persistable`] - type-erased object the engine can store
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - For testing and ephemeral storage, filtering with
//!   [`Criterion`] predicates
//!
//! ## Example
//!
//! ```rust
//! use custodia_engine::{Cursor, Engine, MemoryEngine, Row, Session};
//!
//! let engine = MemoryEngine::new();
//! engine.map_entity("book");
//! engine
//!     .insert_row("book", custodia_engine::EntityId::new(), Row::Text("dune".into()))
//!     .unwrap();
//!
//! let mut session = engine.current_session().unwrap().unwrap();
//! session.begin_transaction().unwrap();
//! let mut cursor = session.scroll("book", None).unwrap();
//! assert!(cursor.first().unwrap());
//! assert_eq!(cursor.get().unwrap(), Some(Row::Text("dune".into())));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod criterion;
mod error;
mod id;
mod memory;
mod session;

pub use criterion::{CompareOp, Criterion};
pub use error::{EngineError, EngineResult};
pub use id::EntityId;
pub use memory::{FaultPoint, MemoryCursor, MemoryEngine, MemorySession};
pub use session::{
    Cursor, Engine, EntityMetadata, LazyRef, Persistable, Predicate, Row, Session,
    TransactionStatus,
};
