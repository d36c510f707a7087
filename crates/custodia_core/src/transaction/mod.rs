//! Transactions.
//!
//! A [`Transaction`] owns one engine session for its whole life. Writes are
//! collected in a [`WriteQueue`] and dispatched in order at flush time;
//! reads are served by the session directly.

mod queue;
mod state;

pub use queue::{WriteKind, WriteOperation, WriteQueue};
pub use state::Transaction;
