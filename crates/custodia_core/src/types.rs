//! Core type definitions for Custodia.

use custodia_engine::TransactionStatus;
use std::fmt;

/// Identifier of a transaction handed out by a [`crate::Store`].
///
/// Increases per store; rendered as `txn:N` in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

impl TransactionState {
    /// Returns true once the transaction can no longer change.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl From<TransactionStatus> for TransactionState {
    fn from(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Active => Self::Active,
            TransactionStatus::Committed => Self::Committed,
            // A session whose transaction never started holds nothing to
            // roll back.
            TransactionStatus::RolledBack | TransactionStatus::NotActive => Self::RolledBack,
        }
    }
}
