//! Transaction handle.

use crate::config::Config;
use crate::entity::{Entity, EntityRef};
use crate::error::{CoreError, CoreResult};
use crate::filter::FilterPredicateBuilder;
use crate::policy::{FilterPolicy, Principal};
use crate::stream::ResultStream;
use crate::transaction::queue::{WriteOperation, WriteQueue};
use crate::types::{TransactionId, TransactionState};
use custodia_engine::{EngineResult, EntityId, Session, TransactionStatus};
use std::any::Any;
use std::fmt;
use tracing::{debug, error, trace, warn};

/// A unit of work over one engine session.
///
/// Writes are buffered and reach the engine only at [`flush`](Self::flush)
/// or [`commit`](Self::commit). Reads go straight to the session.
///
/// A transaction must end in `commit`, `rollback` or `close`. Closing one
/// that is still active rolls it back and reports an error, since
/// uncommitted work was discarded.
///
/// After a failed flush or commit the transaction only accepts `rollback`
/// and `close`.
pub struct Transaction<S: Session> {
    id: TransactionId,
    session: S,
    queue: WriteQueue,
    builder: FilterPredicateBuilder,
    config: Config,
    /// Set by a failed flush or commit.
    failed: bool,
    closed: bool,
}

impl<S: Session> Transaction<S> {
    /// Wraps a session whose backend transaction has already begun.
    pub(crate) fn new(id: TransactionId, session: S, config: Config) -> Self {
        Self {
            id,
            session,
            queue: WriteQueue::new(),
            builder: FilterPredicateBuilder::new(),
            config,
            failed: false,
            closed: false,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state, as reported by the backend.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.session.transaction_status().into()
    }

    /// Checks if the backend transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.transaction_status() == TransactionStatus::Active
    }

    /// Number of buffered writes.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.queue.len()
    }

    /// The underlying session.
    #[must_use]
    pub fn session(&self) -> &S {
        &self.session
    }

    fn ensure_usable(&self, op: &str) -> CoreResult<()> {
        if self.failed {
            return Err(CoreError::invalid_operation(format!(
                "cannot {op}: {} failed",
                self.id
            )));
        }
        if !self.is_active() {
            return Err(CoreError::invalid_operation(format!(
                "cannot {op}: {} is {:?}",
                self.id,
                self.state()
            )));
        }
        Ok(())
    }

    /// Marks the transaction failed if `result` is an error.
    fn fatal<R>(&mut self, result: EngineResult<R>) -> CoreResult<R> {
        result.map_err(|e| {
            self.failed = true;
            error!(txn = %self.id, error = %e, "transaction failed");
            CoreError::from(e)
        })
    }

    fn enqueue(&mut self, op: WriteOperation) {
        let kind = op.kind();
        let entity = op.target().entity_name().to_string();
        if self.queue.push(op) {
            trace!(txn = %self.id, ?kind, %entity, "write queued");
        } else {
            trace!(txn = %self.id, ?kind, %entity, "write already queued");
        }
    }

    /// Queues an insert-or-update of `entity`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction is not active.
    pub fn save<T: Entity>(&mut self, entity: &EntityRef<T>) -> CoreResult<()> {
        self.ensure_usable("save")?;
        self.enqueue(WriteOperation::Upsert(entity.erase()));
        Ok(())
    }

    /// Queues the removal of `entity`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction is not active.
    pub fn delete<T: Entity>(&mut self, entity: &EntityRef<T>) -> CoreResult<()> {
        self.ensure_usable("delete")?;
        self.enqueue(WriteOperation::Delete(entity.erase()));
        Ok(())
    }

    /// Default-constructs a `T` and queues its insertion.
    ///
    /// Returns `Ok(None)` if `T` has no default construction.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction is not active.
    pub fn create_object<T: Entity>(&mut self) -> CoreResult<Option<EntityRef<T>>> {
        self.ensure_usable("create")?;
        let Some(value) = T::instantiate() else {
            debug!(txn = %self.id, entity = T::NAME, "entity type cannot be instantiated");
            return Ok(None);
        };
        let handle = EntityRef::new(value);
        self.enqueue(WriteOperation::Persist(handle.erase()));
        Ok(Some(handle))
    }

    /// Sends every queued write to the session, in queue order, then
    /// flushes the session.
    ///
    /// # Errors
    ///
    /// Engine failures are returned as `CoreError::Transaction` and leave
    /// the transaction failed.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.ensure_usable("flush")?;
        let ops = self.queue.drain();
        let count = ops.len();
        for op in ops {
            let result = match op {
                WriteOperation::Persist(target) => self.session.persist(target.persistable()),
                WriteOperation::Upsert(target) => {
                    self.session.save_or_update(target.persistable())
                }
                WriteOperation::Delete(target) => self.session.delete(target.persistable()),
            };
            self.fatal(result)?;
        }
        let result = self.session.flush();
        self.fatal(result)?;
        debug!(txn = %self.id, writes = count, "flushed");
        Ok(())
    }

    /// Flushes and commits.
    ///
    /// # Errors
    ///
    /// Engine failures are returned as `CoreError::Transaction` and leave
    /// the transaction failed.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.flush()?;
        let result = self.session.commit();
        self.fatal(result)?;
        debug!(txn = %self.id, "committed");
        Ok(())
    }

    /// Discards buffered writes and rolls the backend transaction back.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the backend transaction is not active.
    pub fn rollback(&mut self) -> CoreResult<()> {
        if !self.is_active() {
            return Err(CoreError::invalid_operation(format!(
                "cannot roll back: {} is {:?}",
                self.id,
                self.state()
            )));
        }
        let discarded = self.queue.drain().len();
        self.session.rollback()?;
        debug!(txn = %self.id, discarded, "rolled back");
        Ok(())
    }

    /// Loads one object by ID.
    ///
    /// Returns `Ok(None)` if no object with that ID is visible, including
    /// one deleted by a concurrent transaction after the reference was
    /// obtained.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction is not active, or the
    /// engine error wrapped as `CoreError::Transaction`.
    pub fn load_object<T: Entity>(&mut self, id: EntityId) -> CoreResult<Option<EntityRef<T>>> {
        self.ensure_usable("load")?;
        let reference = match self.session.load(T::NAME, id) {
            Ok(reference) => reference,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let row = match self.session.initialize(&reference) {
            Ok(row) => row,
            Err(e) if e.is_not_found() => {
                debug!(txn = %self.id, entity = T::NAME, %id, "object not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Some(EntityRef::from_row(&row)?))
    }

    /// Streams every object of type `T`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction is not active, or the
    /// engine error wrapped as `CoreError::Transaction`.
    pub fn load_objects<T: Entity>(&mut self) -> CoreResult<ResultStream<T, S::Cursor>> {
        self.ensure_usable("load")?;
        let cursor = self.session.scroll(T::NAME, None)?;
        Ok(ResultStream::new(cursor))
    }

    /// Streams the objects of type `T`, narrowed by `policy` where the
    /// policy can be expressed as a storage predicate.
    ///
    /// The narrowing is an optimization. When the policy cannot be pushed
    /// down, every object is returned and the caller's post-load
    /// enforcement must decide per object.
    ///
    /// # Errors
    ///
    /// Same as [`load_objects`](Self::load_objects).
    pub fn load_objects_filtered<T: Entity>(
        &mut self,
        policy: &FilterPolicy<S::Predicate>,
    ) -> CoreResult<ResultStream<T, S::Cursor>> {
        // Before the builder: runtime checks may have side effects.
        self.ensure_usable("load")?;
        let predicate = if self.config.filter_pushdown {
            self.builder.build(policy)
        } else {
            None
        };
        let Some(predicate) = predicate else {
            debug!(txn = %self.id, entity = T::NAME, "loading unfiltered");
            return self.load_objects();
        };

        let cursor = self.session.scroll(T::NAME, Some(&predicate))?;
        Ok(ResultStream::new(cursor))
    }

    /// Wraps a credential as the acting principal.
    #[must_use]
    pub fn access_user<C: Any + Send + Sync>(&self, credential: C) -> Principal {
        Principal::new(credential)
    }

    /// Ends the transaction.
    ///
    /// Closing a committed or rolled back transaction is a no-op, and so is
    /// closing twice.
    ///
    /// # Errors
    ///
    /// If the backend transaction is still active it is rolled back and
    /// `ResourceState` is returned.
    pub fn close(&mut self) -> CoreResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if !self.is_active() {
            return Ok(());
        }

        self.queue.drain();
        if let Err(e) = self.session.rollback() {
            warn!(txn = %self.id, error = %e, "rollback on close failed");
        }
        warn!(txn = %self.id, "closed while active, rolled back");
        Err(CoreError::resource_state("transaction not closed"))
    }
}

impl<S: Session> Drop for Transaction<S> {
    fn drop(&mut self) {
        if self.closed || !self.config.rollback_on_drop || !self.is_active() {
            return;
        }
        error!(txn = %self.id, "transaction dropped while active, rolling back");
        if let Err(e) = self.session.rollback() {
            error!(txn = %self.id, error = %e, "rollback on drop failed");
        }
    }
}

impl<S: Session> fmt::Debug for Transaction<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("pending_writes", &self.queue.len())
            .field("failed", &self.failed)
            .field("closed", &self.closed)
            .finish()
    }
}
