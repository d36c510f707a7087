//! In-memory engine.

use crate::criterion::Criterion;
use crate::error::{EngineError, EngineResult};
use crate::id::EntityId;
use crate::session::{
    Cursor, Engine, EntityMetadata, LazyRef, Persistable, Row, Session, TransactionStatus,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Operation at which an injected fault fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// `Session::persist`.
    Persist,
    /// `Session::flush`.
    Flush,
    /// `Session::commit`.
    Commit,
}

impl fmt::Display for FaultPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Persist => "persist",
            Self::Flush => "flush",
            Self::Commit => "commit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
struct StoredRow {
    /// Insertion sequence; fixes scan order.
    seq: u64,
    row: Row,
}

#[derive(Debug, Default)]
struct Table {
    rows: HashMap<EntityId, StoredRow>,
}

#[derive(Debug)]
struct Shared {
    tables: RwLock<BTreeMap<String, Table>>,
    next_seq: AtomicU64,
    available: AtomicBool,
    connected: AtomicBool,
    faults: Mutex<Vec<FaultPoint>>,
    rollbacks: AtomicU64,
}

impl Shared {
    /// Consumes a pending fault for `point`, if one is armed.
    fn trip(&self, point: FaultPoint) -> EngineResult<()> {
        let mut faults = self.faults.lock();
        if let Some(pos) = faults.iter().position(|p| *p == point) {
            faults.remove(pos);
            return Err(EngineError::Injected {
                point: point.to_string(),
            });
        }
        Ok(())
    }
}

/// An engine that keeps every table in memory.
///
/// Suitable for:
/// - Unit and integration tests
/// - Ephemeral stores that don't need persistence
///
/// Committed tables are shared by all sessions. Each session keeps its own
/// flushed-but-uncommitted changes, so readers see committed data plus their
/// own writes.
///
/// # Example
///
/// ```rust
/// use custodia_engine::{Engine, MemoryEngine, Session, TransactionStatus};
///
/// let engine = MemoryEngine::new();
/// engine.map_entity("book");
///
/// let mut session = engine.current_session().unwrap().unwrap();
/// session.begin_transaction().unwrap();
/// session.commit().unwrap();
/// assert_eq!(session.transaction_status(), TransactionStatus::Committed);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    shared: Arc<Shared>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Creates an empty engine with no mapped entities.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(BTreeMap::new()),
                next_seq: AtomicU64::new(1),
                available: AtomicBool::new(true),
                connected: AtomicBool::new(true),
                faults: Mutex::new(Vec::new()),
                rollbacks: AtomicU64::new(0),
            }),
        }
    }

    /// Maps an entity table. Mapping an existing table keeps its rows.
    pub fn map_entity(&self, name: impl Into<String>) {
        self.shared.tables.write().entry(name.into()).or_default();
    }

    /// Stops handing out sessions.
    pub fn shutdown(&self) {
        self.shared.available.store(false, Ordering::SeqCst);
    }

    /// Makes sessions opened from now on report not-connected.
    pub fn disconnect(&self) {
        self.shared.connected.store(false, Ordering::SeqCst);
    }

    /// Arms a one-shot fault at `point`.
    pub fn inject_fault(&self, point: FaultPoint) {
        self.shared.faults.lock().push(point);
    }

    /// Inserts a committed row directly, bypassing sessions.
    pub fn insert_row(&self, entity: &str, id: EntityId, row: Row) -> EngineResult<()> {
        let mut tables = self.shared.tables.write();
        let table = tables
            .get_mut(entity)
            .ok_or_else(|| EngineError::unknown_entity(entity))?;
        let seq = self.shared.next_seq.fetch_add(1, Ordering::SeqCst);
        table.rows.insert(id, StoredRow { seq, row });
        Ok(())
    }

    /// Returns a committed row.
    #[must_use]
    pub fn committed_row(&self, entity: &str, id: EntityId) -> Option<Row> {
        self.shared
            .tables
            .read()
            .get(entity)
            .and_then(|t| t.rows.get(&id))
            .map(|stored| stored.row.clone())
    }

    /// Number of backend rollbacks performed by sessions of this engine.
    #[must_use]
    pub fn rollback_count(&self) -> u64 {
        self.shared.rollbacks.load(Ordering::SeqCst)
    }

    /// Returns the number of committed rows in a table.
    #[must_use]
    pub fn row_count(&self, entity: &str) -> usize {
        self.shared
            .tables
            .read()
            .get(entity)
            .map_or(0, |t| t.rows.len())
    }
}

impl Engine for MemoryEngine {
    type Session = MemorySession;

    fn metadata(&self) -> Vec<EntityMetadata> {
        self.shared
            .tables
            .read()
            .keys()
            .map(EntityMetadata::new)
            .collect()
    }

    fn current_session(&self) -> EngineResult<Option<MemorySession>> {
        if !self.shared.available.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let connected = self.shared.connected.load(Ordering::SeqCst);
        Ok(Some(MemorySession::new(Arc::clone(&self.shared), connected)))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    Insert,
    Upsert,
    Delete,
}

struct Action {
    kind: ActionKind,
    object: Arc<dyn Persistable>,
}

/// A change written into the session's transaction by `flush`.
#[derive(Debug, Clone)]
struct Staged {
    entity: String,
    id: EntityId,
    /// `None` deletes the row.
    row: Option<Row>,
}

/// A session over a [`MemoryEngine`].
pub struct MemorySession {
    shared: Arc<Shared>,
    connected: bool,
    status: TransactionStatus,
    /// Registered but unflushed actions, in call order.
    actions: Vec<Action>,
    /// Objects whose state is re-synchronized at every flush.
    managed: Vec<Arc<dyn Persistable>>,
    /// Flushed changes, applied to the shared tables at commit.
    staged: Vec<Staged>,
}

impl fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySession")
            .field("connected", &self.connected)
            .field("status", &self.status)
            .field("actions", &self.actions.len())
            .field("managed", &self.managed.len())
            .field("staged", &self.staged.len())
            .finish_non_exhaustive()
    }
}

impl MemorySession {
    fn new(shared: Arc<Shared>, connected: bool) -> Self {
        Self {
            shared,
            connected,
            status: TransactionStatus::NotActive,
            actions: Vec::new(),
            managed: Vec::new(),
            staged: Vec::new(),
        }
    }

    /// Number of flushed changes waiting for commit.
    #[must_use]
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    fn ensure_active(&self) -> EngineResult<()> {
        if !self.connected {
            return Err(EngineError::NotConnected);
        }
        match self.status {
            TransactionStatus::Active => Ok(()),
            _ => Err(EngineError::TransactionNotActive),
        }
    }

    fn ensure_mapped(&self, entity: &str) -> EngineResult<()> {
        if self.shared.tables.read().contains_key(entity) {
            Ok(())
        } else {
            Err(EngineError::unknown_entity(entity))
        }
    }

    fn register(&mut self, kind: ActionKind, object: Arc<dyn Persistable>) -> EngineResult<()> {
        self.ensure_active()?;
        self.ensure_mapped(object.entity_name())?;
        self.actions.push(Action { kind, object });
        Ok(())
    }

    /// Row visible to this session: own staged changes first, then committed.
    fn visible_row(&self, entity: &str, id: EntityId) -> Option<Row> {
        if let Some(staged) = self
            .staged
            .iter()
            .rev()
            .find(|s| s.entity == entity && s.id == id)
        {
            return staged.row.clone();
        }
        self.shared
            .tables
            .read()
            .get(entity)
            .and_then(|t| t.rows.get(&id))
            .map(|stored| stored.row.clone())
    }

    fn stage(&mut self, entity: &str, id: EntityId, row: Option<Row>) {
        self.staged.push(Staged {
            entity: entity.to_string(),
            id,
            row,
        });
    }

    fn is_managed(&self, object: &Arc<dyn Persistable>) -> bool {
        self.managed.iter().any(|m| Arc::ptr_eq(m, object))
    }

    fn clear_unit_of_work(&mut self) {
        self.actions.clear();
        self.managed.clear();
        self.staged.clear();
    }
}

impl Session for MemorySession {
    type Predicate = Criterion;
    type Cursor = MemoryCursor;

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn begin_transaction(&mut self) -> EngineResult<()> {
        if !self.connected {
            return Err(EngineError::NotConnected);
        }
        if self.status == TransactionStatus::Active {
            return Err(EngineError::TransactionAlreadyActive);
        }
        self.clear_unit_of_work();
        self.status = TransactionStatus::Active;
        Ok(())
    }

    fn transaction_status(&self) -> TransactionStatus {
        self.status
    }

    fn commit(&mut self) -> EngineResult<()> {
        self.ensure_active()?;
        if !self.actions.is_empty() {
            self.flush()?;
        }
        self.shared.trip(FaultPoint::Commit)?;

        let staged = std::mem::take(&mut self.staged);
        let applied = staged.len();
        {
            let mut tables = self.shared.tables.write();
            for change in staged {
                let Some(table) = tables.get_mut(&change.entity) else {
                    continue;
                };
                match change.row {
                    Some(row) => {
                        let seq = match table.rows.get(&change.id) {
                            Some(existing) => existing.seq,
                            None => self.shared.next_seq.fetch_add(1, Ordering::SeqCst),
                        };
                        table.rows.insert(change.id, StoredRow { seq, row });
                    }
                    None => {
                        table.rows.remove(&change.id);
                    }
                }
            }
        }

        self.clear_unit_of_work();
        self.status = TransactionStatus::Committed;
        debug!(changes = applied, "memory session committed");
        Ok(())
    }

    fn rollback(&mut self) -> EngineResult<()> {
        if self.status != TransactionStatus::Active {
            return Err(EngineError::TransactionNotActive);
        }
        let discarded = self.staged.len() + self.actions.len();
        self.clear_unit_of_work();
        self.status = TransactionStatus::RolledBack;
        self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        debug!(discarded, "memory session rolled back");
        Ok(())
    }

    fn persist(&mut self, object: Arc<dyn Persistable>) -> EngineResult<()> {
        self.shared.trip(FaultPoint::Persist)?;
        self.register(ActionKind::Insert, object)
    }

    fn save_or_update(&mut self, object: Arc<dyn Persistable>) -> EngineResult<()> {
        self.register(ActionKind::Upsert, object)
    }

    fn delete(&mut self, object: Arc<dyn Persistable>) -> EngineResult<()> {
        self.register(ActionKind::Delete, object)
    }

    fn flush(&mut self) -> EngineResult<()> {
        self.ensure_active()?;
        self.shared.trip(FaultPoint::Flush)?;

        let actions = std::mem::take(&mut self.actions);
        for action in actions {
            let entity = action.object.entity_name().to_string();
            let id = action.object.entity_id();
            match action.kind {
                ActionKind::Insert => {
                    if self.visible_row(&entity, id).is_some() {
                        return Err(EngineError::DuplicateKey { entity, id });
                    }
                    let row = action.object.to_row()?;
                    self.stage(&entity, id, Some(row));
                    if !self.is_managed(&action.object) {
                        self.managed.push(action.object);
                    }
                }
                ActionKind::Upsert => {
                    let row = action.object.to_row()?;
                    self.stage(&entity, id, Some(row));
                    if !self.is_managed(&action.object) {
                        self.managed.push(action.object);
                    }
                }
                ActionKind::Delete => {
                    self.managed
                        .retain(|m| !(m.entity_name() == entity && m.entity_id() == id));
                    if self.visible_row(&entity, id).is_some() {
                        self.stage(&entity, id, None);
                    }
                }
            }
        }

        // Re-synchronize managed objects mutated since they were registered.
        let mut dirty = Vec::new();
        for object in &self.managed {
            let entity = object.entity_name();
            let id = object.entity_id();
            let row = object.to_row()?;
            if self.visible_row(entity, id).as_ref() != Some(&row) {
                dirty.push((entity.to_string(), id, row));
            }
        }
        for (entity, id, row) in dirty {
            self.stage(&entity, id, Some(row));
        }
        Ok(())
    }

    fn load(&mut self, entity: &str, id: EntityId) -> EngineResult<LazyRef> {
        self.ensure_active()?;
        self.ensure_mapped(entity)?;
        Ok(LazyRef::new(entity, id))
    }

    fn initialize(&mut self, reference: &LazyRef) -> EngineResult<Row> {
        self.ensure_active()?;
        self.visible_row(reference.entity(), reference.id())
            .ok_or_else(|| EngineError::object_not_found(reference.entity(), reference.id()))
    }

    /// Returns a [`MemoryCursor`] over a copy of the matching rows.
    fn scroll(
        &mut self,
        entity: &str,
        predicate: Option<&Criterion>,
    ) -> EngineResult<MemoryCursor> {
        self.ensure_active()?;

        // Committed rows keep their insertion order; rows first written by
        // this session follow in staging order.
        let mut ordered: BTreeMap<(u8, u64), (EntityId, Row)> = BTreeMap::new();
        let mut position: HashMap<EntityId, (u8, u64)> = HashMap::new();
        {
            let tables = self.shared.tables.read();
            let table = tables
                .get(entity)
                .ok_or_else(|| EngineError::unknown_entity(entity))?;
            for (id, stored) in &table.rows {
                ordered.insert((0, stored.seq), (*id, stored.row.clone()));
                position.insert(*id, (0, stored.seq));
            }
        }
        for (index, change) in self.staged.iter().enumerate() {
            if change.entity != entity {
                continue;
            }
            match (&change.row, position.get(&change.id).copied()) {
                (Some(row), Some(key)) => {
                    ordered.insert(key, (change.id, row.clone()));
                }
                (Some(row), None) => {
                    let key = (1, index as u64);
                    ordered.insert(key, (change.id, row.clone()));
                    position.insert(change.id, key);
                }
                (None, Some(key)) => {
                    ordered.remove(&key);
                    position.remove(&change.id);
                }
                (None, None) => {}
            }
        }

        let rows = ordered
            .into_values()
            .map(|(_, row)| row)
            .filter(|row| predicate.map_or(true, |p| p.matches(row)))
            .map(Some)
            .collect();
        Ok(MemoryCursor::new(rows))
    }
}

/// A forward-only cursor over a snapshot of rows.
///
/// `MemorySession::scroll` copies the matching rows when the cursor is
/// opened, so the cursor holds the whole result in memory and does not see
/// later writes.
#[derive(Debug, Clone)]
pub struct MemoryCursor {
    rows: Vec<Option<Row>>,
    position: Option<usize>,
}

impl MemoryCursor {
    /// Creates a cursor positioned before the first of `rows`.
    ///
    /// A `None` entry is reported as a null row.
    #[must_use]
    pub fn new(rows: Vec<Option<Row>>) -> Self {
        Self {
            rows,
            position: None,
        }
    }

    /// Number of rows left, including the current one.
    #[must_use]
    pub fn remaining(&self) -> usize {
        match self.position {
            None => self.rows.len(),
            Some(pos) => self.rows.len().saturating_sub(pos),
        }
    }
}

impl Cursor for MemoryCursor {
    fn first(&mut self) -> EngineResult<bool> {
        self.position = Some(0);
        Ok(!self.rows.is_empty())
    }

    fn next(&mut self) -> EngineResult<bool> {
        let next = self.position.map_or(0, |pos| pos + 1);
        self.position = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }

    fn get(&self) -> EngineResult<Option<Row>> {
        match self.position {
            Some(pos) if pos < self.rows.len() => Ok(self.rows[pos].clone()),
            _ => Err(EngineError::NoCurrentRow),
        }
    }
}
