//! Store seam for scope-serialized appeal mutation.
//!
//! Every write to appeal rows goes through [`AppealStore::mutate_scope`]:
//! the store hands the mutator a snapshot of one `(year, section)` scope,
//! holds that scope exclusively until the mutator returns, and commits the
//! snapshot only when the mutator reports a change. Different scopes never
//! wait on each other.

use crate::appeal::{Appeal, AppealId, Scope};
use crate::memory::MemoryStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Store-level failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("scope lock busy: {lock_path}")]
    LockBusy { lock_path: String },

    #[error("failed to acquire scope lock {lock_path}: {message}")]
    LockIo { lock_path: String, message: String },

    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("{path}:{line}: unreadable appeal row: {message}")]
    Corrupt {
        path: String,
        line: usize,
        message: String,
    },

    #[error("failed to encode appeal row: {0}")]
    Encode(String),

    #[error("scope {scope} is poisoned by a panicked writer")]
    Poisoned { scope: Scope },

    #[error("scope shard table is poisoned by a panicked writer")]
    ShardTablePoisoned,

    #[error("appeal id already present: {0}")]
    DuplicateId(AppealId),

    #[error("appeal {id} belongs to scope {actual}, not {expected}")]
    ScopeMismatch {
        id: AppealId,
        expected: Scope,
        actual: Scope,
    },
}

impl StoreError {
    /// Conflicts that a fresh attempt may resolve.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::LockBusy { .. })
    }
}

/// Failure of one scope mutation: either the store or the mutator itself.
#[derive(Debug, thiserror::Error)]
pub enum ScopeMutationError<E> {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Mutation(E),
}

/// Transactional appeal storage partitioned by scope.
pub trait AppealStore: Send + Sync {
    /// Run one serialized read-compute-write against `scope`.
    ///
    /// The mutator returns `(value, changed)`; `changed=true` commits the
    /// snapshot. A mutator error commits nothing. Rows the mutator adds must
    /// belong to `scope`.
    fn mutate_scope<T, E, F>(&self, scope: &Scope, mutator: F) -> Result<T, ScopeMutationError<E>>
    where
        F: FnOnce(&mut MemoryStore) -> Result<(T, bool), E>;

    /// Run `reader` over the committed rows of `scope` without taking the
    /// scope exclusively.
    fn read_scope<T, F>(&self, scope: &Scope, reader: F) -> Result<T, StoreError>
    where
        F: FnOnce(&MemoryStore) -> T;

    /// Lookup one appeal across all scopes, deleted rows included.
    fn find(&self, id: &AppealId) -> Result<Option<Appeal>, StoreError>;
}

pub(crate) fn ensure_single_scope(store: &MemoryStore, scope: &Scope) -> Result<(), StoreError> {
    match store.foreign_row(scope) {
        Some(row) => Err(StoreError::ScopeMismatch {
            id: row.id,
            expected: *scope,
            actual: row.scope(),
        }),
        None => Ok(()),
    }
}

type Shard = Arc<Mutex<MemoryStore>>;

/// In-process store: one mutex-guarded shard per scope.
///
/// The shard table lock is held only long enough to find or create a shard;
/// the shard lock is held for the whole mutation.
#[derive(Debug, Default)]
pub struct InProcessStore {
    shards: Mutex<HashMap<Scope, Shard>>,
}

impl InProcessStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from existing rows, sharded by each row's own scope.
    pub fn from_appeals(appeals: Vec<Appeal>) -> Self {
        let mut grouped: HashMap<Scope, Vec<Appeal>> = HashMap::new();
        for appeal in appeals {
            grouped.entry(appeal.scope()).or_default().push(appeal);
        }
        let shards = grouped
            .into_iter()
            .map(|(scope, rows)| (scope, Arc::new(Mutex::new(MemoryStore::from_appeals(rows)))))
            .collect();
        Self {
            shards: Mutex::new(shards),
        }
    }

    /// All rows across scopes, ordered by scope then ID.
    pub fn snapshot(&self) -> Result<Vec<Appeal>, StoreError> {
        let mut shards = self.shard_list()?;
        shards.sort_by_key(|(scope, _)| *scope);
        let mut rows = Vec::new();
        for (scope, shard) in shards {
            let guard = shard.lock().map_err(|_| StoreError::Poisoned { scope })?;
            rows.extend(guard.appeals().cloned());
        }
        Ok(rows)
    }

    fn shard(&self, scope: &Scope) -> Result<Shard, StoreError> {
        let mut shards = self
            .shards
            .lock()
            .map_err(|_| StoreError::ShardTablePoisoned)?;
        Ok(shards.entry(*scope).or_default().clone())
    }

    fn shard_list(&self) -> Result<Vec<(Scope, Shard)>, StoreError> {
        let shards = self
            .shards
            .lock()
            .map_err(|_| StoreError::ShardTablePoisoned)?;
        Ok(shards
            .iter()
            .map(|(scope, shard)| (*scope, shard.clone()))
            .collect())
    }
}

impl AppealStore for InProcessStore {
    fn mutate_scope<T, E, F>(&self, scope: &Scope, mutator: F) -> Result<T, ScopeMutationError<E>>
    where
        F: FnOnce(&mut MemoryStore) -> Result<(T, bool), E>,
    {
        let shard = self.shard(scope)?;
        let mut guard = shard
            .lock()
            .map_err(|_| StoreError::Poisoned { scope: *scope })?;

        guard.begin_staging();
        let (value, changed) = match mutator(&mut *guard) {
            Ok(outcome) => outcome,
            Err(err) => {
                guard.rollback_staged();
                return Err(ScopeMutationError::Mutation(err));
            }
        };
        if !changed {
            guard.rollback_staged();
            return Ok(value);
        }
        if let Err(err) = ensure_single_scope(&*guard, scope) {
            guard.rollback_staged();
            return Err(err.into());
        }
        guard.commit_staged();
        debug!(%scope, rows = guard.len(), "committed scope snapshot");
        Ok(value)
    }

    fn read_scope<T, F>(&self, scope: &Scope, reader: F) -> Result<T, StoreError>
    where
        F: FnOnce(&MemoryStore) -> T,
    {
        let shard = {
            let shards = self
                .shards
                .lock()
                .map_err(|_| StoreError::ShardTablePoisoned)?;
            shards.get(scope).cloned()
        };
        let Some(shard) = shard else {
            return Ok(reader(&MemoryStore::default()));
        };
        let guard = shard
            .lock()
            .map_err(|_| StoreError::Poisoned { scope: *scope })?;
        Ok(reader(&guard))
    }

    fn find(&self, id: &AppealId) -> Result<Option<Appeal>, StoreError> {
        for (scope, shard) in self.shard_list()? {
            let guard = shard.lock().map_err(|_| StoreError::Poisoned { scope })?;
            if let Some(appeal) = guard.appeal(id) {
                return Ok(Some(appeal.clone()));
            }
        }
        Ok(None)
    }
}
