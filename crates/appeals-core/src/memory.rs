//! Canonical in-memory representation of appeal rows.
//!
//! This is the snapshot every store hands to a scope mutation:
//! - the three allocator reads (prior count, original sequence, max sequence)
//! - insert / soft-delete / restore
//! - deterministic iteration order
//!
//! A store may stage a mutation in place: between [`MemoryStore::begin_staging`]
//! and commit or rollback, the prior state of every touched row is journaled,
//! so undoing costs only the rows the mutation changed.

use crate::appeal::{Appeal, AppealId, PersonKey, Scope};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Errors raised while mutating the memory store.
#[derive(Debug, thiserror::Error)]
pub enum MemoryStoreError {
    #[error("appeal not found: {0}")]
    AppealNotFound(AppealId),

    #[error("appeal already exists: {0}")]
    AppealAlreadyExists(AppealId),

    #[error("cannot restore appeal {id}: sequence number {sequence_number} was reissued to {holder}")]
    SequenceReissued {
        id: AppealId,
        sequence_number: u32,
        holder: AppealId,
    },
}

/// Canonical in-memory state for appeals.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    appeals: BTreeMap<AppealId, Appeal>,
    /// Prior row per touched id while staging; `None` marks an insert.
    undo: Option<BTreeMap<AppealId, Option<Appeal>>>,
}

impl MemoryStore {
    /// Build a store from fully-materialized appeals.
    ///
    /// Duplicate IDs resolve last-write-wins.
    pub fn from_appeals(appeals: Vec<Appeal>) -> Self {
        let mut index = BTreeMap::new();
        for appeal in appeals {
            index.insert(appeal.id, appeal);
        }
        Self {
            appeals: index,
            undo: None,
        }
    }

    pub fn len(&self) -> usize {
        self.appeals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appeals.is_empty()
    }

    pub fn appeal(&self, id: &AppealId) -> Option<&Appeal> {
        self.appeals.get(id)
    }

    pub fn appeal_mut(&mut self, id: &AppealId) -> Option<&mut Appeal> {
        if self.appeals.contains_key(id) {
            self.record_undo(id);
        }
        self.appeals.get_mut(id)
    }

    /// Iterate all appeals (deleted included) in ID order.
    pub fn appeals(&self) -> impl Iterator<Item = &Appeal> {
        self.appeals.values()
    }

    /// Insert a new appeal. Existing IDs are rejected.
    pub fn insert(&mut self, appeal: Appeal) -> Result<(), MemoryStoreError> {
        if self.appeals.contains_key(&appeal.id) {
            return Err(MemoryStoreError::AppealAlreadyExists(appeal.id));
        }
        self.record_undo(&appeal.id);
        self.appeals.insert(appeal.id, appeal);
        Ok(())
    }

    /// Soft-delete one appeal. Returns whether anything changed.
    pub fn soft_delete(
        &mut self,
        id: &AppealId,
        actor_name: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, MemoryStoreError> {
        let appeal = self
            .appeal_mut(id)
            .ok_or(MemoryStoreError::AppealNotFound(*id))?;
        Ok(appeal.soft_delete(actor_name, now))
    }

    /// Restore one soft-deleted appeal. Returns whether anything changed.
    ///
    /// A non-repeat appeal cannot come back while another live non-repeat
    /// appeal in its scope holds the same sequence number.
    pub fn restore(
        &mut self,
        id: &AppealId,
        actor_name: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, MemoryStoreError> {
        let appeal = self
            .appeals
            .get(id)
            .ok_or(MemoryStoreError::AppealNotFound(*id))?;
        if !appeal.is_deleted {
            return Ok(false);
        }
        if !appeal.is_repeat {
            let scope = appeal.scope();
            let sequence_number = appeal.sequence_number;
            if let Some(holder) = self
                .live_in(&scope)
                .find(|row| !row.is_repeat && row.sequence_number == sequence_number)
            {
                return Err(MemoryStoreError::SequenceReissued {
                    id: *id,
                    sequence_number,
                    holder: holder.id,
                });
            }
        }

        let appeal = self
            .appeal_mut(id)
            .ok_or(MemoryStoreError::AppealNotFound(*id))?;
        Ok(appeal.restore(actor_name, now))
    }

    /// Start journaling changes so they can be rolled back.
    pub(crate) fn begin_staging(&mut self) {
        self.undo = Some(BTreeMap::new());
    }

    /// Keep staged changes and stop journaling.
    pub(crate) fn commit_staged(&mut self) {
        self.undo = None;
    }

    /// Undo every change since `begin_staging`.
    pub(crate) fn rollback_staged(&mut self) {
        let Some(undo) = self.undo.take() else {
            return;
        };
        for (id, prior) in undo {
            match prior {
                Some(row) => {
                    self.appeals.insert(id, row);
                }
                None => {
                    self.appeals.remove(&id);
                }
            }
        }
    }

    fn record_undo(&mut self, id: &AppealId) {
        let Self { appeals, undo } = self;
        if let Some(undo) = undo {
            undo.entry(*id).or_insert_with(|| appeals.get(id).cloned());
        }
    }

    /// Non-deleted appeals in `scope`.
    pub fn live_in<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a Appeal> + 'a {
        self.appeals().filter(move |appeal| appeal.is_live_in(scope))
    }

    fn live_for_person<'a>(
        &'a self,
        person: &'a PersonKey,
        scope: &'a Scope,
    ) -> impl Iterator<Item = &'a Appeal> + 'a {
        self.live_in(scope)
            .filter(move |appeal| appeal.person_key().as_ref() == Some(person))
    }

    /// Count of live appeals by `person` in `scope`.
    pub fn prior_count(&self, person: &PersonKey, scope: &Scope) -> u32 {
        let count = self.live_for_person(person, scope).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Lowest sequence number among live appeals by `person` in `scope`.
    pub fn original_sequence(&self, person: &PersonKey, scope: &Scope) -> Option<u32> {
        self.live_for_person(person, scope)
            .map(|appeal| appeal.sequence_number)
            .min()
    }

    /// Highest sequence number among live appeals in `scope`, or 0.
    pub fn max_sequence(&self, scope: &Scope) -> u32 {
        self.live_in(scope)
            .map(|appeal| appeal.sequence_number)
            .max()
            .unwrap_or(0)
    }

    /// First row whose scope differs from `scope`, if any.
    pub(crate) fn foreign_row(&self, scope: &Scope) -> Option<&Appeal> {
        self.appeals().find(|appeal| appeal.scope() != *scope)
    }
}
