//! Appeal registration: the one write path for sequence numbers and codes.
//!
//! One registration is a single scope mutation:
//! - detect repeats by the submitting person
//! - allocate the scope's next sequence number
//! - format the registration code
//! - insert the row
//!
//! All four see the same scope snapshot, and the store keeps the scope
//! exclusive until the insert commits.

use crate::appeal::{Appeal, AppealId, DepartmentId, Scope, SectionId};
use crate::code::{CodeParts, SignKind, person_initial};
use crate::directory::{DepartmentDirectory, SectionDirectory};
use crate::events::{AppealEvent, AuditLog};
use crate::memory::{MemoryStore, MemoryStoreError};
use crate::repeat::{self, RepeatInfo};
use crate::sequence;
use crate::store::{AppealStore, ScopeMutationError, StoreError};
use chrono::{DateTime, Datelike, Utc};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The authenticated user on whose behalf the registrar acts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Option<u64>,
    pub user_name: String,
    /// Section used when a request names none.
    pub default_section: Option<SectionId>,
}

impl Actor {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_id: None,
            user_name: user_name.into(),
            default_section: None,
        }
    }

    pub fn with_default_section(mut self, section: SectionId) -> Self {
        self.default_section = Some(section);
        self
    }
}

#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub submitted_by_name: String,
    pub department_id: Option<DepartmentId>,
    pub section: Option<SectionId>,
    pub submission_date: Option<DateTime<Utc>>,
    pub appeal_index_code: Option<i32>,
    /// Clock reading used for defaults and `created_at`.
    pub now: DateTime<Utc>,
}

impl RegistrationRequest {
    pub fn new(submitted_by_name: impl Into<String>) -> Self {
        Self {
            submitted_by_name: submitted_by_name.into(),
            department_id: None,
            section: None,
            submission_date: None,
            appeal_index_code: None,
            now: Utc::now(),
        }
    }
}

/// Bounded retry of whole registrations on transient store conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts; 0 behaves as 1.
    pub max_attempts: u32,
    /// Sleep before attempt `n + 1` is `backoff * n`.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::config::DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::from_millis(crate::config::DEFAULT_BACKOFF_MS),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("no section scope: request has none and actor has no default section")]
    MissingScope,

    #[error("transient store conflict, retry the registration: {0}")]
    TransientStore(#[source] StoreError),

    #[error("persistence failure: {0}")]
    Persistence(#[source] StoreError),

    #[error("appeal not found: {0}")]
    AppealNotFound(AppealId),

    #[error("cannot restore appeal {id}: sequence number {sequence_number} was reissued to {holder}")]
    RestoreConflict {
        id: AppealId,
        sequence_number: u32,
        holder: AppealId,
    },
}

impl RegistrationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStore(_))
    }
}

impl From<StoreError> for RegistrationError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            Self::TransientStore(err)
        } else {
            Self::Persistence(err)
        }
    }
}

impl From<ScopeMutationError<MemoryStoreError>> for RegistrationError {
    fn from(err: ScopeMutationError<MemoryStoreError>) -> Self {
        match err {
            ScopeMutationError::Store(err) => err.into(),
            ScopeMutationError::Mutation(MemoryStoreError::AppealNotFound(id)) => {
                Self::AppealNotFound(id)
            }
            ScopeMutationError::Mutation(MemoryStoreError::AppealAlreadyExists(id)) => {
                Self::Persistence(StoreError::DuplicateId(id))
            }
            ScopeMutationError::Mutation(MemoryStoreError::SequenceReissued {
                id,
                sequence_number,
                holder,
            }) => Self::RestoreConflict {
                id,
                sequence_number,
                holder,
            },
        }
    }
}

/// Result of a read-only duplicate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateCheck {
    pub exists: bool,
    pub count: u32,
}

/// Outcome of a soft-delete or restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleOutcome {
    pub appeal: Appeal,
    /// `false` when the appeal was already in the requested state.
    pub changed: bool,
}

pub struct AppealRegistrar<S, D> {
    store: S,
    directory: D,
    retry: RetryPolicy,
    audit: Option<AuditLog>,
}

impl<S, D> AppealRegistrar<S, D>
where
    S: AppealStore,
    D: DepartmentDirectory + SectionDirectory,
{
    pub fn new(store: S, directory: D) -> Self {
        Self {
            store,
            directory,
            retry: RetryPolicy::default(),
            audit: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Register a new appeal and return the persisted row.
    pub fn register(
        &self,
        actor: &Actor,
        request: &RegistrationRequest,
    ) -> Result<Appeal, RegistrationError> {
        let section = request
            .section
            .or(actor.default_section)
            .ok_or(RegistrationError::MissingScope)?;
        let submission_date = request.submission_date.unwrap_or(request.now);
        let scope = Scope::new(submission_date.year(), section);

        let appeal = self.with_retry_on(&scope, || {
            self.store
                .mutate_scope::<_, MemoryStoreError, _>(&scope, |rows| {
                    let repeat = repeat::detect(rows, &request.submitted_by_name, &scope);
                    let sequence_number = sequence::allocate(rows, &scope, repeat.prior_count);
                    let registration_code =
                        self.registration_code(request, &scope, sequence_number, repeat);
                    debug!(
                        %scope,
                        sequence = sequence_number,
                        prior_count = repeat.prior_count,
                        original = ?repeat.original_sequence,
                        "allocated sequence number"
                    );

                    let appeal = Appeal {
                        id: Uuid::new_v4(),
                        sequence_number,
                        registration_code,
                        is_repeat: repeat.is_repeat(),
                        submission_date: Some(submission_date),
                        submitted_by_name: request.submitted_by_name.clone(),
                        section,
                        department_id: request.department_id,
                        appeal_index_code: request.appeal_index_code.unwrap_or(0),
                        created_at: request.now,
                        created_by: actor.user_id,
                        created_by_name: actor.user_name.clone(),
                        updated_at: None,
                        updated_by_name: String::new(),
                        is_deleted: false,
                    };
                    rows.insert(appeal.clone())?;
                    Ok((appeal, true))
                })
                .map_err(RegistrationError::from)
        })?;

        info!(
            id = %appeal.id,
            %scope,
            sequence = appeal.sequence_number,
            code = %appeal.registration_code,
            repeat = appeal.is_repeat,
            "registered appeal"
        );
        self.audit(&AppealEvent::registered(&appeal));
        Ok(appeal)
    }

    /// Count live appeals by `person_name` in `(year, section)`.
    ///
    /// Reads the committed scope without taking it exclusively, so a writer
    /// holding the scope never makes this fail.
    pub fn check_duplicate(
        &self,
        person_name: &str,
        year: i32,
        section: SectionId,
    ) -> Result<DuplicateCheck, RegistrationError> {
        let scope = Scope::new(year, section);
        let info = self
            .store
            .read_scope(&scope, |rows| repeat::detect(rows, person_name, &scope))?;
        Ok(DuplicateCheck {
            exists: info.is_repeat(),
            count: info.prior_count,
        })
    }

    pub fn find(&self, id: &AppealId) -> Result<Appeal, RegistrationError> {
        self.store
            .find(id)?
            .ok_or(RegistrationError::AppealNotFound(*id))
    }

    /// Soft-delete an appeal. Its number and code stay as written.
    pub fn soft_delete(
        &self,
        id: &AppealId,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<LifecycleOutcome, RegistrationError> {
        let outcome = self.mutate_appeal(id, |rows| rows.soft_delete(id, &actor.user_name, now))?;
        if outcome.changed {
            info!(id = %id, code = %outcome.appeal.registration_code, "soft-deleted appeal");
            self.audit(&AppealEvent::deleted(*id, &actor.user_name, now));
        }
        Ok(outcome)
    }

    /// Restore a soft-deleted appeal.
    ///
    /// Fails with [`RegistrationError::RestoreConflict`] when a non-repeat
    /// appeal was restored after its number went to another live appeal.
    pub fn restore(
        &self,
        id: &AppealId,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<LifecycleOutcome, RegistrationError> {
        let outcome = self.mutate_appeal(id, |rows| rows.restore(id, &actor.user_name, now))?;
        if outcome.changed {
            info!(id = %id, code = %outcome.appeal.registration_code, "restored appeal");
            self.audit(&AppealEvent::restored(*id, &actor.user_name, now));
        }
        Ok(outcome)
    }

    fn mutate_appeal<F>(&self, id: &AppealId, change: F) -> Result<LifecycleOutcome, RegistrationError>
    where
        F: Fn(&mut MemoryStore) -> Result<bool, MemoryStoreError>,
    {
        let scope = self.find(id)?.scope();
        self.with_retry_on(&scope, || {
            self.store
                .mutate_scope::<_, MemoryStoreError, _>(&scope, |rows| {
                    let changed = change(rows)?;
                    let appeal = rows
                        .appeal(id)
                        .cloned()
                        .ok_or(MemoryStoreError::AppealNotFound(*id))?;
                    Ok((LifecycleOutcome { appeal, changed }, changed))
                })
                .map_err(RegistrationError::from)
        })
    }

    fn registration_code(
        &self,
        request: &RegistrationRequest,
        scope: &Scope,
        sequence_number: u32,
        repeat: RepeatInfo,
    ) -> String {
        let sign = request
            .department_id
            .and_then(|department| self.directory.sign(department));
        CodeParts {
            sign: SignKind::classify(sign.as_deref()),
            section_index: self.directory.section_index(scope.section).unwrap_or(0),
            number: repeat.original_sequence.unwrap_or(sequence_number),
            prior_count: repeat.prior_count,
            appeal_index_code: request.appeal_index_code.unwrap_or(0),
            year: scope.year,
            person_initial: person_initial(&request.submitted_by_name),
        }
        .to_string()
    }

    /// Run `attempt` until it succeeds, fails non-transiently, or the policy
    /// runs out. Every attempt starts from a fresh scope read.
    fn with_retry_on<T>(
        &self,
        scope: &Scope,
        mut attempt: impl FnMut() -> Result<T, RegistrationError>,
    ) -> Result<T, RegistrationError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut tries = 1;
        loop {
            match attempt() {
                Err(err) if err.is_transient() && tries < max_attempts => {
                    warn!(%scope, attempt = tries, max_attempts, error = %err, "retrying scope mutation");
                    std::thread::sleep(self.retry.backoff * tries);
                    tries += 1;
                }
                result => return result,
            }
        }
    }

    fn audit(&self, event: &AppealEvent) {
        if let Some(audit) = &self.audit
            && let Err(err) = audit.record(event)
        {
            warn!(event_id = %event.event_id, path = %audit.path().display(), error = %err, "failed to append audit event");
        }
    }
}
