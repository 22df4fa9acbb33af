//! # appeals-core
//!
//! Registration numbering for citizen appeals.
//!
//! Each appeal gets a sequence number unique within its `(year, section)`
//! scope and a human-readable registration code printed on correspondence.
//! Repeat submissions by the same person are detected and threaded into the
//! code.
//!
//! This crate provides:
//! - `Appeal` and the scope/identity types
//! - `MemoryStore` (canonical snapshot with the allocator reads)
//! - `AppealStore` with an in-process and a JSONL implementation
//! - `AppealRegistrar`, the single write path for numbers and codes
//!
//! ## Data model
//!
//! ```text
//! <root>/<year>/section-<id>.jsonl   (one file per scope)
//!     ↕  queue + advisory lock, load / synced commit
//! MemoryStore (scope snapshot)
//!     ↕  detect → allocate → format → insert
//! AppealRegistrar
//! ```

pub mod appeal;
pub mod atomic_store;
pub mod code;
pub mod config;
pub mod directory;
pub mod events;
pub mod memory;
pub mod registrar;
pub mod repeat;
pub mod sequence;
pub mod store;

pub use appeal::{Appeal, AppealId, DepartmentId, PersonKey, Scope, SectionId};
pub use atomic_store::{JsonlStore, scope_lock_path};
pub use code::{CodeParts, SignKind, format_registration_code, person_initial};
pub use config::{ConfigError, RegistryConfig};
pub use directory::{DepartmentDirectory, Directory, SectionDirectory};
pub use events::{
    APPEAL_EVENT_SCHEMA, AppealEvent, AppealEventAction, AuditLog, EventError, read_events,
    read_events_from_path,
};
pub use memory::{MemoryStore, MemoryStoreError};
pub use registrar::{
    Actor, AppealRegistrar, DuplicateCheck, LifecycleOutcome, RegistrationError,
    RegistrationRequest, RetryPolicy,
};
pub use repeat::{RepeatInfo, detect};
pub use sequence::{allocate, next_sequence};
pub use store::{AppealStore, InProcessStore, ScopeMutationError, StoreError};
