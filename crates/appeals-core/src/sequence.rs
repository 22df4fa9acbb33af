//! Sequence allocation within one `(year, section)` scope.
//!
//! Repeats reuse the scope's current high-water mark instead of minting a
//! new number, so a repeat may share its number with the latest entry.
//! Only non-repeat numbers are unique within a scope.

use crate::appeal::Scope;
use crate::memory::MemoryStore;

/// Next sequence number given the scope's live maximum and the prior count.
pub fn next_sequence(max_sequence: u32, prior_count: u32) -> u32 {
    if max_sequence == 0 {
        1
    } else if prior_count > 0 {
        max_sequence
    } else {
        max_sequence.saturating_add(1)
    }
}

/// Allocate against the snapshot the caller holds for `scope`.
pub fn allocate(store: &MemoryStore, scope: &Scope, prior_count: u32) -> u32 {
    next_sequence(store.max_sequence(scope), prior_count)
}
