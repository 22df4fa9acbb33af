//! Repeat detection: has this person already appealed in this scope?

use crate::appeal::{PersonKey, Scope};
use crate::memory::MemoryStore;

/// What a scope already holds for one person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepeatInfo {
    /// Live appeals by the same normalized name in the scope.
    pub prior_count: u32,
    /// Lowest sequence number among those appeals; `None` when there are none.
    pub original_sequence: Option<u32>,
}

impl RepeatInfo {
    pub fn is_repeat(&self) -> bool {
        self.prior_count > 0
    }
}

/// Inspect `store` for earlier live appeals by `person_name` in `scope`.
///
/// Matching trims and case-folds the name. A blank name never repeats.
pub fn detect(store: &MemoryStore, person_name: &str, scope: &Scope) -> RepeatInfo {
    let Some(person) = PersonKey::new(person_name) else {
        return RepeatInfo::default();
    };

    let prior_count = store.prior_count(&person, scope);
    if prior_count == 0 {
        return RepeatInfo::default();
    }
    RepeatInfo {
        prior_count,
        original_sequence: store.original_sequence(&person, scope),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appeal::SectionId;
    use crate::appeal::fixtures::appeal;

    #[test]
    fn first_submission_is_not_a_repeat() {
        let store = MemoryStore::from_appeals(vec![appeal("Other", 1, 2026, 1)]);
        let info = detect(&store, "Rauf", &Scope::new(2026, SectionId(1)));
        assert_eq!(info, RepeatInfo::default());
        assert!(!info.is_repeat());
    }

    #[test]
    fn repeat_links_to_lowest_live_sequence() {
        let mut deleted = appeal("Rauf", 1, 2026, 1);
        deleted.is_deleted = true;
        let store = MemoryStore::from_appeals(vec![
            deleted,
            appeal("RAUF", 1, 2026, 4),
            appeal(" rauf", 1, 2026, 6),
        ]);
        let info = detect(&store, "Rauf ", &Scope::new(2026, SectionId(1)));
        assert_eq!(
            info,
            RepeatInfo {
                prior_count: 2,
                original_sequence: Some(4),
            }
        );
    }

    #[test]
    fn blank_name_never_repeats() {
        let store = MemoryStore::from_appeals(vec![appeal("", 1, 2026, 1), appeal(" ", 1, 2026, 2)]);
        for name in ["", "  "] {
            assert!(!detect(&store, name, &Scope::new(2026, SectionId(1))).is_repeat());
        }
    }

    #[test]
    fn other_year_or_section_does_not_count() {
        let store = MemoryStore::from_appeals(vec![
            appeal("Rauf", 2, 2026, 1),
            appeal("Rauf", 1, 2025, 1),
        ]);
        assert!(!detect(&store, "Rauf", &Scope::new(2026, SectionId(1))).is_repeat());
    }
}
