//! Appeal record: the row the registrar writes and the allocator reads.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Store-assigned appeal identity.
pub type AppealId = Uuid;

/// Organizational section: the numbering scope key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub u32);

impl Display for SectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Department identifier; only used to look up the formatting sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepartmentId(pub u32);

impl Display for DepartmentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The `(year, section)` pair bounding sequence-number uniqueness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Scope {
    pub year: i32,
    pub section: SectionId,
}

impl Scope {
    pub fn new(year: i32, section: SectionId) -> Self {
        Self { year, section }
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/section-{}", self.year, self.section)
    }
}

/// Normalized person name used for repeat matching.
///
/// Trimmed and lowercased. Blank names have no key, so two blank-named
/// appeals never match each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PersonKey(String);

impl PersonKey {
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_lowercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A registered appeal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appeal {
    pub id: AppealId,

    // ── Numbering ──
    pub sequence_number: u32,
    pub registration_code: String,
    #[serde(default)]
    pub is_repeat: bool,

    // ── Intake ──
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub submitted_by_name: String,
    pub section: SectionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<DepartmentId>,
    #[serde(default)]
    pub appeal_index_code: i32,

    // ── Audit ──
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<u64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated_by_name: String,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Appeal {
    /// Year used for scoping.
    ///
    /// Legacy rows may lack a submission date; those fall back to the
    /// creation timestamp.
    pub fn scope_year(&self) -> i32 {
        self.submission_date.unwrap_or(self.created_at).year()
    }

    pub fn scope(&self) -> Scope {
        Scope::new(self.scope_year(), self.section)
    }

    pub fn person_key(&self) -> Option<PersonKey> {
        PersonKey::new(&self.submitted_by_name)
    }

    /// Whether this row takes part in allocator reads for `scope`.
    pub fn is_live_in(&self, scope: &Scope) -> bool {
        !self.is_deleted && self.scope() == *scope
    }

    /// Mark deleted. Returns `false` when already deleted.
    pub fn soft_delete(&mut self, actor_name: &str, now: DateTime<Utc>) -> bool {
        if self.is_deleted {
            return false;
        }
        self.is_deleted = true;
        self.touch(actor_name, now);
        true
    }

    /// Clear the deleted mark. Returns `false` when already active.
    pub fn restore(&mut self, actor_name: &str, now: DateTime<Utc>) -> bool {
        if !self.is_deleted {
            return false;
        }
        self.is_deleted = false;
        self.touch(actor_name, now);
        true
    }

    fn touch(&mut self, actor_name: &str, now: DateTime<Utc>) {
        self.updated_at = Some(now);
        self.updated_by_name = actor_name.to_string();
    }
}
