//! Department sign and section index lookups.

use crate::appeal::{DepartmentId, SectionId};
use std::collections::BTreeMap;

/// Department id -> short sign code. Unknown ids are `None`, not an error.
pub trait DepartmentDirectory: Send + Sync {
    fn sign(&self, department: DepartmentId) -> Option<String>;
}

/// Section id -> numeric index embedded in codes.
pub trait SectionDirectory: Send + Sync {
    fn section_index(&self, section: SectionId) -> Option<i32>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartmentEntry {
    pub name: String,
    pub sign: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionEntry {
    pub name: String,
    pub index: i32,
}

/// Table-backed directory for both lookups.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    departments: BTreeMap<DepartmentId, DepartmentEntry>,
    sections: BTreeMap<SectionId, SectionEntry>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_department(
        mut self,
        id: DepartmentId,
        name: impl Into<String>,
        sign: Option<&str>,
    ) -> Self {
        self.insert_department(id, name, sign);
        self
    }

    pub fn with_section(mut self, id: SectionId, name: impl Into<String>, index: i32) -> Self {
        self.insert_section(id, name, index);
        self
    }

    /// Returns the previous entry if `id` was already present.
    pub fn insert_department(
        &mut self,
        id: DepartmentId,
        name: impl Into<String>,
        sign: Option<&str>,
    ) -> Option<DepartmentEntry> {
        self.departments.insert(
            id,
            DepartmentEntry {
                name: name.into(),
                sign: sign.map(str::to_string),
            },
        )
    }

    /// Returns the previous entry if `id` was already present.
    pub fn insert_section(
        &mut self,
        id: SectionId,
        name: impl Into<String>,
        index: i32,
    ) -> Option<SectionEntry> {
        self.sections.insert(
            id,
            SectionEntry {
                name: name.into(),
                index,
            },
        )
    }

    pub fn department(&self, id: DepartmentId) -> Option<&DepartmentEntry> {
        self.departments.get(&id)
    }

    pub fn section(&self, id: SectionId) -> Option<&SectionEntry> {
        self.sections.get(&id)
    }
}

impl DepartmentDirectory for Directory {
    fn sign(&self, department: DepartmentId) -> Option<String> {
        self.department(department)
            .and_then(|entry| entry.sign.clone())
    }
}

impl SectionDirectory for Directory {
    fn section_index(&self, section: SectionId) -> Option<i32> {
        self.section(section).map(|entry| entry.index)
    }
}
