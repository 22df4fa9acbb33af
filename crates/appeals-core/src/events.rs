//! Append-only audit log of appeal lifecycle events.
//!
//! `appeal.event.v1` envelope, one JSON object per line.

use crate::appeal::{Appeal, AppealId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub const APPEAL_EVENT_SCHEMA: &str = "appeal.event.v1";

fn default_appeal_event_schema() -> String {
    APPEAL_EVENT_SCHEMA.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AppealEventAction {
    Registered {
        registration_code: String,
        sequence_number: u32,
        is_repeat: bool,
    },
    Deleted,
    Restored,
}

impl AppealEventAction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Registered { .. } => "registered",
            Self::Deleted => "deleted",
            Self::Restored => "restored",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppealEvent {
    #[serde(default = "default_appeal_event_schema")]
    pub schema: String,
    pub event_id: String,
    pub appeal_id: AppealId,
    pub occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub actor: String,
    #[serde(flatten)]
    pub action: AppealEventAction,
}

impl AppealEvent {
    fn new(
        appeal_id: AppealId,
        occurred_at: DateTime<Utc>,
        actor: &str,
        action: AppealEventAction,
    ) -> Self {
        Self {
            schema: APPEAL_EVENT_SCHEMA.to_string(),
            event_id: format!(
                "appeal.{}:{appeal_id}:{}",
                action.as_str(),
                occurred_at.timestamp_micros()
            ),
            appeal_id,
            occurred_at,
            actor: actor.to_string(),
            action,
        }
    }

    pub fn registered(appeal: &Appeal) -> Self {
        Self::new(
            appeal.id,
            appeal.created_at,
            &appeal.created_by_name,
            AppealEventAction::Registered {
                registration_code: appeal.registration_code.clone(),
                sequence_number: appeal.sequence_number,
                is_repeat: appeal.is_repeat,
            },
        )
    }

    pub fn deleted(appeal_id: AppealId, actor: &str, occurred_at: DateTime<Utc>) -> Self {
        Self::new(appeal_id, occurred_at, actor, AppealEventAction::Deleted)
    }

    pub fn restored(appeal_id: AppealId, actor: &str, occurred_at: DateTime<Utc>) -> Self {
        Self::new(appeal_id, occurred_at, actor, AppealEventAction::Restored)
    }
}

pub fn read_events(reader: impl BufRead) -> Result<Vec<AppealEvent>, EventError> {
    let mut events = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| EventError::Io(line_no + 1, e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let event: AppealEvent = serde_json::from_str(trimmed)
            .map_err(|e| EventError::Parse(line_no + 1, e.to_string()))?;
        if event.schema != APPEAL_EVENT_SCHEMA {
            return Err(EventError::UnsupportedSchema(event.schema));
        }
        events.push(event);
    }
    Ok(events)
}

pub fn read_events_from_path(path: impl AsRef<Path>) -> Result<Vec<AppealEvent>, EventError> {
    let file = File::open(path.as_ref())
        .map_err(|e| EventError::Io(0, format!("{}: {e}", path.as_ref().display())))?;
    read_events(BufReader::new(file))
}

/// JSONL audit log opened in append mode per record.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a single line write.
    pub fn record(&self, event: &AppealEvent) -> Result<(), EventError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| EventError::Io(0, format!("{}: {e}", parent.display())))?;
        }

        let mut line =
            serde_json::to_string(event).map_err(|e| EventError::Serialize(e.to_string()))?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| EventError::Io(0, format!("{}: {e}", self.path.display())))?;
        file.write_all(line.as_bytes())
            .map_err(|e| EventError::Io(0, format!("{}: {e}", self.path.display())))
    }

    /// All events so far; a missing log reads as empty.
    pub fn events(&self) -> Result<Vec<AppealEvent>, EventError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        read_events_from_path(&self.path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("line {0}: I/O error: {1}")]
    Io(usize, String),

    #[error("line {0}: parse error: {1}")]
    Parse(usize, String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("unsupported event schema: {0}")]
    UnsupportedSchema(String),
}
