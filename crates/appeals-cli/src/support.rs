use crate::cli::StoreArgs;
use appeals_core::{
    Appeal, AppealId, AppealRegistrar, AuditLog, Directory, JsonlStore, RegistryConfig,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Value, json};
use std::fmt::Display;
use std::path::PathBuf;

pub type Registrar = AppealRegistrar<JsonlStore, Directory>;

pub fn exit_with(err: impl Display) -> ! {
    eprintln!("error: {err}");
    std::process::exit(1);
}

pub fn load_config_or_exit(args: &StoreArgs) -> RegistryConfig {
    let mut config = match &args.config {
        Some(path) => RegistryConfig::load(path).unwrap_or_else(|e| exit_with(e)),
        None => RegistryConfig::default(),
    };
    if let Some(root) = &args.store {
        config.store.root = PathBuf::from(root);
    }
    config
}

/// JSONL-backed registrar rooted at the configured store, auditing to
/// `<root>/events.jsonl`.
pub fn open_registrar_or_exit(args: &StoreArgs) -> (Registrar, PathBuf) {
    let config = load_config_or_exit(args);
    let directory = config.directory().unwrap_or_else(|e| exit_with(e));
    let root = config.store.root.clone();
    let store = JsonlStore::new(&root).with_lock_timeout(config.lock_timeout());
    let registrar = AppealRegistrar::new(store, directory)
        .with_retry(config.retry_policy())
        .with_audit_log(AuditLog::new(config.audit_log_path()));
    (registrar, root)
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC3339 timestamp.
pub fn parse_date_or_exit(raw: &str) -> DateTime<Utc> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return midnight.and_utc();
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .unwrap_or_else(|e| exit_with(format!("invalid date `{raw}`: {e}")))
}

pub fn parse_appeal_id_or_exit(raw: &str) -> AppealId {
    raw.parse()
        .unwrap_or_else(|e| exit_with(format!("invalid appeal id `{raw}`: {e}")))
}

pub fn appeal_json(appeal: &Appeal) -> Value {
    json!({
        "id": appeal.id.to_string(),
        "sequenceNumber": appeal.sequence_number,
        "registrationCode": appeal.registration_code,
        "isRepeat": appeal.is_repeat,
        "submittedByName": appeal.submitted_by_name,
        "submissionDate": appeal.submission_date.map(|at| at.to_rfc3339()),
        "year": appeal.scope_year(),
        "section": appeal.section.0,
        "departmentId": appeal.department_id.map(|id| id.0),
        "appealIndexCode": appeal.appeal_index_code,
        "createdAt": appeal.created_at.to_rfc3339(),
        "createdByName": appeal.created_by_name,
        "isDeleted": appeal.is_deleted
    })
}

pub fn print_json(payload: &Value) {
    let rendered = serde_json::to_string_pretty(payload).unwrap_or_else(|e| exit_with(e));
    println!("{rendered}");
}
