use crate::cli::StoreArgs;
use crate::support::{appeal_json, exit_with, open_registrar_or_exit, parse_appeal_id_or_exit, print_json};
use appeals_core::{Actor, LifecycleOutcome};
use chrono::Utc;
use serde_json::json;

pub fn run_delete(id: String, actor_name: String, store: StoreArgs, json_output: bool) {
    let id = parse_appeal_id_or_exit(&id);
    let (registrar, _) = open_registrar_or_exit(&store);
    let outcome = registrar
        .soft_delete(&id, &Actor::new(actor_name), Utc::now())
        .unwrap_or_else(|e| exit_with(e));
    report("delete", &outcome, json_output);
}

pub fn run_restore(id: String, actor_name: String, store: StoreArgs, json_output: bool) {
    let id = parse_appeal_id_or_exit(&id);
    let (registrar, _) = open_registrar_or_exit(&store);
    let outcome = registrar
        .restore(&id, &Actor::new(actor_name), Utc::now())
        .unwrap_or_else(|e| exit_with(e));
    report("restore", &outcome, json_output);
}

fn report(verb: &str, outcome: &LifecycleOutcome, json_output: bool) {
    if json_output {
        print_json(&json!({
            "action": format!("appeal.{verb}"),
            "changed": outcome.changed,
            "appeal": appeal_json(&outcome.appeal)
        }));
    } else {
        let status = if outcome.changed { "Updated" } else { "Unchanged" };
        println!(
            "appeals {verb}\n  {status}: {} [deleted={}]",
            outcome.appeal.registration_code, outcome.appeal.is_deleted
        );
    }
}
