use crate::cli::StoreArgs;
use crate::support::{appeal_json, exit_with, open_registrar_or_exit, parse_appeal_id_or_exit, print_json};
use serde_json::json;

pub fn run(id: String, store: StoreArgs, json_output: bool) {
    let id = parse_appeal_id_or_exit(&id);
    let (registrar, _) = open_registrar_or_exit(&store);
    let appeal = registrar.find(&id).unwrap_or_else(|e| exit_with(e));

    if json_output {
        print_json(&json!({
            "action": "appeal.show",
            "appeal": appeal_json(&appeal)
        }));
    } else {
        println!(
            "appeals show\n  Code: {}\n  Sequence: {}\n  Person: {}\n  Scope: {}\n  Deleted: {}",
            appeal.registration_code,
            appeal.sequence_number,
            appeal.submitted_by_name,
            appeal.scope(),
            appeal.is_deleted
        );
    }
}
