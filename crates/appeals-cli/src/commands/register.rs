use crate::cli::StoreArgs;
use crate::support::{appeal_json, exit_with, open_registrar_or_exit, parse_date_or_exit, print_json};
use appeals_core::{Actor, DepartmentId, RegistrationRequest, SectionId};
use serde_json::json;

pub struct Args {
    pub person: String,
    pub department: Option<u32>,
    pub section: Option<u32>,
    pub actor_section: Option<u32>,
    pub actor_name: String,
    pub actor_id: Option<u64>,
    pub date: Option<String>,
    pub index: Option<i32>,
    pub store: StoreArgs,
    pub json: bool,
}

pub fn run(args: Args) {
    let (registrar, root) = open_registrar_or_exit(&args.store);

    let actor = Actor {
        user_id: args.actor_id,
        user_name: args.actor_name,
        default_section: args.actor_section.map(SectionId),
    };
    let mut request = RegistrationRequest::new(args.person);
    request.department_id = args.department.map(DepartmentId);
    request.section = args.section.map(SectionId);
    request.submission_date = args.date.as_deref().map(parse_date_or_exit);
    request.appeal_index_code = args.index;

    let appeal = registrar
        .register(&actor, &request)
        .unwrap_or_else(|e| exit_with(e));

    if args.json {
        print_json(&json!({
            "action": "appeal.register",
            "storeRoot": root.display().to_string(),
            "appeal": appeal_json(&appeal)
        }));
    } else {
        println!(
            "appeals register\n  Code: {}\n  Sequence: {}{}\n  Id: {}",
            appeal.registration_code,
            appeal.sequence_number,
            if appeal.is_repeat { " (repeat)" } else { "" },
            appeal.id
        );
    }
}
