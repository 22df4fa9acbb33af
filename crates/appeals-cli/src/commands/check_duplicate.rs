use crate::cli::StoreArgs;
use crate::support::{exit_with, open_registrar_or_exit, print_json};
use appeals_core::SectionId;
use serde_json::json;

pub fn run(person: String, year: i32, section: u32, store: StoreArgs, json_output: bool) {
    let (registrar, _) = open_registrar_or_exit(&store);
    let check = registrar
        .check_duplicate(&person, year, SectionId(section))
        .unwrap_or_else(|e| exit_with(e));

    if json_output {
        print_json(&json!({
            "action": "appeal.check_duplicate",
            "person": person,
            "year": year,
            "section": section,
            "exists": check.exists,
            "count": check.count
        }));
    } else if check.exists {
        println!(
            "appeals check-duplicate\n  {person}: {} earlier appeal(s) in {year}/section-{section}",
            check.count
        );
    } else {
        println!("appeals check-duplicate\n  {person}: no earlier appeals in {year}/section-{section}");
    }
}
