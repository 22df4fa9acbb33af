//! Appeals CLI: the `appeals` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Register {
            person,
            department,
            section,
            actor_section,
            actor_name,
            actor_id,
            date,
            index,
            store,
            json,
        } => commands::register::run(commands::register::Args {
            person,
            department,
            section,
            actor_section,
            actor_name,
            actor_id,
            date,
            index,
            store,
            json,
        }),

        Commands::CheckDuplicate {
            person,
            year,
            section,
            store,
            json,
        } => commands::check_duplicate::run(person, year, section, store, json),

        Commands::Show { id, store, json } => commands::show::run(id, store, json),

        Commands::Delete {
            id,
            actor_name,
            store,
            json,
        } => commands::lifecycle::run_delete(id, actor_name, store, json),

        Commands::Restore {
            id,
            actor_name,
            store,
            json,
        } => commands::lifecycle::run_restore(id, actor_name, store, json),
    }
}
