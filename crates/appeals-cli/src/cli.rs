use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "appeals",
    about = "Appeals: register citizen appeals with scoped sequence numbers and registration codes",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Where the registry lives.
#[derive(Args, Clone, Debug)]
pub struct StoreArgs {
    /// Path to registry config TOML (defaults apply when omitted)
    #[arg(long)]
    pub config: Option<String>,

    /// Store root directory; overrides `store.root` from config
    #[arg(long)]
    pub store: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a new appeal and print its sequence number and code
    Register {
        /// Submitting person's full name
        #[arg(long)]
        person: String,

        /// Department id (selects the sign in the code)
        #[arg(long)]
        department: Option<u32>,

        /// Section id; falls back to --actor-section
        #[arg(long)]
        section: Option<u32>,

        /// Default section of the acting user
        #[arg(long)]
        actor_section: Option<u32>,

        /// Acting user's display name
        #[arg(long, default_value = "cli")]
        actor_name: String,

        /// Acting user's numeric id
        #[arg(long)]
        actor_id: Option<u64>,

        /// Submission date (YYYY-MM-DD or RFC3339); defaults to now
        #[arg(long)]
        date: Option<String>,

        /// Appeal index code
        #[arg(long)]
        index: Option<i32>,

        #[command(flatten)]
        store: StoreArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Count live appeals by a person in one year and section
    CheckDuplicate {
        /// Person's full name
        #[arg(long)]
        person: String,

        /// Scope year
        #[arg(long)]
        year: i32,

        /// Scope section id
        #[arg(long)]
        section: u32,

        #[command(flatten)]
        store: StoreArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one appeal by id
    Show {
        /// Appeal id (UUID)
        id: String,

        #[command(flatten)]
        store: StoreArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Soft-delete an appeal
    Delete {
        /// Appeal id (UUID)
        id: String,

        /// Acting user's display name
        #[arg(long, default_value = "cli")]
        actor_name: String,

        #[command(flatten)]
        store: StoreArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Restore a soft-deleted appeal
    Restore {
        /// Appeal id (UUID)
        id: String,

        /// Acting user's display name
        #[arg(long, default_value = "cli")]
        actor_name: String,

        #[command(flatten)]
        store: StoreArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
