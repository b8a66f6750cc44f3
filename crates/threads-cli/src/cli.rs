//! CLI argument definitions.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use clap::{Parser, Subcommand};
use threads_store::SortOrder;

/// Threads -- user profiles and activity.
#[derive(Parser)]
#[command(
    name = "threads",
    version,
    about = "Threads -- manage user profiles, search users and inspect activity"
)]
pub struct Cli {
    /// Database URL; overrides `DATABASE_URL`.
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage user profiles.
    Users {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Post threads and replies.
    Threads {
        #[command(subcommand)]
        action: ThreadAction,
    },
}

#[derive(Subcommand)]
pub enum UserAction {
    /// Create or update a profile.
    Upsert {
        /// External user id.
        user_id: String,
        #[arg(long, short)]
        username: String,
        #[arg(long, short)]
        name: String,
        #[arg(long, short, default_value = "")]
        bio: String,
        /// Avatar URL.
        #[arg(long, short, default_value = "")]
        image: String,
        /// UI path the save is made from.
        #[arg(long, default_value = "")]
        path: String,
    },
    /// Show a single profile.
    Get {
        /// External user id.
        user_id: String,
    },
    /// List users other than the caller.
    List {
        /// External id of the user asking.
        #[arg(long)]
        caller: String,
        /// Case-insensitive match on username or name.
        #[arg(long, short, default_value = "")]
        search: String,
        #[arg(long, short, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = threads_store::DEFAULT_PAGE_SIZE)]
        page_size: u32,
        /// asc or desc.
        #[arg(long, default_value = "desc", value_parser = parse_sort)]
        sort: SortOrder,
    },
    /// Show a user's threads with replies.
    Threads {
        /// External user id.
        user_id: String,
    },
    /// Show replies other users left on a user's threads.
    Activity {
        /// The user's storage key (see `users get`).
        user_key: String,
    },
}

#[derive(Subcommand)]
pub enum ThreadAction {
    /// Post a new thread.
    Create {
        /// Author storage key.
        #[arg(long, short)]
        author: String,
        text: String,
    },
    /// Reply to a thread.
    Reply {
        parent_id: String,
        /// Author storage key.
        #[arg(long, short)]
        author: String,
        text: String,
    },
}

fn parse_sort(s: &str) -> Result<SortOrder, String> {
    s.parse().map_err(|e: threads_store::StoreError| e.to_string())
}
