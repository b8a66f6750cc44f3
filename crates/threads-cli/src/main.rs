//! CLI entry point for Threads.
//!
//! Provides the `threads` command for editing profiles, searching users
//! and looking at replies, straight against the configured database.

mod cli;
mod helpers;

use anyhow::{Context, Result};
use clap::Parser;
use threads_store::{Connector, ListUsers, ThreadStore, UpsertUser, UserStore};
use tracing::info;

use crate::cli::{Cli, Commands, ThreadAction, UserAction};
use crate::helpers::{init_tracing, print_json, resolve_config};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    init_tracing("warn");

    let cli = Cli::parse();
    let connector = Connector::new(resolve_config(cli.database_url));

    match cli.command {
        Commands::Users { action } => cmd_users(UserStore::new(connector), action).await,
        Commands::Threads { action } => cmd_threads(ThreadStore::new(connector), action).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: users
// ---------------------------------------------------------------------------

async fn cmd_users(users: UserStore, action: UserAction) -> Result<()> {
    match action {
        UserAction::Upsert {
            user_id,
            username,
            name,
            bio,
            image,
            path,
        } => {
            users
                .upsert_user(UpsertUser {
                    user_id: user_id.clone(),
                    username,
                    name,
                    bio,
                    image,
                    path,
                })
                .await?;
            info!(%user_id, "profile saved");
            let user = users
                .get_user(&user_id)
                .await?
                .context("profile missing right after save")?;
            print_json(&user)
        }
        UserAction::Get { user_id } => match users.get_user(&user_id).await? {
            Some(user) => print_json(&user),
            None => anyhow::bail!("no user with id {user_id}"),
        },
        UserAction::List {
            caller,
            search,
            page,
            page_size,
            sort,
        } => {
            let page = users
                .list_users(ListUsers {
                    caller_id: caller,
                    search,
                    page_number: page,
                    page_size,
                    sort,
                })
                .await?;
            print_json(&page)
        }
        UserAction::Threads { user_id } => match users.get_user_threads(&user_id).await? {
            Some(threads) => print_json(&threads),
            None => anyhow::bail!("no user with id {user_id}"),
        },
        UserAction::Activity { user_key } => {
            let replies = users.get_activity(&user_key).await?;
            print_json(&replies)
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: threads
// ---------------------------------------------------------------------------

async fn cmd_threads(threads: ThreadStore, action: ThreadAction) -> Result<()> {
    let thread = match action {
        ThreadAction::Create { author, text } => threads
            .create_thread(&author, &text)
            .await
            .context("failed to create thread")?,
        ThreadAction::Reply {
            parent_id,
            author,
            text,
        } => threads
            .add_reply(&parent_id, &author, &text)
            .await
            .context("failed to add reply")?,
    };
    print_json(&thread)
}
