//! # threads-store
//!
//! User profiles and their relations for Threads.
//!
//! Profiles and threads live in SQLite. A single [`Connector`] owns the
//! lazily opened [`Database`] and is shared by every store; each operation
//! makes sure the connection is up before running its query.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  UserStore     upsert / get / list (paged)   │
//! │    + relations  user threads, activity       │
//! │  ThreadStore   posts and replies             │
//! ├──────────────────────────────────────────────┤
//! │  Connector (OnceCell<Database>, from env)    │
//! ├──────────────────────────────────────────────┤
//! │  Database (rusqlite WAL) + migrations        │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use threads_store::{Connector, ListUsers, UpsertUser, UserStore};
//!
//! let users = UserStore::new(Connector::from_env());
//! users.upsert_user(UpsertUser {
//!     user_id: "user_2a".into(),
//!     username: "Ann".into(),
//!     name: "Ann Lee".into(),
//!     ..Default::default()
//! }).await?;
//! let page = users.list_users(ListUsers::for_caller("user_2a")).await?;
//! ```

pub mod cache;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod migration;
pub mod relations;
pub mod thread_store;
pub mod user_store;

// ── re-exports ───────────────────────────────────────────────────────

pub use cache::{CacheStats, RenderCache, Revalidate};
pub use config::{DATABASE_URL_ENV, DatabaseTarget, StoreConfig};
pub use connection::Connector;
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use relations::{AuthorSummary, Reply, ThreadWithReplies, UserThreads};
pub use thread_store::{Thread, ThreadStore};
pub use user_store::{
    DEFAULT_PAGE_SIZE, ListUsers, PROFILE_EDIT_PATH, SortOrder, UpsertUser, User, UserPage,
    UserStore,
};
