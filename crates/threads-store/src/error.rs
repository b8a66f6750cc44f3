//! Error types for the threads-store crate.
//!
//! All storage operations return [`StoreError`] via [`StoreResult`].
//! The `User*` and `Activity` variants wrap the message of the underlying
//! cause so callers get one error kind per public operation.

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A schema migration failed.
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },

    /// The requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An invalid argument was provided to a store operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),

    /// Opening the configured database failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// An operation ran before any connection was established.
    #[error("database connection not established")]
    NotConnected,

    /// Creating or updating a user profile failed.
    #[error("failed to create/update user: {0}")]
    UserWrite(String),

    /// Fetching a single user failed.
    #[error("failed to fetch user: {0}")]
    UserRead(String),

    /// Listing or searching users failed.
    #[error("failed to fetch users: {0}")]
    UserList(String),

    /// Fetching a user's threads failed.
    #[error("failed to fetch user threads: {0}")]
    UserContent(String),

    /// Fetching replies to a user's threads failed.
    #[error("failed to fetch activity: {0}")]
    Activity(String),
}

impl StoreError {
    /// True for the variants produced by a missing or failed connection.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::NotConnected)
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
