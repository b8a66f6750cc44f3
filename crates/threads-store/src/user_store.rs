//! User profiles: upsert, lookup and paginated search.
//!
//! Users are keyed two ways. `id` is the external id handed out by the
//! identity provider and is what callers pass in; `storage_key` is the
//! internal key threads reference as their author.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::cache::Revalidate;
use crate::connection::Connector;
use crate::error::{StoreError, StoreResult};

/// UI path whose cached rendering is invalidated after a profile save.
pub const PROFILE_EDIT_PATH: &str = "/profile/edit";

/// Page size used when a caller does not pick one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal key, referenced by `threads.author_key`.
    pub storage_key: String,
    /// External id.
    pub id: String,
    /// Always lowercase.
    pub username: String,
    pub name: String,
    pub bio: String,
    /// Avatar URL.
    pub image: String,
    /// Set by every profile save.
    pub onboarded: bool,
    /// Ids of the user's top-level threads, oldest first.
    pub threads: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for [`UserStore::upsert_user`].
#[derive(Debug, Clone, Default)]
pub struct UpsertUser {
    pub user_id: String,
    pub username: String,
    pub name: String,
    pub bio: String,
    pub image: String,
    /// UI path the save was made from.
    pub path: String,
}

/// Direction of the creation-time sort in [`UserStore::list_users`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "1" => Ok(Self::Asc),
            "desc" | "descending" | "-1" => Ok(Self::Desc),
            other => Err(StoreError::InvalidArgument(format!(
                "unknown sort order: {other}"
            ))),
        }
    }
}

/// Input for [`UserStore::list_users`].
#[derive(Debug, Clone)]
pub struct ListUsers {
    /// Excluded from the results.
    pub caller_id: String,
    /// Case-insensitive substring of `username` or `name`; blank matches all.
    pub search: String,
    /// 1-based.
    pub page_number: u32,
    pub page_size: u32,
    pub sort: SortOrder,
}

impl ListUsers {
    /// First page, default size, newest first, no search.
    pub fn for_caller(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            search: String::new(),
            page_number: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: SortOrder::Desc,
        }
    }

    /// Rows before this page, `None` once that no longer fits an `i64`.
    fn skip(&self) -> Option<i64> {
        i64::from(self.page_number.checked_sub(1)?).checked_mul(i64::from(self.page_size))
    }
}

/// One page of [`UserStore::list_users`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPage {
    pub users: Vec<User>,
    /// More matching users exist past this page.
    pub has_next: bool,
}

// ═══════════════════════════════════════════════════════════════════════
//  UserStore
// ═══════════════════════════════════════════════════════════════════════

/// Profile reads and writes.
///
/// Every operation acquires the shared connection first and wraps any
/// failure in its own [`StoreError`] variant.
#[derive(Clone)]
pub struct UserStore {
    pub(crate) connector: Connector,
    revalidator: Option<Arc<dyn Revalidate>>,
}

impl UserStore {
    pub fn new(connector: Connector) -> Self {
        Self {
            connector,
            revalidator: None,
        }
    }

    /// Invalidate cached renderings through `revalidator` after profile
    /// saves made from [`PROFILE_EDIT_PATH`].
    pub fn with_revalidator(mut self, revalidator: Arc<dyn Revalidate>) -> Self {
        self.revalidator = Some(revalidator);
        self
    }

    /// Create the user if `user_id` is unknown, otherwise overwrite the
    /// profile fields. The username is lowercased and `onboarded` is set.
    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn upsert_user(&self, input: UpsertUser) -> StoreResult<()> {
        let path = input.path.clone();
        self.write_profile(input)
            .await
            .map_err(|e| StoreError::UserWrite(e.to_string()))?;

        if path == PROFILE_EDIT_PATH
            && let Some(revalidator) = &self.revalidator
        {
            revalidator.revalidate_path(&path).await;
        }
        Ok(())
    }

    async fn write_profile(&self, input: UpsertUser) -> StoreResult<()> {
        if input.user_id.is_empty() {
            return Err(StoreError::InvalidArgument(
                "user id must not be empty".into(),
            ));
        }
        if input.username.is_empty() {
            return Err(StoreError::InvalidArgument(
                "username must not be empty".into(),
            ));
        }

        let db = self.connector.acquire().await?;
        let storage_key = Uuid::now_v7().to_string();
        let username = input.username.to_lowercase();
        let now = Utc::now().timestamp();

        db.execute_mut(move |conn| {
            let taken = |e: rusqlite::Error| {
                if let rusqlite::Error::SqliteFailure(ref err, _) = e
                    && err.code == rusqlite::ErrorCode::ConstraintViolation
                {
                    return StoreError::InvalidArgument(format!(
                        "username already taken: {username}"
                    ));
                }
                StoreError::Sqlite(e)
            };

            let tx = conn.transaction()?;
            let updated = tx
                .execute(
                    "UPDATE users SET username = ?2, name = ?3, bio = ?4, image = ?5, \
                     onboarded = 1, updated_at = ?6 WHERE id = ?1",
                    rusqlite::params![
                        input.user_id,
                        username,
                        input.name,
                        input.bio,
                        input.image,
                        now
                    ],
                )
                .map_err(&taken)?;
            if updated == 0 {
                tx.execute(
                    "INSERT INTO users (storage_key, id, username, name, bio, image, onboarded, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)",
                    rusqlite::params![
                        storage_key,
                        input.user_id,
                        username,
                        input.name,
                        input.bio,
                        input.image,
                        now
                    ],
                )
                .map_err(&taken)?;
            }
            tx.commit()?;

            debug!(user_id = %input.user_id, username = %username, created = updated == 0, "user saved");
            Ok(())
        })
        .await
    }

    /// Fetch a user by external id, `None` if unknown.
    #[instrument(skip(self))]
    pub async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        let user_id = user_id.to_string();
        let lookup = async {
            let db = self.connector.acquire().await?;
            db.execute(move |conn| find_by_external_id(conn, &user_id))
                .await
        };
        lookup.await.map_err(|e| StoreError::UserRead(e.to_string()))
    }

    /// One page of users other than the caller, optionally filtered by a
    /// search string, sorted by creation time.
    #[instrument(skip(self))]
    pub async fn list_users(&self, query: ListUsers) -> StoreResult<UserPage> {
        self.page_users(query)
            .await
            .map_err(|e| StoreError::UserList(e.to_string()))
    }

    async fn page_users(&self, query: ListUsers) -> StoreResult<UserPage> {
        if query.page_number == 0 {
            return Err(StoreError::InvalidArgument(
                "page number starts at 1".into(),
            ));
        }
        if query.page_size == 0 {
            return Err(StoreError::InvalidArgument(
                "page size must be positive".into(),
            ));
        }

        let skip = query
            .skip()
            .ok_or_else(|| StoreError::InvalidArgument("page out of range".into()))?;

        let db = self.connector.acquire().await?;
        let limit = i64::from(query.page_size);
        let needle = search_needle(&query.search);
        let order = query.sort.as_sql();

        db.execute(move |conn| {
            let filter = "id != ?1 AND (?2 IS NULL \
                OR instr(casefold(username), ?2) > 0 \
                OR instr(casefold(name), ?2) > 0)";

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM users WHERE {filter}"),
                rusqlite::params![query.caller_id, needle],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT storage_key, id, username, name, bio, image, onboarded, created_at, updated_at \
                 FROM users WHERE {filter} \
                 ORDER BY created_at {order}, rowid {order} LIMIT ?3 OFFSET ?4"
            ))?;
            let mut users = stmt
                .query_map(
                    rusqlite::params![query.caller_id, needle, limit, skip],
                    user_from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            for user in &mut users {
                user.threads = authored_thread_ids(conn, &user.storage_key)?;
            }

            let has_next = total > skip.saturating_add(users.len() as i64);
            debug!(total, returned = users.len(), has_next, "users listed");
            Ok(UserPage { users, has_next })
        })
        .await
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Row mapping
// ═══════════════════════════════════════════════════════════════════════

/// Map a row selected as `storage_key, id, username, name, bio, image,
/// onboarded, created_at, updated_at`. `threads` is left empty.
pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        storage_key: row.get(0)?,
        id: row.get(1)?,
        username: row.get(2)?,
        name: row.get(3)?,
        bio: row.get(4)?,
        image: row.get(5)?,
        onboarded: row.get(6)?,
        threads: Vec::new(),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub(crate) fn find_by_external_id(conn: &Connection, user_id: &str) -> StoreResult<Option<User>> {
    let user = conn
        .query_row(
            "SELECT storage_key, id, username, name, bio, image, onboarded, created_at, updated_at \
             FROM users WHERE id = ?1",
            rusqlite::params![user_id],
            user_from_row,
        )
        .optional()?;

    match user {
        Some(mut user) => {
            user.threads = authored_thread_ids(conn, &user.storage_key)?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

fn authored_thread_ids(conn: &Connection, storage_key: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id FROM threads WHERE author_key = ?1 AND parent_id IS NULL \
         ORDER BY created_at, rowid",
    )?;
    let ids = stmt
        .query_map(rusqlite::params![storage_key], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Lowercased search text, or `None` for a blank search. Matched against
/// `casefold(...)` of the columns, so folding is the same on both sides.
fn search_needle(search: &str) -> Option<String> {
    let trimmed = search.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_lowercase())
}

// ── tests ────────────────────────────────────────────────────────────
