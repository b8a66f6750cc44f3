//! Threads (posts and replies).
//!
//! Thread creation belongs to the posting side of the application; this
//! store only covers what profile pages need to be exercised end to end.

use chrono::Utc;
use rusqlite::{OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::connection::Connector;
use crate::error::{StoreError, StoreResult};

/// A post, or a reply when `parent_id` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    /// `storage_key` of the author.
    pub author_key: String,
    pub text: String,
    pub parent_id: Option<String>,
    pub created_at: i64,
}

/// Map a row selected as `id, author_key, text, parent_id, created_at`
/// starting at column `offset`.
pub(crate) fn thread_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: row.get(offset)?,
        author_key: row.get(offset + 1)?,
        text: row.get(offset + 2)?,
        parent_id: row.get(offset + 3)?,
        created_at: row.get(offset + 4)?,
    })
}

#[derive(Clone)]
pub struct ThreadStore {
    connector: Connector,
}

impl ThreadStore {
    pub fn new(connector: Connector) -> Self {
        Self { connector }
    }

    /// Post a new top-level thread.
    #[instrument(skip(self, text))]
    pub async fn create_thread(&self, author_key: &str, text: &str) -> StoreResult<Thread> {
        self.insert(author_key, text, None).await
    }

    /// Reply to `parent_id`. Fails with `NotFound` if the parent is gone.
    #[instrument(skip(self, text))]
    pub async fn add_reply(
        &self,
        parent_id: &str,
        author_key: &str,
        text: &str,
    ) -> StoreResult<Thread> {
        self.insert(author_key, text, Some(parent_id.to_string()))
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_thread(&self, id: &str) -> StoreResult<Option<Thread>> {
        let db = self.connector.acquire().await?;
        let id = id.to_string();
        db.execute(move |conn| {
            let thread = conn
                .query_row(
                    "SELECT id, author_key, text, parent_id, created_at FROM threads WHERE id = ?1",
                    rusqlite::params![id],
                    |row| thread_from_row(row, 0),
                )
                .optional()?;
            Ok(thread)
        })
        .await
    }

    async fn insert(
        &self,
        author_key: &str,
        text: &str,
        parent_id: Option<String>,
    ) -> StoreResult<Thread> {
        if text.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "thread text must not be empty".into(),
            ));
        }

        let db = self.connector.acquire().await?;
        let thread = Thread {
            id: Uuid::now_v7().to_string(),
            author_key: author_key.to_string(),
            text: text.to_string(),
            parent_id,
            created_at: Utc::now().timestamp(),
        };

        db.execute_mut(move |conn| {
            let tx = conn.transaction()?;

            if let Some(parent_id) = &thread.parent_id {
                let exists: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM threads WHERE id = ?1)",
                    rusqlite::params![parent_id],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(StoreError::NotFound {
                        entity: "thread",
                        id: parent_id.clone(),
                    });
                }
            }

            let author_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE storage_key = ?1)",
                rusqlite::params![thread.author_key],
                |row| row.get(0),
            )?;
            if !author_exists {
                return Err(StoreError::NotFound {
                    entity: "user",
                    id: thread.author_key.clone(),
                });
            }

            tx.execute(
                "INSERT INTO threads (id, author_key, text, parent_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    thread.id,
                    thread.author_key,
                    thread.text,
                    thread.parent_id,
                    thread.created_at
                ],
            )?;
            tx.commit()?;

            debug!(thread_id = %thread.id, reply = thread.parent_id.is_some(), "thread created");
            Ok(thread)
        })
        .await
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> (ThreadStore, Database) {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        db.execute(|conn| {
            conn.execute(
                "INSERT INTO users (storage_key, id, username, name, created_at, updated_at) \
                 VALUES ('key-ann', 'ann', 'ann', 'Ann', 0, 0)",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();
        (ThreadStore::new(Connector::with_database(db.clone())), db)
    }

    #[tokio::test]
    async fn create_and_get_thread() {
        let (store, _db) = setup().await;
        let thread = store.create_thread("key-ann", "first post").await.unwrap();
        assert!(thread.parent_id.is_none());

        let fetched = store.get_thread(&thread.id).await.unwrap().unwrap();
        assert_eq!(fetched, thread);
    }

    #[tokio::test]
    async fn reply_links_parent() {
        let (store, _db) = setup().await;
        let parent = store.create_thread("key-ann", "post").await.unwrap();
        let reply = store.add_reply(&parent.id, "key-ann", "reply").await.unwrap();
        assert_eq!(reply.parent_id.as_deref(), Some(parent.id.as_str()));
    }

    #[tokio::test]
    async fn reply_to_missing_parent_is_not_found() {
        let (store, _db) = setup().await;
        let err = store.add_reply("gone", "key-ann", "reply").await.unwrap_err();
        match err {
            StoreError::NotFound { entity, .. } => assert_eq!(entity, "thread"),
            other => panic!("expected NotFound, got: {other}"),
        }
    }

    #[tokio::test]
    async fn unknown_author_is_not_found() {
        let (store, _db) = setup().await;
        let err = store.create_thread("key-nobody", "post").await.unwrap_err();
        match err {
            StoreError::NotFound { entity, .. } => assert_eq!(entity, "user"),
            other => panic!("expected NotFound, got: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_text_rejected() {
        let (store, _db) = setup().await;
        let err = store.create_thread("key-ann", "   ").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }
}
