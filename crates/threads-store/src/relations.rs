//! Queries that join users and threads: a profile's threads with their
//! replies, and the replies other people left on a user's threads.
//!
//! Authors are only ever resolved to [`AuthorSummary`].

use std::collections::HashMap;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{StoreError, StoreResult};
use crate::thread_store::{Thread, thread_from_row};
use crate::user_store::{User, UserStore, find_by_external_id};

/// The author fields exposed alongside a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: String,
    pub name: String,
    pub image: String,
}

/// A thread with its author resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(flatten)]
    pub thread: Thread,
    pub author: AuthorSummary,
}

/// A top-level thread with its direct replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadWithReplies {
    #[serde(flatten)]
    pub thread: Thread,
    pub children: Vec<Reply>,
}

/// A user and everything they posted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserThreads {
    pub user: User,
    pub threads: Vec<ThreadWithReplies>,
}

/// Thread columns (aliased `t`) followed by `u.id, u.name, u.image`.
const REPLY_COLUMNS: &str = "t.id, t.author_key, t.text, t.parent_id, t.created_at, u.id, u.name, u.image";

fn reply_from_row(row: &Row<'_>) -> rusqlite::Result<Reply> {
    Ok(Reply {
        thread: thread_from_row(row, 0)?,
        author: AuthorSummary {
            id: row.get(5)?,
            name: row.get(6)?,
            image: row.get(7)?,
        },
    })
}

impl UserStore {
    /// The user's top-level threads, oldest first, each with its replies
    /// and each reply's author. `None` if the user does not exist.
    #[instrument(skip(self))]
    pub async fn get_user_threads(&self, user_id: &str) -> StoreResult<Option<UserThreads>> {
        let user_id = user_id.to_string();
        let lookup = async {
            let db = self.connector.acquire().await?;
            db.execute(move |conn| {
                let Some(user) = find_by_external_id(conn, &user_id)? else {
                    return Ok(None);
                };
                let threads = threads_with_replies(conn, &user.storage_key)?;
                debug!(user_id = %user.id, threads = threads.len(), "user threads loaded");
                Ok(Some(UserThreads { user, threads }))
            })
            .await
        };
        lookup
            .await
            .map_err(|e| StoreError::UserContent(e.to_string()))
    }

    /// Replies by other users to any thread `user_key` authored, oldest
    /// first. Replies the user left on their own threads are excluded.
    ///
    /// `user_key` is the user's `storage_key`, not the external id.
    #[instrument(skip(self))]
    pub async fn get_activity(&self, user_key: &str) -> StoreResult<Vec<Reply>> {
        let user_key = user_key.to_string();
        let lookup = async {
            let db = self.connector.acquire().await?;
            db.execute(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {REPLY_COLUMNS} FROM threads t \
                     JOIN users u ON u.storage_key = t.author_key \
                     WHERE t.parent_id IN (SELECT id FROM threads WHERE author_key = ?1) \
                       AND t.author_key != ?1 \
                     ORDER BY t.created_at, t.rowid"
                ))?;
                let replies = stmt
                    .query_map(rusqlite::params![user_key], reply_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                debug!(replies = replies.len(), "activity loaded");
                Ok(replies)
            })
            .await
        };
        lookup.await.map_err(|e| StoreError::Activity(e.to_string()))
    }
}

fn threads_with_replies(conn: &Connection, storage_key: &str) -> StoreResult<Vec<ThreadWithReplies>> {
    let mut stmt = conn.prepare(
        "SELECT id, author_key, text, parent_id, created_at FROM threads \
         WHERE author_key = ?1 AND parent_id IS NULL \
         ORDER BY created_at, rowid",
    )?;
    let threads = stmt
        .query_map(rusqlite::params![storage_key], |row| thread_from_row(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {REPLY_COLUMNS} FROM threads t \
         JOIN users u ON u.storage_key = t.author_key \
         WHERE t.parent_id IN (SELECT id FROM threads WHERE author_key = ?1 AND parent_id IS NULL) \
         ORDER BY t.created_at, t.rowid"
    ))?;
    let mut children: HashMap<String, Vec<Reply>> = HashMap::new();
    for reply in stmt.query_map(rusqlite::params![storage_key], reply_from_row)? {
        let reply = reply?;
        if let Some(parent_id) = reply.thread.parent_id.clone() {
            children.entry(parent_id).or_default().push(reply);
        }
    }

    Ok(threads
        .into_iter()
        .map(|thread| ThreadWithReplies {
            children: children.remove(&thread.id).unwrap_or_default(),
            thread,
        })
        .collect())
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::connection::Connector;
    use crate::db::Database;
    use crate::thread_store::ThreadStore;
    use crate::user_store::UpsertUser;

    async fn setup() -> (UserStore, ThreadStore) {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        let connector = Connector::with_database(db);
        (UserStore::new(connector.clone()), ThreadStore::new(connector))
    }

    async fn add_user(users: &UserStore, id: &str, name: &str) -> User {
        users
            .upsert_user(UpsertUser {
                user_id: id.into(),
                username: id.into(),
                name: name.into(),
                image: format!("https://img.example/{id}.png"),
                ..Default::default()
            })
            .await
            .unwrap();
        users.get_user(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn user_threads_resolve_replies_and_authors() {
        let (users, threads) = setup().await;
        let ann = add_user(&users, "ann", "Ann").await;
        let bob = add_user(&users, "bob", "Bob").await;

        let post = threads.create_thread(&ann.storage_key, "hello").await.unwrap();
        let quiet = threads.create_thread(&ann.storage_key, "anyone?").await.unwrap();
        threads.add_reply(&post.id, &bob.storage_key, "hi ann").await.unwrap();
        // Bob's own post must not show up under Ann.
        threads.create_thread(&bob.storage_key, "bob's post").await.unwrap();

        let loaded = users.get_user_threads("ann").await.unwrap().unwrap();
        assert_eq!(loaded.user.id, "ann");
        assert_eq!(loaded.user.threads, vec![post.id.clone(), quiet.id.clone()]);
        assert_eq!(loaded.threads.len(), 2);

        let first = &loaded.threads[0];
        assert_eq!(first.thread.id, post.id);
        assert_eq!(first.children.len(), 1);
        assert_eq!(first.children[0].thread.text, "hi ann");
        assert_eq!(
            first.children[0].author,
            AuthorSummary {
                id: "bob".into(),
                name: "Bob".into(),
                image: "https://img.example/bob.png".into(),
            }
        );
        assert!(loaded.threads[1].children.is_empty());
    }

    #[tokio::test]
    async fn user_threads_for_unknown_user_is_none() {
        let (users, _threads) = setup().await;
        assert!(users.get_user_threads("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn activity_excludes_own_replies() {
        let (users, threads) = setup().await;
        let ann = add_user(&users, "ann", "Ann").await;
        let bob = add_user(&users, "bob", "Bob").await;
        let cat = add_user(&users, "cat", "Cat").await;

        let post = threads.create_thread(&ann.storage_key, "post").await.unwrap();
        threads.add_reply(&post.id, &ann.storage_key, "self reply").await.unwrap();
        let from_bob = threads.add_reply(&post.id, &bob.storage_key, "nice").await.unwrap();

        // Replies to Ann's replies count too.
        let ann_reply = threads.create_thread(&cat.storage_key, "cat post").await.unwrap();
        let ann_on_cat = threads
            .add_reply(&ann_reply.id, &ann.storage_key, "hey cat")
            .await
            .unwrap();
        let from_cat = threads
            .add_reply(&ann_on_cat.id, &cat.storage_key, "hey ann")
            .await
            .unwrap();

        let activity = users.get_activity(&ann.storage_key).await.unwrap();
        let ids: Vec<_> = activity.iter().map(|r| r.thread.id.clone()).collect();
        assert_eq!(ids, vec![from_bob.id, from_cat.id]);
        assert!(activity.iter().all(|r| r.thread.author_key != ann.storage_key));
        assert_eq!(activity[0].author.name, "Bob");
    }

    #[tokio::test]
    async fn activity_for_user_without_threads_is_empty() {
        let (users, _threads) = setup().await;
        let ann = add_user(&users, "ann", "Ann").await;
        assert!(users.get_activity(&ann.storage_key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unconfigured_store_wraps_errors() {
        let users = UserStore::new(Connector::new(StoreConfig::default()));

        let err = users.get_user_threads("ann").await.unwrap_err();
        assert!(matches!(err, StoreError::UserContent(_)));

        let err = users.get_activity("key").await.unwrap_err();
        match err {
            StoreError::Activity(msg) => {
                assert!(msg.contains("database connection not established"))
            }
            other => panic!("expected Activity, got: {other}"),
        }
    }
}
