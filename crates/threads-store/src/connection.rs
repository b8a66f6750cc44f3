//! Shared, lazily established database connection.
//!
//! A [`Connector`] is created once per process and cloned into every
//! store. Each store operation calls [`Connector::ensure_connected`] first,
//! which opens the database on the first call and is a no-op afterwards.
//!
//! Connection failures inside `ensure_connected` are logged and swallowed:
//! the caller carries on and the next query fails with its own error
//! (wrapping [`StoreError::NotConnected`]). Use [`Connector::connect`] to
//! get the connection error itself.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::config::StoreConfig;
use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// Cloneable handle to the process-wide database connection.
#[derive(Clone)]
pub struct Connector {
    inner: Arc<ConnectorInner>,
}

struct ConnectorInner {
    config: StoreConfig,
    db: OnceCell<Database>,
}

impl Connector {
    /// A connector that will connect according to `config` on first use.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(ConnectorInner {
                config,
                db: OnceCell::new(),
            }),
        }
    }

    /// A connector configured from `DATABASE_URL`.
    pub fn from_env() -> Self {
        Self::new(StoreConfig::from_env())
    }

    /// A connector around an already-open database.
    pub fn with_database(db: Database) -> Self {
        Self {
            inner: Arc::new(ConnectorInner {
                config: StoreConfig::default(),
                db: OnceCell::new_with(Some(db)),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn is_connected(&self) -> bool {
        self.inner.db.initialized()
    }

    /// Establish the connection if it is not already up.
    ///
    /// Never fails. Without a configured URL this only logs; a failed
    /// attempt is logged and retried on the next call.
    pub async fn ensure_connected(&self) {
        if self.is_connected() {
            debug!("database connection already established");
            return;
        }
        if self.inner.config.database_url.is_none() {
            info!("database url not configured, skipping connect");
            return;
        }

        match self.connect().await {
            Ok(_) => info!("database connected"),
            Err(err) => error!(%err, "database connection failed"),
        }
    }

    /// Establish the connection, surfacing [`StoreError::Connection`].
    ///
    /// Concurrent first calls are serialized; only one of them opens the
    /// database and the rest observe its result.
    pub async fn connect(&self) -> StoreResult<Database> {
        let config = &self.inner.config;
        let db = self
            .inner
            .db
            .get_or_try_init(|| async move {
                let target = config.target().ok_or_else(|| {
                    StoreError::Connection("database url not configured".into())
                })??;
                Database::open_target(target)
                    .await
                    .map_err(|e| StoreError::Connection(e.to_string()))
            })
            .await?;
        Ok(db.clone())
    }

    /// The established database, or [`StoreError::NotConnected`].
    pub fn database(&self) -> StoreResult<Database> {
        self.inner.db.get().cloned().ok_or(StoreError::NotConnected)
    }

    /// `ensure_connected` followed by `database`: what every store
    /// operation does before touching the database.
    pub(crate) async fn acquire(&self) -> StoreResult<Database> {
        self.ensure_connected().await;
        self.database()
    }
}

// ── tests ────────────────────────────────────────────────────────────
