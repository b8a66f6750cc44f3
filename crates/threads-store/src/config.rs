//! Store configuration.
//!
//! The only setting is the database connection URL, read from
//! `DATABASE_URL`. A missing URL is not an error here: the connector
//! treats it as "nothing to connect to" and operations fail later.

use std::path::PathBuf;

use crate::error::{StoreError, StoreResult};

/// Environment variable holding the connection URL.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Settings for [`Connector`](crate::Connector).
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub database_url: Option<String>,
}

impl StoreConfig {
    /// Config pointing at `url`.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            database_url: Some(url.into()),
        }
    }

    /// Read the config from the process environment.
    ///
    /// Blank values count as unset.
    pub fn from_env() -> Self {
        let database_url = std::env::var(DATABASE_URL_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        Self { database_url }
    }

    /// The configured URL, if any, as a database target.
    pub fn target(&self) -> Option<StoreResult<DatabaseTarget>> {
        self.database_url.as_deref().map(DatabaseTarget::parse)
    }
}

/// Where a connection URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Memory,
    File(PathBuf),
}

impl DatabaseTarget {
    /// Parse `sqlite::memory:`, `:memory:`, `sqlite://<path>`,
    /// `sqlite:<path>` or a bare path.
    pub fn parse(url: &str) -> StoreResult<Self> {
        let url = url.trim();
        if url == ":memory:" || url == "sqlite::memory:" {
            return Ok(Self::Memory);
        }

        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);

        if path.is_empty() {
            return Err(StoreError::Connection(format!(
                "database url has no path: {url}"
            )));
        }
        if let Some((scheme, _)) = path.split_once("://") {
            return Err(StoreError::Connection(format!(
                "unsupported database scheme: {scheme}"
            )));
        }

        Ok(Self::File(PathBuf::from(path)))
    }
}
