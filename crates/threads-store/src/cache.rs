//! Rendered-page cache and the revalidation hook.
//!
//! The store itself caches nothing. Hosts that keep rendered pages around
//! hand a [`Revalidate`] implementation to the
//! [`UserStore`](crate::UserStore) so a profile save can drop the stale page.
//! [`RenderCache`] is a ready-made one on top of `moka`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

/// Invalidate whatever is cached for a UI path.
#[async_trait]
pub trait Revalidate: Send + Sync {
    async fn revalidate_path(&self, path: &str);
}

// ── cache stats ──────────────────────────────────────────────────────

/// Hit/miss counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    revalidations: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Paths dropped through [`Revalidate`].
    pub fn revalidations(&self) -> u64 {
        self.revalidations.load(Ordering::Relaxed)
    }

    /// Between 0.0 and 1.0; 0.0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 {
            return 0.0;
        }
        self.hits() as f64 / total as f64
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} revalidations={} rate={:.2}%",
            self.hits(),
            self.misses(),
            self.revalidations(),
            self.hit_rate() * 100.0,
        )
    }
}

// ── render cache ─────────────────────────────────────────────────────

/// Rendered HTML keyed by UI path.
#[derive(Clone)]
pub struct RenderCache {
    inner: Cache<String, Arc<str>>,
    stats: Arc<CacheStats>,
}

impl RenderCache {
    /// Cache holding at most `max_capacity` pages.
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
            stats: Arc::new(CacheStats::default()),
        }
    }

    pub async fn get(&self, path: &str) -> Option<Arc<str>> {
        let hit = self.inner.get(path).await;
        if hit.is_some() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
        }
        debug!(path, hit = hit.is_some(), "render cache lookup");
        hit
    }

    pub async fn insert(&self, path: &str, html: impl Into<Arc<str>>) {
        self.inner.insert(path.to_string(), html.into()).await;
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[async_trait]
impl Revalidate for RenderCache {
    async fn revalidate_path(&self, path: &str) {
        self.inner.invalidate(path).await;
        self.stats.revalidations.fetch_add(1, Ordering::Relaxed);
        debug!(path, "render cache revalidated");
    }
}

// ── tests ────────────────────────────────────────────────────────────
