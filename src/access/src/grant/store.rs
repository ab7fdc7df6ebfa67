//! Grant store: cached, normalized access to a subject's grants

use super::cache::{CacheConfig, CacheStats, GrantCache};
use super::set::{GrantSet, PermissionGrant};
use super::source::GrantSource;
use crate::error::{AccessError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Read-mostly repository of permission grants
///
/// A cache miss fetches inline from the [`GrantSource`], bounded by the
/// fetch timeout. Every row is normalized through
/// [`PermissionGrant::from_row`] before it is cached.
pub struct GrantStore {
    source: Arc<dyn GrantSource>,
    cache: GrantCache,
    fetch_timeout: Duration,
}

impl GrantStore {
    /// Create a store over a source with the given cache settings
    pub fn new(source: Arc<dyn GrantSource>, config: &CacheConfig) -> Self {
        Self::with_cache(source, GrantCache::from_config(config), config.fetch_timeout)
    }

    /// Create a store over a source and an explicit cache context
    pub fn with_cache(source: Arc<dyn GrantSource>, cache: GrantCache, fetch_timeout: Duration) -> Self {
        Self {
            source,
            cache,
            fetch_timeout,
        }
    }

    /// Grants of a subject
    ///
    /// # Errors
    ///
    /// `StoreUnavailable` when the backing fetch fails or times out. A
    /// failed fetch is never cached, and neither is a fetch that an
    /// [`GrantStore::invalidate`] overtook.
    pub async fn grants_for(&self, subject_id: &str) -> Result<Arc<GrantSet>> {
        if let Some(grants) = self.cache.get(subject_id) {
            debug!("Grant cache hit for subject={}", subject_id);
            return Ok(grants);
        }

        let generation = self.cache.generation(subject_id);

        let rows = match tokio::time::timeout(self.fetch_timeout, self.source.fetch_grants(subject_id)).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => {
                warn!("Grant fetch failed for subject={}: {}", subject_id, e);
                return Err(AccessError::StoreUnavailable(e.to_string()));
            }
            Err(_) => {
                warn!(
                    "Grant fetch for subject={} timed out after {:?}",
                    subject_id, self.fetch_timeout
                );
                return Err(AccessError::StoreUnavailable(format!(
                    "fetch timed out after {:?}",
                    self.fetch_timeout
                )));
            }
        };

        let mut grants = Vec::with_capacity(rows.len());
        for row in &rows {
            if row.subject_id != subject_id {
                warn!(
                    "Ignoring grant row for subject={} returned while fetching subject={}",
                    row.subject_id, subject_id
                );
                continue;
            }
            match PermissionGrant::from_row(row) {
                Ok(grant) => grants.push(grant),
                Err(e) => warn!("Ignoring malformed grant row for subject={}: {}", subject_id, e),
            }
        }

        debug!("Fetched {} grants for subject={}", grants.len(), subject_id);
        let set = Arc::new(GrantSet::new(grants));
        if !self.cache.put_if_current(subject_id, set.clone(), generation) {
            debug!(
                "Not caching grants for subject={}: invalidated during fetch",
                subject_id
            );
        }
        Ok(set)
    }

    /// Invalidate one subject's cached grants after an administrative change
    pub fn invalidate(&self, subject_id: &str) {
        if self.cache.invalidate(subject_id) {
            info!("Grant cache invalidated for subject={}", subject_id);
        }
    }

    /// Drop every cached grant set
    pub fn clear(&self) {
        self.cache.clear();
        info!("Grant cache cleared");
    }

    /// Cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::{GrantRow, GrantValue, InMemoryGrantSource};
    use crate::path::ResourcePath;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct CountingSource {
        inner: InMemoryGrantSource,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl GrantSource for CountingSource {
        async fn fetch_grants(&self, subject_id: &str) -> Result<Vec<GrantRow>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_grants(subject_id).await
        }
    }

    struct SlowSource;

    #[async_trait]
    impl GrantSource for SlowSource {
        async fn fetch_grants(&self, _subject_id: &str) -> Result<Vec<GrantRow>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    fn config() -> CacheConfig {
        CacheConfig {
            fetch_timeout: Duration::from_millis(50),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_normalizes_and_caches() {
        let source = Arc::new(CountingSource {
            inner: InMemoryGrantSource::with_rows(vec![
                GrantRow::new("u-1", "/families", None, json!("Yes")),
                GrantRow::new("u-1", "not-a-path", None, json!("Yes")),
            ]),
            fetches: AtomicUsize::new(0),
        });
        let store = GrantStore::new(source.clone(), &config());

        let grants = store.grants_for("u-1").await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants.grants()[0].value, GrantValue::Granted);

        store.grants_for("u-1").await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        store.invalidate("u-1");
        store.grants_for("u-1").await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_is_store_unavailable() {
        let store = GrantStore::new(Arc::new(SlowSource), &config());

        let result = store.grants_for("u-1").await;
        assert!(matches!(result, Err(AccessError::StoreUnavailable(_))));
        assert_eq!(store.cache_stats().entries, 0);
    }

    /// Snapshots its rows, then parks until released
    struct GatedSource {
        inner: InMemoryGrantSource,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl GrantSource for GatedSource {
        async fn fetch_grants(&self, subject_id: &str) -> Result<Vec<GrantRow>> {
            let rows = self.inner.fetch_grants(subject_id).await?;
            self.entered.notify_one();
            self.release.notified().await;
            Ok(rows)
        }
    }

    #[tokio::test]
    async fn test_invalidate_during_fetch_discards_stale_rows() {
        let source = Arc::new(GatedSource {
            inner: InMemoryGrantSource::new(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let store = Arc::new(GrantStore::new(source.clone(), &CacheConfig::default()));

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.grants_for("u-1").await })
        };
        source.entered.notified().await;

        source.inner.put(GrantRow::new("u-1", "/loans", None, json!("Yes"))).await;
        store.invalidate("u-1");
        source.release.notify_one();

        let stale = pending.await.unwrap().unwrap();
        assert!(stale.is_empty());
        assert_eq!(store.cache_stats().entries, 0);
        assert_eq!(store.cache_stats().stale_fills, 1);

        // Next fetch goes through the gate again
        source.release.notify_one();
        let fresh = store.grants_for("u-1").await.unwrap();
        assert_eq!(fresh.len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_rows_are_ignored() {
        let source = Arc::new(InMemoryGrantSource::new());
        source.put(GrantRow::new("u-1", "/loans", None, json!(1))).await;
        let store = GrantStore::new(source, &config());

        let grants = store.grants_for("u-1").await.unwrap();
        let path = ResourcePath::new("/loans/3").unwrap();
        assert_eq!(grants.resolve(&path, None), Some(GrantValue::Granted));
        assert!(store.grants_for("u-2").await.unwrap().is_empty());
    }
}
