//! Cached read path over the remote scan store.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use threadline_core::{ScanRecord, UserId};
use tracing::{debug, instrument};

use crate::error::{Result, StorefrontError};
use crate::remote::{RemoteLimits, RemoteScanStore, bounded, bounded_with_retry};

/// A shopper's scans, newest first.
pub type ScanList = Arc<Vec<ScanRecord>>;

/// Scan history with a 5 minute cache, invalidated on every save.
#[derive(Clone)]
pub struct ScanHistory {
    store: Arc<dyn RemoteScanStore>,
    cache: Cache<UserId, ScanList>,
    limits: RemoteLimits,
}

impl std::fmt::Debug for ScanHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanHistory")
            .field("cached_users", &self.cache.entry_count())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl ScanHistory {
    #[must_use]
    pub fn new(store: Arc<dyn RemoteScanStore>, limits: RemoteLimits) -> Self {
        let cache = Cache::builder()
            .max_capacity(256)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            store,
            cache,
            limits,
        }
    }

    /// All of a shopper's scans, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RemoteFetchFailed` if the store cannot be read.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn history(&self, user: &UserId) -> Result<ScanList> {
        if let Some(scans) = self.cache.get(user).await {
            debug!("Cache hit for scan history");
            return Ok(scans);
        }

        let mut scans = bounded_with_retry(self.limits.timeout, self.limits.fetch_retries, || {
            self.store.list_scans(user)
        })
        .await
        .map_err(StorefrontError::RemoteFetchFailed)?;
        scans.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let scans = Arc::new(scans);
        self.cache.insert(user.clone(), Arc::clone(&scans)).await;
        Ok(scans)
    }

    /// The most recent scan, if any.
    ///
    /// # Errors
    ///
    /// Returns `RemoteFetchFailed` if the store cannot be read.
    pub async fn latest(&self, user: &UserId) -> Result<Option<ScanRecord>> {
        Ok(self.history(user).await?.first().cloned())
    }

    /// Persist a record. Never retried: a replayed save would store a
    /// duplicate scan.
    ///
    /// # Errors
    ///
    /// Returns `RemoteWriteFailed` if the store refuses or times out.
    #[instrument(skip(self, record), fields(user_id = %user, scan_id = %record.scan_id))]
    pub async fn save(&self, user: &UserId, record: &ScanRecord) -> Result<ScanRecord> {
        let stored = bounded(self.limits.timeout, self.store.save_scan(user, record))
            .await
            .map_err(StorefrontError::RemoteWriteFailed)?;
        self.cache.invalidate(user).await;
        Ok(stored)
    }
}
