//! Remote cart and scan stores.
//!
//! # Architecture
//!
//! - The remote per-user cart and the scan records live in an external
//!   document store; this crate only reaches them through [`RemoteCartStore`]
//!   and [`RemoteScanStore`]
//! - [`RestBackend`] implements both over HTTP with `reqwest`
//! - [`MemoryBackend`] implements both in process for tests and demos
//!
//! Every call made by the storefront goes through [`bounded`], which applies
//! the configured timeout so a hung backend surfaces as an error instead of a
//! stuck spinner.

mod memory;
mod rest;

pub use memory::MemoryBackend;
pub use rest::RestBackend;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use threadline_core::{Cart, CartLineItem, ProductId, ScanRecord, UserId};

/// Errors that can occur when talking to the remote stores.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The call did not finish within the configured bound.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend refused the request for another reason (in-memory fakes).
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Per-user cart persistence.
#[async_trait]
pub trait RemoteCartStore: Send + Sync {
    /// Fetch the full cart for a user.
    async fn fetch_cart(&self, user: &UserId) -> Result<Cart, RemoteError>;

    /// Add a line. The store merges into an existing `(id, size)` line.
    async fn add_item(&self, user: &UserId, item: &CartLineItem) -> Result<(), RemoteError>;

    /// Remove a line. Removing a missing line is not an error.
    async fn remove_item(
        &self,
        user: &UserId,
        product: &ProductId,
        size: Option<&str>,
    ) -> Result<(), RemoteError>;

    /// Set the quantity of an existing line in place (quantity is at least 1).
    ///
    /// The update is a single write: the line keeps its position, and a
    /// refused write leaves the stored line as it was.
    async fn set_quantity(
        &self,
        user: &UserId,
        product: &ProductId,
        size: Option<&str>,
        quantity: u32,
    ) -> Result<(), RemoteError>;
}

/// Per-user scan record persistence.
#[async_trait]
pub trait RemoteScanStore: Send + Sync {
    /// List a user's scans in store order.
    async fn list_scans(&self, user: &UserId) -> Result<Vec<ScanRecord>, RemoteError>;

    /// Persist a new scan and return the stored record.
    async fn save_scan(&self, user: &UserId, record: &ScanRecord) -> Result<ScanRecord, RemoteError>;
}

/// Bounds applied to remote calls.
#[derive(Debug, Clone, Copy)]
pub struct RemoteLimits {
    /// Bound on every individual remote call.
    pub timeout: Duration,
    /// Extra attempts for reads.
    pub fetch_retries: u32,
}

impl Default for RemoteLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            fetch_retries: 2,
        }
    }
}

/// Run a remote call under a timeout.
///
/// # Errors
///
/// Returns the call's own error, or `RemoteError::Timeout` if it did not
/// finish within `limit`.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, RemoteError>
where
    F: Future<Output = Result<T, RemoteError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(RemoteError::Timeout(limit)))
}

/// Base delay between read retries; doubles on each attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Run an idempotent remote read with bounded retries and exponential backoff.
///
/// Each attempt is individually bounded by `limit`. Only use this for reads:
/// `add_item` merges quantities and must never be replayed.
///
/// # Errors
///
/// Returns the last attempt's error once `retries` extra attempts are spent.
pub async fn bounded_with_retry<T, F, Fut>(
    limit: Duration,
    retries: u32,
    mut call: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let mut attempt = 0_u32;
    loop {
        match bounded(limit, call()).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries => {
                let delay = RETRY_BASE_DELAY.saturating_mul(2_u32.saturating_pow(attempt));
                tracing::debug!(attempt, error = %e, ?delay, "Retrying remote read");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let result: Result<(), _> = bounded(Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(RemoteError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = bounded_with_retry(Duration::from_secs(1), 2, move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(RemoteError::Unavailable("flaky".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), _> = bounded_with_retry(Duration::from_secs(1), 1, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(RemoteError::Unavailable("down".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
