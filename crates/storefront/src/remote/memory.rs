//! In-process remote stores.
//!
//! Behaves like the document store the storefront talks to in production:
//! `add_item` merges by `(id, size)`, removals of missing lines succeed.
//! Failures and latency can be injected so callers' error paths can be
//! exercised without a network.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use threadline_core::{Cart, CartLineItem, ProductId, ScanRecord, UserId};

use super::{RemoteCartStore, RemoteError, RemoteScanStore};

/// In-memory cart and scan store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    carts: Mutex<HashMap<UserId, Cart>>,
    scans: Mutex<HashMap<UserId, Vec<ScanRecord>>>,
    fail_writes: AtomicBool,
    fail_fetches: AtomicBool,
    latency_ms: AtomicU32,
    fetch_calls: AtomicU32,
    scan_saves: AtomicU32,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user's cart.
    pub fn seed_cart(&self, user: &UserId, cart: Cart) {
        if let Ok(mut carts) = self.carts.lock() {
            carts.insert(user.clone(), cart);
        }
    }

    /// Current stored cart for a user (empty if none).
    #[must_use]
    pub fn stored_cart(&self, user: &UserId) -> Cart {
        self.carts
            .lock()
            .ok()
            .and_then(|carts| carts.get(user).cloned())
            .unwrap_or_default()
    }

    /// Stored scans for a user.
    #[must_use]
    pub fn stored_scans(&self, user: &UserId) -> Vec<ScanRecord> {
        self.scans
            .lock()
            .ok()
            .and_then(|scans| scans.get(user).cloned())
            .unwrap_or_default()
    }

    /// Make every write (cart add/remove, scan save) fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every read (cart fetch, scan list) fail.
    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u32::try_from(latency.as_millis()).unwrap_or(u32::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Number of `fetch_cart` calls served so far.
    #[must_use]
    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of successful `save_scan` calls so far.
    #[must_use]
    pub fn scan_saves(&self) -> u32 {
        self.scan_saves.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(u64::from(ms))).await;
        }
    }

    fn check_write(&self) -> Result<(), RemoteError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }

    fn check_fetch(&self) -> Result<(), RemoteError> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable("reads disabled".into()));
        }
        Ok(())
    }

    fn with_cart<T>(&self, user: &UserId, f: impl FnOnce(&mut Cart) -> T) -> Result<T, RemoteError> {
        let mut carts = self
            .carts
            .lock()
            .map_err(|_| RemoteError::Unavailable("cart store poisoned".into()))?;
        Ok(f(carts.entry(user.clone()).or_default()))
    }
}

#[async_trait]
impl RemoteCartStore for MemoryBackend {
    async fn fetch_cart(&self, user: &UserId) -> Result<Cart, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_fetch()?;
        self.with_cart(user, |cart| cart.clone())
    }

    async fn add_item(&self, user: &UserId, item: &CartLineItem) -> Result<(), RemoteError> {
        self.simulate_latency().await;
        self.check_write()?;
        self.with_cart(user, |cart| {
            cart.add(item.clone());
        })
    }

    async fn remove_item(
        &self,
        user: &UserId,
        product: &ProductId,
        size: Option<&str>,
    ) -> Result<(), RemoteError> {
        self.simulate_latency().await;
        self.check_write()?;
        self.with_cart(user, |cart| {
            cart.remove(product, size);
        })
    }

    async fn set_quantity(
        &self,
        user: &UserId,
        product: &ProductId,
        size: Option<&str>,
        quantity: u32,
    ) -> Result<(), RemoteError> {
        self.simulate_latency().await;
        self.check_write()?;
        self.with_cart(user, |cart| {
            cart.update_quantity(product, size, i64::from(quantity));
        })
    }
}

#[async_trait]
impl RemoteScanStore for MemoryBackend {
    async fn list_scans(&self, user: &UserId) -> Result<Vec<ScanRecord>, RemoteError> {
        self.simulate_latency().await;
        self.check_fetch()?;
        Ok(self.stored_scans(user))
    }

    async fn save_scan(&self, user: &UserId, record: &ScanRecord) -> Result<ScanRecord, RemoteError> {
        self.simulate_latency().await;
        self.check_write()?;
        let mut scans = self
            .scans
            .lock()
            .map_err(|_| RemoteError::Unavailable("scan store poisoned".into()))?;
        scans.entry(user.clone()).or_default().push(record.clone());
        self.scan_saves.fetch_add(1, Ordering::SeqCst);
        Ok(record.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use threadline_core::Price;

    use super::*;

    #[tokio::test]
    async fn test_add_merges_and_remove_is_idempotent() {
        let backend = MemoryBackend::new();
        let user = UserId::new("u1");
        let tee = CartLineItem::new("1", "Tee", Price::new(1999)).with_size("M");

        backend.add_item(&user, &tee).await.unwrap();
        backend.add_item(&user, &tee).await.unwrap();
        assert_eq!(backend.fetch_cart(&user).await.unwrap().item_count(), 2);

        backend.remove_item(&user, &tee.id, Some("M")).await.unwrap();
        backend.remove_item(&user, &tee.id, Some("M")).await.unwrap();
        assert!(backend.stored_cart(&user).is_empty());
    }

    #[tokio::test]
    async fn test_set_quantity_updates_in_place() {
        let backend = MemoryBackend::new();
        let user = UserId::new("u1");
        for id in ["1", "2", "3"] {
            backend
                .add_item(&user, &CartLineItem::new(id, "Tee", Price::new(999)))
                .await
                .unwrap();
        }

        backend.set_quantity(&user, &ProductId::new("1"), None, 4).await.unwrap();
        let cart = backend.stored_cart(&user);
        let lines: Vec<_> = cart.lines().iter().map(|l| (l.id.as_str(), l.quantity)).collect();
        assert_eq!(lines, vec![("1", 4), ("2", 1), ("3", 1)]);

        backend.set_fail_writes(true);
        assert!(backend.set_quantity(&user, &ProductId::new("1"), None, 9).await.is_err());
        assert_eq!(
            backend.stored_cart(&user).find(&ProductId::new("1"), None).unwrap().quantity,
            4
        );
    }

    #[tokio::test]
    async fn test_injected_write_failure_leaves_cart_untouched() {
        let backend = MemoryBackend::new();
        let user = UserId::new("u1");
        backend.set_fail_writes(true);

        let result = backend
            .add_item(&user, &CartLineItem::new("1", "Tee", Price::new(1)))
            .await;
        assert!(matches!(result, Err(RemoteError::Unavailable(_))));
        assert!(backend.stored_cart(&user).is_empty());
    }
}
