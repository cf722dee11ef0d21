//! Wishlist of product ids, kept in client storage.

use std::sync::{Arc, Mutex};

use threadline_core::{Cart, Product, ProductId};
use tokio::sync::watch;
use tracing::instrument;

use crate::cart::CartService;
use crate::error::{Result, StorefrontError};
use crate::notify::{Notification, SharedNotifier};
use crate::storage::{KeyValueStore, StorageError, keys, load_json, save_json};

/// Saved products. Adding one to the cart keeps it on the wishlist.
pub struct Wishlist {
    storage: Arc<dyn KeyValueStore>,
    ids: Mutex<Vec<ProductId>>,
    cart: Arc<CartService>,
    notifier: SharedNotifier,
    count: watch::Sender<usize>,
}

impl std::fmt::Debug for Wishlist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wishlist")
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

impl Wishlist {
    /// Load the wishlist. A missing or unreadable value loads as empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store itself cannot be read.
    pub fn load(
        storage: Arc<dyn KeyValueStore>,
        cart: Arc<CartService>,
        notifier: SharedNotifier,
    ) -> std::result::Result<Self, StorageError> {
        let ids: Vec<ProductId> = load_json(storage.as_ref(), keys::WISHLIST)?.unwrap_or_default();
        let (count, _) = watch::channel(ids.len());
        Ok(Self {
            storage,
            ids: Mutex::new(ids),
            cart,
            notifier,
            count,
        })
    }

    /// Saved ids, oldest first.
    #[must_use]
    pub fn ids(&self) -> Vec<ProductId> {
        self.ids.lock().map(|ids| ids.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.ids.lock().is_ok_and(|ids| ids.contains(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        *self.count.borrow()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to the item count (navbar badge).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }

    /// Save a product. Saving it twice keeps one entry.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the wishlist cannot be written.
    pub fn add(&self, id: &ProductId) -> Result<bool> {
        let added = self
            .apply(|ids| {
                if ids.contains(id) {
                    false
                } else {
                    ids.push(id.clone());
                    true
                }
            })
            .map_err(|e| StorefrontError::from(e).surface(self.notifier.as_ref()))?;
        if added {
            self.notifier.notify(Notification::success(
                "Added to Wishlist",
                "Item has been added to your wishlist.",
            ));
        }
        Ok(added)
    }

    /// Forget a product.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the wishlist cannot be written.
    pub fn remove(&self, id: &ProductId) -> Result<bool> {
        let removed = self
            .apply(|ids| {
                let before = ids.len();
                ids.retain(|saved| saved != id);
                ids.len() != before
            })
            .map_err(|e| StorefrontError::from(e).surface(self.notifier.as_ref()))?;
        if removed {
            self.notifier.notify(Notification::success(
                "Removed from Wishlist",
                "Item has been removed from your wishlist.",
            ));
        }
        Ok(removed)
    }

    /// Forget everything.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the wishlist cannot be written.
    pub fn clear(&self) -> Result<()> {
        let mut ids = self
            .ids
            .lock()
            .map_err(|_| StorefrontError::from(StorageError::Poisoned))?;
        self.storage
            .remove(keys::WISHLIST)
            .map_err(|e| StorefrontError::from(e).surface(self.notifier.as_ref()))?;
        ids.clear();
        self.count.send_replace(0);
        self.notifier.notify(Notification::success(
            "Wishlist Cleared",
            "All items have been removed from your wishlist.",
        ));
        Ok(())
    }

    /// Add one unit of a saved product to the cart.
    ///
    /// # Errors
    ///
    /// Returns `OutOfStock` (shows "Out of Stock") when the product has no
    /// stock, otherwise whatever [`CartService::add`] returns.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn move_to_cart(&self, product: &Product) -> Result<Cart> {
        if !product.in_stock() {
            return Err(StorefrontError::OutOfStock(product.id.to_string())
                .surface(self.notifier.as_ref()));
        }
        self.cart.add(product.to_line_item()).await
    }

    /// Add every in-stock product to the cart. Returns how many were added.
    ///
    /// # Errors
    ///
    /// Stops at the first cart error.
    pub async fn move_all_in_stock(&self, products: &[Product]) -> Result<usize> {
        let mut moved = 0;
        for product in products.iter().filter(|p| p.in_stock()) {
            self.cart.add(product.to_line_item()).await?;
            moved += 1;
        }
        Ok(moved)
    }

    fn apply(
        &self,
        op: impl FnOnce(&mut Vec<ProductId>) -> bool,
    ) -> std::result::Result<bool, StorageError> {
        let mut guard = self.ids.lock().map_err(|_| StorageError::Poisoned)?;
        let mut next = guard.clone();
        if !op(&mut next) {
            return Ok(false);
        }
        save_json(self.storage.as_ref(), keys::WISHLIST, &next)?;
        self.count.send_replace(next.len());
        *guard = next;
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use threadline_core::{Identity, Price};

    use super::*;
    use crate::cart::LocalCartStore;
    use crate::notify::RecordingNotifier;
    use crate::remote::MemoryBackend;
    use crate::session::{FixedIdentityProvider, SessionGate};
    use crate::storage::MemoryStore;

    fn wishlist(storage: Arc<dyn KeyValueStore>) -> (Wishlist, Arc<CartService>, RecordingNotifier) {
        let notifier = RecordingNotifier::new();
        let session = Arc::new(SessionGate::new(Arc::new(FixedIdentityProvider::new(
            Identity::new("u1"),
        ))));
        let cart = Arc::new(CartService::new(
            session,
            LocalCartStore::load(Arc::clone(&storage)).unwrap(),
            Arc::new(MemoryBackend::new()),
            Arc::new(notifier.clone()),
        ));
        let list = Wishlist::load(storage, Arc::clone(&cart), Arc::new(notifier.clone())).unwrap();
        (list, cart, notifier)
    }

    #[test]
    fn test_add_remove_persist() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let (list, _, notifier) = wishlist(Arc::clone(&storage));

        assert!(list.add(&ProductId::new("1")).unwrap());
        assert!(!list.add(&ProductId::new("1")).unwrap());
        assert!(list.add(&ProductId::new("3")).unwrap());
        assert!(list.remove(&ProductId::new("1")).unwrap());

        assert_eq!(storage.get(keys::WISHLIST).unwrap().as_deref(), Some("[\"3\"]"));
        let (reloaded, _, _) = wishlist(storage);
        assert!(reloaded.contains(&ProductId::new("3")));
        assert_eq!(reloaded.len(), 1);
        assert_eq!(
            notifier.titles(),
            vec!["Added to Wishlist", "Added to Wishlist", "Removed from Wishlist"]
        );
    }

    #[tokio::test]
    async fn test_out_of_stock_never_reaches_cart() {
        let (list, cart, notifier) = wishlist(Arc::new(MemoryStore::new()));
        let sold_out = Product::new("4", "Linen Shirt", Price::new(2499), 0);

        let err = list.move_to_cart(&sold_out).await.unwrap_err();
        assert!(matches!(err, StorefrontError::OutOfStock(_)));
        assert!(cart.get_cart().is_empty());
        assert_eq!(notifier.titles(), vec!["Out of Stock"]);
    }

    #[tokio::test]
    async fn test_move_all_skips_out_of_stock() {
        let (list, cart, _) = wishlist(Arc::new(MemoryStore::new()));
        let products = [
            Product::new("1", "Tee", Price::new(999), 10),
            Product::new("4", "Linen Shirt", Price::new(2499), 0),
            Product::new("2", "Cap", Price::new(499), 5),
        ];

        assert_eq!(list.move_all_in_stock(&products).await.unwrap(), 2);
        assert_eq!(cart.get_cart().item_count(), 2);
    }

    #[test]
    fn test_clear_empties_and_notifies() {
        let (list, _, notifier) = wishlist(Arc::new(MemoryStore::new()));
        list.add(&ProductId::new("1")).unwrap();
        let mut count = list.subscribe();

        list.clear().unwrap();
        assert!(list.is_empty());
        assert!(count.has_changed().unwrap());
        assert_eq!(*count.borrow_and_update(), 0);
        assert_eq!(notifier.titles().last().unwrap(), "Wishlist Cleared");
    }
}
