//! Guest cart kept in client storage.

use std::sync::{Arc, Mutex};

use threadline_core::{Cart, CartLineItem, ProductId};
use tracing::debug;

use crate::storage::{KeyValueStore, StorageError, keys, load_json, save_json};

/// In-memory guest cart written through to the `cart` storage key.
///
/// Every mutation is applied to a copy, persisted, and only then made
/// visible, so the in-memory cart never runs ahead of storage.
pub struct LocalCartStore {
    storage: Arc<dyn KeyValueStore>,
    cart: Mutex<Cart>,
}

impl std::fmt::Debug for LocalCartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCartStore")
            .field("cart", &self.cart)
            .finish_non_exhaustive()
    }
}

impl LocalCartStore {
    /// Load the guest cart. A missing or unreadable value loads as empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store itself cannot be read.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let cart = load_json::<Cart>(storage.as_ref(), keys::CART)?.unwrap_or_default();
        debug!(lines = cart.len(), "Loaded guest cart");
        Ok(Self {
            storage,
            cart: Mutex::new(cart),
        })
    }

    /// Snapshot of the guest cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.cart.lock().map(|cart| cart.clone()).unwrap_or_default()
    }

    /// Merge a line into the cart. Returns whether the cart changed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write-through fails; the cart is unchanged.
    pub fn add(&self, item: CartLineItem) -> Result<bool, StorageError> {
        self.apply(|cart| cart.add(item))
    }

    /// Set a line's quantity; zero or less removes it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write-through fails; the cart is unchanged.
    pub fn update_quantity(
        &self,
        id: &ProductId,
        size: Option<&str>,
        quantity: i64,
    ) -> Result<bool, StorageError> {
        self.apply(|cart| cart.update_quantity(id, size, quantity))
    }

    /// Remove a line. Removing a missing line changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write-through fails; the cart is unchanged.
    pub fn remove(&self, id: &ProductId, size: Option<&str>) -> Result<bool, StorageError> {
        self.apply(|cart| cart.remove(id, size))
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write-through fails; the cart is unchanged.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.replace(Cart::new())
    }

    /// Replace the whole cart.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write-through fails; the cart is unchanged.
    pub fn replace(&self, cart: Cart) -> Result<(), StorageError> {
        self.apply(move |current| {
            *current = cart;
            true
        })
        .map(drop)
    }

    fn apply(&self, op: impl FnOnce(&mut Cart) -> bool) -> Result<bool, StorageError> {
        let mut guard = self.cart.lock().map_err(|_| StorageError::Poisoned)?;
        let mut next = guard.clone();
        if !op(&mut next) {
            return Ok(false);
        }
        save_json(self.storage.as_ref(), keys::CART, &next)?;
        *guard = next;
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use threadline_core::Price;

    use super::*;
    use crate::storage::{FileStore, MemoryStore};

    fn tee() -> CartLineItem {
        CartLineItem::new("1", "Tee", Price::new(1999)).with_size("M")
    }

    #[test]
    fn test_mutations_write_through() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let store = LocalCartStore::load(Arc::clone(&storage)).unwrap();

        assert!(store.add(tee()).unwrap());
        assert!(store.add(tee().with_quantity(2)).unwrap());

        let reloaded = LocalCartStore::load(Arc::clone(&storage)).unwrap();
        assert_eq!(reloaded.cart().item_count(), 3);
        assert_eq!(reloaded.cart().len(), 1);
    }

    #[test]
    fn test_update_to_zero_removes_line() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let store = LocalCartStore::load(Arc::clone(&storage)).unwrap();
        store.add(tee()).unwrap();

        assert!(store.update_quantity(&ProductId::new("1"), Some("M"), 0).unwrap());
        assert!(store.cart().is_empty());
        assert_eq!(storage.get(keys::CART).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_missing_line_is_noop() {
        let store = LocalCartStore::load(Arc::new(MemoryStore::new())).unwrap();
        assert!(!store.remove(&ProductId::new("9"), None).unwrap());
        assert!(!store.update_quantity(&ProductId::new("9"), None, 3).unwrap());
    }

    #[test]
    fn test_corrupt_storage_loads_empty() {
        let storage = Arc::new(MemoryStore::new());
        storage.set(keys::CART, "[{\"id\":").unwrap();

        let store = LocalCartStore::load(storage).unwrap();
        assert!(store.cart().is_empty());
    }

    #[test]
    fn test_persists_across_file_store_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalCartStore::load(Arc::new(FileStore::open(dir.path()).unwrap())).unwrap();
            store.add(tee()).unwrap();
        }

        let store = LocalCartStore::load(Arc::new(FileStore::open(dir.path()).unwrap())).unwrap();
        assert_eq!(store.cart().lines()[0].name, "Tee");
    }
}
