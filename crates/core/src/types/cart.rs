//! Cart line items and the ordered cart they live in.
//!
//! The same [`Cart`] type backs the guest cart (client storage) and the
//! snapshot of the remote per-user cart, so both follow one set of rules:
//!
//! - A line is identified by `(product id, size)`. The same product in two
//!   sizes is two lines.
//! - Quantity is always at least 1. Updating to zero or below removes the
//!   line instead of storing it.
//! - Lines keep insertion order for display.

use serde::{Deserialize, Serialize};

use super::{Price, ProductId};

/// One cart entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Product identifier.
    pub id: ProductId,
    /// Product display name.
    pub name: String,
    /// Unit price in minor currency units.
    pub price: Price,
    /// Units of this line; never zero inside a [`Cart`].
    pub quantity: u32,
    /// Selected size, if the product is sized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Product image.
    #[serde(rename = "imageURL", default)]
    pub image_url: String,
}

impl CartLineItem {
    /// Create a line item with quantity 1 and no size.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Price) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            quantity: 1,
            size: None,
            image_url: String::new(),
        }
    }

    /// Set the quantity.
    #[must_use]
    pub const fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Set the size.
    #[must_use]
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Set the image URL.
    #[must_use]
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = url.into();
        self
    }

    /// The `(id, size)` identity of this line.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey {
            id: self.id.clone(),
            size: self.size.clone(),
        }
    }

    /// Whether this line has the given `(id, size)` identity.
    #[must_use]
    pub fn matches(&self, id: &ProductId, size: Option<&str>) -> bool {
        &self.id == id && self.size.as_deref() == size
    }

    /// `price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price * self.quantity
    }
}

/// Identity of a cart line: product id plus optional size.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl LineKey {
    /// Create a key.
    #[must_use]
    pub fn new(id: impl Into<ProductId>, size: Option<&str>) -> Self {
        Self {
            id: id.into(),
            size: size.map(str::to_owned),
        }
    }

    /// Borrow the size.
    #[must_use]
    pub fn size(&self) -> Option<&str> {
        self.size.as_deref()
    }
}

/// An ordered sequence of line items.
///
/// Serializes as a bare JSON array of line items.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<CartLineItem>", into = "Vec<CartLineItem>")]
pub struct Cart {
    lines: Vec<CartLineItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart from raw lines, merging duplicate keys and dropping
    /// zero-quantity lines so the invariants hold for untrusted input.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLineItem>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            cart.add(line);
        }
        cart
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLineItem] {
        &self.lines
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of quantities across lines (the cart badge count).
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.quantity))
    }

    /// `Σ price × quantity`.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(CartLineItem::line_total).sum()
    }

    /// Find the line with the given identity.
    #[must_use]
    pub fn find(&self, id: &ProductId, size: Option<&str>) -> Option<&CartLineItem> {
        self.lines.iter().find(|line| line.matches(id, size))
    }

    /// Add a line, merging into an existing `(id, size)` line by adding the
    /// incoming quantity.
    ///
    /// Returns `false` (and leaves the cart untouched) when the incoming
    /// quantity is zero.
    pub fn add(&mut self, item: CartLineItem) -> bool {
        if item.quantity == 0 {
            return false;
        }

        if let Some(existing) = self
            .lines
            .iter_mut()
            .find(|line| line.matches(&item.id, item.size.as_deref()))
        {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            self.lines.push(item);
        }
        true
    }

    /// Set the quantity of a line. A quantity of zero or below removes it;
    /// anything above `u32::MAX` is clamped to it.
    ///
    /// Returns whether the cart changed. Updating a line that is not in the
    /// cart is a no-op.
    pub fn update_quantity(&mut self, id: &ProductId, size: Option<&str>, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove(id, size);
        }
        let quantity = clamp_quantity(quantity);

        match self.lines.iter_mut().find(|line| line.matches(id, size)) {
            Some(line) if line.quantity != quantity => {
                line.quantity = quantity;
                true
            }
            _ => false,
        }
    }

    /// Remove a line. Returns whether a line was removed; absence is not an
    /// error.
    pub fn remove(&mut self, id: &ProductId, size: Option<&str>) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| !line.matches(id, size));
        self.lines.len() != before
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Consume the cart, returning its lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<CartLineItem> {
        self.lines
    }
}

/// Clamp a positive requested quantity into the stored range.
#[must_use]
pub fn clamp_quantity(quantity: i64) -> u32 {
    u32::try_from(quantity.max(0)).unwrap_or(u32::MAX)
}

impl From<Vec<CartLineItem>> for Cart {
    fn from(lines: Vec<CartLineItem>) -> Self {
        Self::from_lines(lines)
    }
}

impl From<Cart> for Vec<CartLineItem> {
    fn from(cart: Cart) -> Self {
        cart.lines
    }
}

impl<'a> IntoIterator for &'a Cart {
    type Item = &'a CartLineItem;
    type IntoIter = std::slice::Iter<'a, CartLineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tee() -> CartLineItem {
        CartLineItem::new("1", "Premium Cotton T-Shirt", Price::new(1999)).with_size("M")
    }

    fn hoodie() -> CartLineItem {
        CartLineItem::new("3", "Luxury Hoodie", Price::new(2999))
    }

    #[test]
    fn test_add_same_key_increments_quantity() {
        let mut cart = Cart::new();
        cart.add(tee());
        cart.add(tee());

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines().first().unwrap().quantity, 2);
    }

    #[test]
    fn test_add_different_size_is_a_new_line() {
        let mut cart = Cart::new();
        cart.add(tee());
        cart.add(tee().with_size("L"));
        cart.add(CartLineItem::new("1", "Premium Cotton T-Shirt", Price::new(1999)));

        assert_eq!(cart.len(), 3);
    }

    #[test]
    fn test_add_zero_quantity_is_ignored() {
        let mut cart = Cart::new();
        assert!(!cart.add(hoodie().with_quantity(0)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_insertion_order_is_preserved() {
        let mut cart = Cart::new();
        cart.add(hoodie());
        cart.add(tee());
        cart.add(hoodie());

        let ids: Vec<_> = cart.lines().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1"]);
    }

    #[test]
    fn test_update_quantity_sets_verbatim() {
        let mut cart = Cart::new();
        cart.add(tee());
        assert!(cart.update_quantity(&ProductId::new("1"), Some("M"), 5));
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn test_update_quantity_non_positive_equals_remove() {
        for q in [0, -1, -40] {
            let mut updated = Cart::new();
            updated.add(tee());
            updated.add(hoodie());
            let mut removed = updated.clone();

            updated.update_quantity(&ProductId::new("1"), Some("M"), q);
            removed.remove(&ProductId::new("1"), Some("M"));

            assert_eq!(updated, removed);
        }
    }

    #[test]
    fn test_update_quantity_above_u32_range_clamps() {
        let mut cart = Cart::new();
        cart.add(tee());

        assert!(cart.update_quantity(&ProductId::new("1"), Some("M"), 5_000_000_000));
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.find(&ProductId::new("1"), Some("M")).unwrap().quantity, u32::MAX);
    }

    #[test]
    fn test_clamp_quantity_bounds() {
        assert_eq!(clamp_quantity(-3), 0);
        assert_eq!(clamp_quantity(7), 7);
        assert_eq!(clamp_quantity(i64::from(u32::MAX) + 1), u32::MAX);
    }

    #[test]
    fn test_update_missing_line_is_noop() {
        let mut cart = Cart::new();
        cart.add(hoodie());
        assert!(!cart.update_quantity(&ProductId::new("9"), None, 3));
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut cart = Cart::new();
        cart.add(tee());
        assert!(!cart.remove(&ProductId::new("1"), None));
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn test_subtotal_tracks_every_mutation() {
        let mut cart = Cart::new();
        let check = |cart: &Cart| {
            let expected: i64 = cart
                .lines()
                .iter()
                .map(|l| l.price.amount() * i64::from(l.quantity))
                .sum();
            assert_eq!(cart.subtotal().amount(), expected);
        };

        cart.add(tee());
        check(&cart);
        cart.add(hoodie().with_quantity(3));
        check(&cart);
        cart.update_quantity(&ProductId::new("3"), None, 1);
        check(&cart);
        cart.add(tee());
        check(&cart);
        cart.remove(&ProductId::new("1"), Some("M"));
        check(&cart);
        cart.clear();
        check(&cart);
        assert_eq!(cart.subtotal(), Price::ZERO);
    }

    #[test]
    fn test_json_matches_browser_storage_format() {
        let mut cart = Cart::new();
        cart.add(tee().with_image_url("https://img/1.jpg"));
        cart.add(hoodie());

        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"id": "1", "name": "Premium Cotton T-Shirt", "price": 1999, "quantity": 1, "size": "M", "imageURL": "https://img/1.jpg"},
                {"id": "3", "name": "Luxury Hoodie", "price": 2999, "quantity": 1, "imageURL": ""}
            ])
        );
    }

    #[test]
    fn test_deserialize_normalizes_untrusted_lines() {
        let json = r#"[
            {"id": "1", "name": "Tee", "price": 100, "quantity": 1, "imageURL": ""},
            {"id": "1", "name": "Tee", "price": 100, "quantity": 2, "imageURL": ""},
            {"id": "2", "name": "Cap", "price": 50, "quantity": 0, "imageURL": ""}
        ]"#;
        let cart: Cart = serde_json::from_str(json).unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.item_count(), 3);
    }
}
