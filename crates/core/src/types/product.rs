//! Catalog products as the wishlist sees them.

use serde::{Deserialize, Serialize};

use super::{CartLineItem, Price, ProductId};

/// A purchasable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    /// Units available; zero means out of stock.
    #[serde(default)]
    pub stock: u32,
    #[serde(rename = "imageURL", default)]
    pub image_url: String,
}

impl Product {
    #[must_use]
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Price, stock: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock,
            image_url: String::new(),
        }
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// A quantity-1, unsized cart line for this product.
    #[must_use]
    pub fn to_line_item(&self) -> CartLineItem {
        CartLineItem::new(self.id.clone(), self.name.clone(), self.price)
            .with_image_url(self.image_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_item_from_product() {
        let product = Product::new("4", "Linen Shirt", Price::new(2499), 0);
        let line = product.to_line_item();

        assert!(!product.in_stock());
        assert_eq!(line.quantity, 1);
        assert_eq!(line.size, None);
        assert_eq!(line.price, Price::new(2499));
    }
}
