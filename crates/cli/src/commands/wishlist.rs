//! Wishlist commands.

#![allow(clippy::print_stdout)]

use threadline_core::{Price, Product, ProductId};
use threadline_storefront::Storefront;

use super::CliError;

pub fn list(storefront: &Storefront) {
    let ids = storefront.wishlist().ids();
    if ids.is_empty() {
        println!("Wishlist is empty");
        return;
    }
    for id in ids {
        println!("{id}");
    }
}

pub fn add(storefront: &Storefront, id: &str) -> Result<(), CliError> {
    if !storefront.wishlist().add(&ProductId::new(id))? {
        println!("{id} is already on the wishlist");
    }
    Ok(())
}

pub fn remove(storefront: &Storefront, id: &str) -> Result<(), CliError> {
    if !storefront.wishlist().remove(&ProductId::new(id))? {
        println!("{id} was not on the wishlist");
    }
    Ok(())
}

pub fn clear(storefront: &Storefront) -> Result<(), CliError> {
    storefront.wishlist().clear()?;
    Ok(())
}

/// Add one unit of a saved product to the cart.
///
/// # Errors
///
/// Returns `InvalidArgument` if the product is not on the wishlist, otherwise
/// whatever the cart returns (including out of stock).
pub async fn move_to_cart(
    storefront: &Storefront,
    id: String,
    name: String,
    price: i64,
    stock: u32,
) -> Result<(), CliError> {
    let product = Product::new(id, name, Price::new(price), stock);
    if !storefront.wishlist().contains(&product.id) {
        return Err(CliError::InvalidArgument(format!(
            "{} is not on the wishlist",
            product.id
        )));
    }
    let cart = storefront.wishlist().move_to_cart(&product).await?;
    println!("Cart now holds {} item(s)", cart.item_count());
    Ok(())
}
