//! Cart and checkout commands.

#![allow(clippy::print_stdout)]

use threadline_core::{CartLineItem, Price, ProductId};
use threadline_storefront::Storefront;

use super::CliError;

/// Print every line and the pricing breakdown.
pub fn show(storefront: &Storefront) {
    let cart = storefront.cart().get_cart();
    if cart.is_empty() {
        println!("Cart is empty");
        return;
    }

    for line in cart.lines() {
        let size = line.size.as_deref().unwrap_or("-");
        println!(
            "{:<10} {:<28} {:>4} x {:>8} = {:>9}  size {size}",
            line.id,
            line.name,
            line.quantity,
            line.price.display(),
            line.line_total().display(),
        );
    }

    let pricing = storefront.cart().pricing();
    println!();
    println!("Subtotal ({} items): {}", cart.item_count(), pricing.subtotal.display());
    println!("Shipping:            {}", pricing.shipping.display());
    println!("Tax:                 {}", pricing.tax.display());
    println!("Total:               {}", pricing.total.display());
}

/// Add a line.
///
/// # Errors
///
/// Returns `InvalidArgument` for a non-positive price or zero quantity.
pub async fn add(
    storefront: &Storefront,
    id: String,
    name: String,
    price: i64,
    size: Option<String>,
    quantity: u32,
) -> Result<(), CliError> {
    if price <= 0 {
        return Err(CliError::InvalidArgument(format!("price must be positive, got {price}")));
    }
    if quantity == 0 {
        return Err(CliError::InvalidArgument("quantity must be at least 1".to_string()));
    }

    let mut item = CartLineItem::new(id, name, Price::new(price)).with_quantity(quantity);
    if let Some(size) = size {
        item = item.with_size(size);
    }
    storefront.cart().add(item).await?;
    show(storefront);
    Ok(())
}

pub async fn update(
    storefront: &Storefront,
    id: &str,
    size: Option<&str>,
    quantity: i64,
) -> Result<(), CliError> {
    storefront
        .cart()
        .update_quantity(&ProductId::new(id), size, quantity)
        .await?;
    show(storefront);
    Ok(())
}

pub async fn remove(storefront: &Storefront, id: &str, size: Option<&str>) -> Result<(), CliError> {
    storefront.cart().remove(&ProductId::new(id), size).await?;
    show(storefront);
    Ok(())
}

pub async fn clear(storefront: &Storefront) -> Result<(), CliError> {
    storefront.cart().clear().await?;
    println!("Cart cleared");
    Ok(())
}

/// Run the simulated checkout and print the receipt.
///
/// # Errors
///
/// Fails for guests, an empty cart, or when the cart cannot be cleared.
pub async fn checkout(storefront: &Storefront) -> Result<(), CliError> {
    let order = storefront.checkout().checkout().await?;
    println!("Order {} placed at {}", order.order_id, order.placed_at.to_rfc3339());
    println!("Total charged: {}", order.breakdown.total.display());
    Ok(())
}
