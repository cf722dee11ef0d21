//! Pricing and the simulated checkout, end to end.

#![allow(clippy::unwrap_used)]

use threadline_core::{CartLineItem, CheckoutStatus, Price, PricingBreakdown, UserId};
use threadline_integration_tests::{Harness, shopper};
use threadline_storefront::StorefrontError;

fn line(id: &str, price: i64) -> CartLineItem {
    CartLineItem::new(id, format!("Product {id}"), Price::new(price))
}

#[tokio::test]
async fn test_pricing_follows_cart_contents() {
    let h = Harness::new(shopper("u1")).unwrap();
    let cart = h.storefront.cart();

    assert_eq!(cart.pricing(), PricingBreakdown::default());

    cart.add(line("1", 999)).await.unwrap();
    let small = cart.pricing();
    assert_eq!(small.subtotal, Price::new(999));
    assert_eq!(small.shipping, Price::new(200));
    assert_eq!(small.tax, Price::new(180));
    assert_eq!(small.total, Price::new(1379));

    cart.add(line("2", 1999)).await.unwrap();
    let large = cart.pricing();
    assert_eq!(large.subtotal, Price::new(2998));
    assert_eq!(large.shipping, Price::ZERO);
    assert_eq!(large.tax, Price::new(540));
    assert_eq!(large.total, Price::new(3538));
}

#[tokio::test]
async fn test_threshold_subtotal_still_pays_shipping() {
    let h = Harness::new(shopper("u1")).unwrap();
    h.storefront.cart().add(line("1", 1000).with_quantity(2)).await.unwrap();

    let pricing = h.storefront.cart().pricing();
    assert_eq!(pricing.subtotal, Price::new(2000));
    assert_eq!(pricing.shipping, Price::new(200));
    assert_eq!(pricing.total, Price::new(2560));
}

#[tokio::test(start_paused = true)]
async fn test_checkout_places_order_and_empties_account_cart() {
    let h = Harness::new(shopper("u1")).unwrap();
    h.storefront.login().await.unwrap();
    h.storefront.cart().add(line("1", 999)).await.unwrap();
    h.storefront.cart().add(line("2", 1999)).await.unwrap();
    let expected = h.storefront.cart().pricing();

    let mut status = h.storefront.checkout().subscribe();
    let running = {
        let storefront = h.storefront.clone();
        tokio::spawn(async move { storefront.checkout().checkout().await })
    };

    status.changed().await.unwrap();
    assert_eq!(*status.borrow_and_update(), CheckoutStatus::Processing);

    let second = h.storefront.checkout().checkout().await.unwrap_err();
    assert!(matches!(second, StorefrontError::CheckoutInProgress));

    let order = running.await.unwrap().unwrap();
    assert_eq!(order.breakdown, expected);
    assert_eq!(h.storefront.checkout().status(), CheckoutStatus::Settled);
    assert!(h.storefront.cart().get_cart().is_empty());
    assert!(h.backend.stored_cart(&UserId::new("u1")).is_empty());

    let titles = h.notifier.titles();
    assert!(titles.contains(&"Processing".to_string()));
    assert_eq!(titles.last().unwrap(), "Order Placed!");
}

#[tokio::test(start_paused = true)]
async fn test_guest_and_empty_checkouts_are_refused() {
    let h = Harness::new(shopper("u1")).unwrap();
    h.storefront.cart().add(line("1", 999)).await.unwrap();

    let guest = h.storefront.checkout().checkout().await.unwrap_err();
    assert!(matches!(guest, StorefrontError::NotAuthenticated(_)));
    assert_eq!(h.storefront.cart().item_count(), 1);

    h.storefront.login().await.unwrap();
    h.storefront.cart().clear().await.unwrap();

    let empty = h.storefront.checkout().checkout().await.unwrap_err();
    assert!(matches!(empty, StorefrontError::EmptyCart));
    assert_eq!(h.storefront.checkout().status(), CheckoutStatus::Idle);

    let titles = h.notifier.titles();
    assert!(titles.contains(&"Login Required".to_string()));
    assert_eq!(titles.last().unwrap(), "Cart Empty");
}

#[tokio::test(start_paused = true)]
async fn test_failed_cart_clear_returns_to_idle() {
    let h = Harness::new(shopper("u1")).unwrap();
    h.storefront.login().await.unwrap();
    h.storefront.cart().add(line("1", 999)).await.unwrap();
    h.backend.set_fail_writes(true);

    let err = h.storefront.checkout().checkout().await.unwrap_err();
    assert!(matches!(err, StorefrontError::RemoteWriteFailed(_)));
    assert_eq!(h.storefront.checkout().status(), CheckoutStatus::Idle);
    assert_eq!(h.backend.stored_cart(&UserId::new("u1")).item_count(), 1);

    h.backend.set_fail_writes(false);
    h.storefront.checkout().checkout().await.unwrap();
    assert_eq!(h.storefront.checkout().status(), CheckoutStatus::Settled);
}
