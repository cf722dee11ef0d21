//! The HTTP backend client against a local fake of the REST endpoints.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use secrecy::SecretString;
use threadline_core::{CartLineItem, Device, Price, ProductId, ScanRecord, UserId};
use threadline_integration_tests::{FakeRestBackend, shopper, test_config};
use threadline_storefront::config::RemoteConfig;
use threadline_storefront::notify::RecordingNotifier;
use threadline_storefront::remote::{RemoteCartStore, RemoteError, RemoteScanStore, RestBackend};
use threadline_storefront::scan::{Camera, SimulatedCamera};
use threadline_storefront::storage::MemoryStore;
use threadline_storefront::{Collaborators, Storefront, StorefrontError};

const TOKEN: &str = "tl_8fQ2xZ7vK1mR4wB9nJ3pL6";

fn client(fake: &FakeRestBackend, token: Option<&str>) -> RestBackend {
    let config = RemoteConfig {
        base_url: fake.base_url().clone(),
        api_token: token.map(SecretString::from),
    };
    RestBackend::new(&config, Duration::from_secs(5)).unwrap()
}

fn hoodie(size: &str) -> CartLineItem {
    CartLineItem::new("3", "Zip Hoodie", Price::new(3499)).with_size(size)
}

#[tokio::test]
async fn test_cart_round_trip_over_http() {
    let fake = FakeRestBackend::spawn().await.unwrap();
    let rest = client(&fake, Some(TOKEN));
    let user = UserId::new("u1");

    assert!(rest.fetch_cart(&user).await.unwrap().is_empty());

    rest.add_item(&user, &hoodie("M")).await.unwrap();
    rest.add_item(&user, &hoodie("M")).await.unwrap();
    rest.add_item(&user, &hoodie("XL")).await.unwrap();
    let cart = rest.fetch_cart(&user).await.unwrap();
    assert_eq!(cart.len(), 2);
    assert_eq!(cart.item_count(), 3);

    rest.set_quantity(&user, &ProductId::new("3"), Some("XL"), 5)
        .await
        .unwrap();
    rest.remove_item(&user, &ProductId::new("3"), Some("M"))
        .await
        .unwrap();
    // Removing a line that is already gone is not an error.
    rest.remove_item(&user, &ProductId::new("3"), Some("M"))
        .await
        .unwrap();

    let stored = fake.cart("u1").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored.find(&ProductId::new("3"), Some("XL")).unwrap().quantity, 5);

    let expected = format!("Bearer {TOKEN}");
    assert!(
        fake.authorizations()
            .iter()
            .all(|auth| auth.as_deref() == Some(expected.as_str()))
    );
}

#[tokio::test]
async fn test_requests_without_token_send_no_authorization() {
    let fake = FakeRestBackend::spawn().await.unwrap();
    let rest = client(&fake, None);

    rest.fetch_cart(&UserId::new("u1")).await.unwrap();
    assert_eq!(fake.authorizations(), vec![None]);
}

#[tokio::test]
async fn test_server_errors_surface_as_status() {
    let fake = FakeRestBackend::spawn().await.unwrap();
    fake.set_fail_writes(true);
    let rest = client(&fake, None);

    let err = rest
        .add_item(&UserId::new("u1"), &hoodie("M"))
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Status { status: 503, .. }));
}

#[tokio::test]
async fn test_scans_saved_and_listed() {
    let fake = FakeRestBackend::spawn().await.unwrap();
    let rest = client(&fake, None);
    let user = UserId::new("u1");

    assert!(rest.list_scans(&user).await.unwrap().is_empty());

    let at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
    let record = ScanRecord::captured(Device::Desktop, at);
    let stored = rest.save_scan(&user, &record).await.unwrap();
    assert_eq!(stored, record);

    let listed = rest.list_scans(&user).await.unwrap();
    assert_eq!(listed, vec![record]);
    assert_eq!(fake.scans("u1").len(), 1);
}

#[tokio::test]
async fn test_storefront_over_http_migrates_and_checks_out() {
    let fake = FakeRestBackend::spawn().await.unwrap();
    let rest = Arc::new(client(&fake, Some(TOKEN)));
    let notifier = RecordingNotifier::new();
    let config = threadline_storefront::config::StorefrontConfig {
        checkout_delay: Duration::from_millis(10),
        ..test_config()
    };
    let storefront = Storefront::new(
        config,
        Collaborators {
            identity: Arc::new(shopper("u1")),
            remote_cart: Arc::clone(&rest) as Arc<dyn RemoteCartStore>,
            remote_scans: rest as Arc<dyn RemoteScanStore>,
            camera: Arc::new(SimulatedCamera::new()) as Arc<dyn Camera>,
            storage: Arc::new(MemoryStore::new()),
            notifier: Arc::new(notifier.clone()),
        },
    )
    .unwrap();

    storefront.cart().add(hoodie("M")).await.unwrap();
    storefront.login().await.unwrap();
    assert_eq!(fake.cart("u1").unwrap().item_count(), 1);
    assert_eq!(storefront.cart().item_count(), 1);

    fake.set_fail_writes(true);
    let err = storefront.cart().add(hoodie("L")).await.unwrap_err();
    assert!(matches!(err, StorefrontError::RemoteWriteFailed(_)));
    assert_eq!(storefront.cart().item_count(), 1);
    fake.set_fail_writes(false);

    let order = storefront.checkout().checkout().await.unwrap();
    assert_eq!(order.breakdown.subtotal, Price::new(3499));
    assert!(fake.cart("u1").unwrap().is_empty());
    assert_eq!(notifier.titles().last().unwrap(), "Order Placed!");
}
