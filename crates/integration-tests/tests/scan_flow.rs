//! Body scan capture through the assembled storefront.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use threadline_core::{Device, ScanPhase, UserId};
use threadline_integration_tests::{Harness, shopper};
use threadline_storefront::StorefrontError;

async fn wait_until_idle(h: &Harness) {
    let mut phases = h.storefront.scan().subscribe();
    while *phases.borrow_and_update() != ScanPhase::Idle {
        phases.changed().await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_capture_saves_one_record_and_releases_camera() {
    let h = Harness::new(shopper("u1")).unwrap();
    h.storefront.login().await.unwrap();
    let scan = h.storefront.scan();

    scan.acquire_camera().await.unwrap();
    assert_eq!(scan.phase(), ScanPhase::Previewing);
    assert_eq!(h.camera.live_tracks(), 1);

    scan.begin_capture().await.unwrap();
    assert_eq!(scan.phase(), ScanPhase::CountingDown(3));
    wait_until_idle(&h).await;

    let saved = h.backend.stored_scans(&UserId::new("u1"));
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].device, Device::Mobile);
    assert_eq!(saved[0].try_on_count, 0);
    assert_eq!(h.camera.live_tracks(), 0);
    assert_eq!(h.camera.stop_calls(), 1);

    let latest = scan.history().latest(&UserId::new("u1")).await.unwrap();
    assert_eq!(latest.unwrap().scan_id, saved[0].scan_id);
    assert_eq!(h.notifier.titles().last().unwrap(), "Scan Complete!");
}

#[tokio::test(start_paused = true)]
async fn test_sign_out_mid_countdown_discards_capture() {
    let h = Harness::new(shopper("u1")).unwrap();
    h.storefront.login().await.unwrap();
    let scan = h.storefront.scan();
    scan.acquire_camera().await.unwrap();
    scan.begin_capture().await.unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(scan.phase(), ScanPhase::CountingDown(2));

    h.storefront.logout().await.unwrap();
    assert_eq!(scan.phase(), ScanPhase::Idle);
    assert_eq!(h.camera.live_tracks(), 0);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(h.backend.stored_scans(&UserId::new("u1")).is_empty());
    assert_eq!(h.backend.scan_saves(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_guest_cannot_open_camera() {
    let h = Harness::new(shopper("u1")).unwrap();

    let err = h.storefront.scan().acquire_camera().await.unwrap_err();
    assert!(matches!(err, StorefrontError::NotAuthenticated(_)));
    assert_eq!(h.camera.streams_opened(), 0);
    assert_eq!(h.notifier.titles(), vec!["Login Required"]);
}

#[tokio::test(start_paused = true)]
async fn test_denied_camera_returns_to_idle() {
    let h = Harness::new(shopper("u1")).unwrap();
    h.storefront.login().await.unwrap();
    h.camera.set_deny(true);

    let err = h.storefront.scan().acquire_camera().await.unwrap_err();
    assert!(matches!(err, StorefrontError::PermissionDenied));
    assert_eq!(h.storefront.scan().phase(), ScanPhase::Idle);
    assert_eq!(h.notifier.titles().last().unwrap(), "Camera Access Denied");

    h.camera.set_deny(false);
    h.storefront.scan().acquire_camera().await.unwrap();
    h.storefront.scan().cancel().await.unwrap();
    assert_eq!(h.camera.live_tracks(), 0);
    assert_eq!(h.notifier.titles().last().unwrap(), "Scan Cancelled");
}
