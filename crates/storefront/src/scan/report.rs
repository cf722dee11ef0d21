//! Scan report view and download.

use threadline_core::{ScanId, ScanRecord};
use tracing::instrument;

use super::ScanFlow;
use crate::error::{Result, StorefrontError};
use crate::notify::Notification;
use crate::storage::StorageError;

/// One scan rendered for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Suggested file name, `<scan id>.json`.
    pub file_name: String,
    /// Pretty-printed JSON of the record.
    pub contents: String,
}

impl ScanFlow {
    /// Open one of the shopper's saved scans for the details view.
    ///
    /// # Errors
    ///
    /// - `NotAuthenticated` for guests
    /// - `RemoteFetchFailed` if the history cannot be read
    /// - `NotFound` if the shopper has no scan with this id
    #[instrument(skip(self), fields(scan_id = %scan_id))]
    pub async fn view_report(&self, scan_id: &ScanId) -> Result<ScanRecord> {
        let record = self.saved_scan(scan_id).await?;
        self.inner.notifier.notify(Notification::info(
            "Scan Details",
            format!("Viewing detailed analysis for {scan_id}"),
        ));
        Ok(record)
    }

    /// Render one of the shopper's saved scans as a downloadable report.
    ///
    /// # Errors
    ///
    /// As [`ScanFlow::view_report`], plus `Storage` if the record cannot be
    /// encoded.
    #[instrument(skip(self), fields(scan_id = %scan_id))]
    pub async fn download_report(&self, scan_id: &ScanId) -> Result<ScanReport> {
        let notifier = self.inner.notifier.as_ref();
        let record = self.saved_scan(scan_id).await?;

        let file_name = format!("{scan_id}.json");
        let contents = serde_json::to_string_pretty(&record).map_err(|source| {
            StorefrontError::from(StorageError::Encode {
                key: file_name.clone(),
                source,
            })
            .surface(notifier)
        })?;

        notifier.notify(Notification::success(
            "Download Started",
            format!("Downloading detailed report for {scan_id}"),
        ));
        Ok(ScanReport {
            file_name,
            contents,
        })
    }

    async fn saved_scan(&self, scan_id: &ScanId) -> Result<ScanRecord> {
        let inner = &self.inner;
        let user = inner.require_identity()?;
        let scans = inner
            .history
            .history(&user)
            .await
            .map_err(|e| e.surface(inner.notifier.as_ref()))?;

        scans
            .iter()
            .find(|record| &record.scan_id == scan_id)
            .cloned()
            .ok_or_else(|| {
                StorefrontError::NotFound(format!("Scan {scan_id}")).surface(inner.notifier.as_ref())
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use threadline_core::{Device, Identity, UserId};

    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::remote::{MemoryBackend, RemoteLimits, RemoteScanStore};
    use crate::scan::{Camera, ScanHistory, ScanSettings, SimulatedCamera};
    use crate::session::{FixedIdentityProvider, SessionGate};

    async fn signed_in_flow() -> (ScanFlow, Arc<MemoryBackend>, RecordingNotifier) {
        let session = Arc::new(SessionGate::new(Arc::new(FixedIdentityProvider::new(
            Identity::new("u1"),
        ))));
        session.login().await.unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let notifier = RecordingNotifier::new();
        let flow = ScanFlow::new(
            session,
            Arc::new(SimulatedCamera::new()) as Arc<dyn Camera>,
            ScanHistory::new(backend.clone(), RemoteLimits::default()),
            Arc::new(notifier.clone()),
            ScanSettings::default(),
        );
        (flow, backend, notifier)
    }

    fn record() -> ScanRecord {
        ScanRecord::captured(
            Device::Mobile,
            Utc.with_ymd_and_hms(2026, 1, 20, 9, 30, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_view_report_finds_saved_scan() {
        let (flow, backend, notifier) = signed_in_flow().await;
        let saved = record();
        backend.save_scan(&UserId::new("u1"), &saved).await.unwrap();

        let viewed = flow.view_report(&saved.scan_id).await.unwrap();
        assert_eq!(viewed, saved);
        let seen = notifier.take();
        assert_eq!(seen[0].title, "Scan Details");
        assert_eq!(
            seen[0].message,
            format!("Viewing detailed analysis for {}", saved.scan_id)
        );
    }

    #[tokio::test]
    async fn test_download_report_renders_json() {
        let (flow, backend, notifier) = signed_in_flow().await;
        let saved = record();
        backend.save_scan(&UserId::new("u1"), &saved).await.unwrap();

        let report = flow.download_report(&saved.scan_id).await.unwrap();
        assert_eq!(report.file_name, format!("{}.json", saved.scan_id));
        let parsed: ScanRecord = serde_json::from_str(&report.contents).unwrap();
        assert_eq!(parsed, saved);
        assert_eq!(notifier.titles(), vec!["Download Started"]);
    }

    #[tokio::test]
    async fn test_unknown_scan_is_not_found() {
        let (flow, _, notifier) = signed_in_flow().await;

        let err = flow.view_report(&ScanId::new("scan_1")).await.unwrap_err();
        assert!(matches!(err, StorefrontError::NotFound(_)));
        assert_eq!(notifier.titles(), vec!["Not Found"]);
    }
}
