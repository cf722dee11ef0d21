//! Storefront state shared across UI layers.

use std::sync::Arc;

use threadline_core::{Device, Identity, PricingRules};
use tracing::{info, instrument, warn};

use crate::cart::{CartService, LocalCartStore, MigrationReport};
use crate::checkout::CheckoutStub;
use crate::config::StorefrontConfig;
use crate::error::{Result, StorefrontError};
use crate::notify::{Notification, SharedNotifier};
use crate::preferences::PreferencesStore;
use crate::profile::ProfileStore;
use crate::remote::{RemoteCartStore, RemoteLimits, RemoteScanStore};
use crate::scan::{Camera, ScanFlow, ScanHistory, ScanSettings};
use crate::session::{IdentityProvider, SessionGate};
use crate::storage::KeyValueStore;
use crate::wishlist::Wishlist;

/// External services the storefront talks to.
pub struct Collaborators {
    pub identity: Arc<dyn IdentityProvider>,
    pub remote_cart: Arc<dyn RemoteCartStore>,
    pub remote_scans: Arc<dyn RemoteScanStore>,
    pub camera: Arc<dyn Camera>,
    pub storage: Arc<dyn KeyValueStore>,
    pub notifier: SharedNotifier,
}

/// Application state shared across all UI layers.
///
/// This struct is cheaply cloneable via `Arc` and owns the session, the cart,
/// checkout, the scan flow, the wishlist, preferences and the profile.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    session: Arc<SessionGate>,
    cart: Arc<CartService>,
    checkout: CheckoutStub,
    scan: ScanFlow,
    wishlist: Wishlist,
    preferences: PreferencesStore,
    profile: ProfileStore,
    notifier: SharedNotifier,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("session", &self.inner.session)
            .field("scan", &self.inner.scan)
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// Wire the storefront together.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if client storage cannot be read.
    pub fn new(config: StorefrontConfig, collaborators: Collaborators) -> Result<Self> {
        let Collaborators {
            identity,
            remote_cart,
            remote_scans,
            camera,
            storage,
            notifier,
        } = collaborators;

        let limits = RemoteLimits {
            timeout: config.remote_timeout,
            fetch_retries: config.fetch_retries,
        };
        let session = Arc::new(SessionGate::new(identity));

        let local = LocalCartStore::load(Arc::clone(&storage))?;
        let cart = Arc::new(
            CartService::new(Arc::clone(&session), local, remote_cart, Arc::clone(&notifier))
                .with_limits(limits)
                .with_pricing_rules(PricingRules::default()),
        );

        let checkout = CheckoutStub::new(Arc::clone(&session), Arc::clone(&cart), Arc::clone(&notifier))
            .with_delay(config.checkout_delay);

        let scan = ScanFlow::new(
            Arc::clone(&session),
            camera,
            ScanHistory::new(remote_scans, limits),
            Arc::clone(&notifier),
            ScanSettings {
                countdown_seconds: config.scan_seconds,
                device: Device::from_user_agent(&config.user_agent),
                ..ScanSettings::default()
            },
        );

        let wishlist = Wishlist::load(Arc::clone(&storage), Arc::clone(&cart), Arc::clone(&notifier))?;
        let preferences = PreferencesStore::load(Arc::clone(&storage), Arc::clone(&notifier))?;
        let profile = ProfileStore::load(storage, Arc::clone(&notifier))?;

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                session,
                cart,
                checkout,
                scan,
                wishlist,
                preferences,
                profile,
                notifier,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &SessionGate {
        &self.inner.session
    }

    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutStub {
        &self.inner.checkout
    }

    #[must_use]
    pub fn scan(&self) -> &ScanFlow {
        &self.inner.scan
    }

    #[must_use]
    pub fn wishlist(&self) -> &Wishlist {
        &self.inner.wishlist
    }

    #[must_use]
    pub fn preferences(&self) -> &PreferencesStore {
        &self.inner.preferences
    }

    #[must_use]
    pub fn profile(&self) -> &ProfileStore {
        &self.inner.profile
    }

    /// Adopt an existing sign-in, if the provider has one, and load its cart.
    ///
    /// # Errors
    ///
    /// Returns `Identity` if the provider cannot be queried.
    #[instrument(skip(self))]
    pub async fn restore_session(&self) -> Result<Option<Identity>> {
        let identity = self
            .inner
            .session
            .restore()
            .await
            .map_err(|e| StorefrontError::from(e).report())?;
        if let Some(identity) = &identity {
            self.sync_cart(identity).await;
            self.prefill_profile(identity);
        }
        Ok(identity)
    }

    /// Sign in, then move the guest cart into the account.
    ///
    /// A cart sync failure does not undo the sign-in; it is reported and the
    /// lines that did not move stay in the guest cart.
    ///
    /// # Errors
    ///
    /// Returns `Identity` if the provider refuses the sign-in.
    #[instrument(skip(self))]
    pub async fn login(&self) -> Result<Identity> {
        let identity = self
            .inner
            .session
            .login()
            .await
            .map_err(|e| StorefrontError::from(e).surface(self.inner.notifier.as_ref()))?;
        self.sync_cart(&identity).await;
        self.prefill_profile(&identity);
        Ok(identity)
    }

    fn prefill_profile(&self, identity: &Identity) {
        if let Err(e) = self.inner.profile.prefill(identity) {
            warn!(user_id = %identity.id, error = %e, "Profile not prefilled");
        }
    }

    async fn sync_cart(&self, identity: &Identity) -> Option<MigrationReport> {
        match self.inner.cart.migrate_guest_cart(&identity.id).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(user_id = %identity.id, error = %e, "Cart sync after sign-in incomplete");
                None
            }
        }
    }

    /// Sign out. Stops any running scan first.
    ///
    /// # Errors
    ///
    /// Returns `Identity` (shows "Logout Failed") if the provider refuses;
    /// the shopper stays signed in.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let inner = &self.inner;
        inner.scan.shutdown().await;

        if let Err(e) = inner.session.logout().await {
            let err = StorefrontError::from(e).report();
            inner
                .notifier
                .notify(Notification::error("Logout Failed", "Failed to logout. Please try again."));
            return Err(err);
        }

        inner.cart.on_logout();
        info!("Storefront signed out");
        inner.notifier.notify(Notification::success(
            "Logged Out",
            "You have been logged out successfully.",
        ));
        Ok(())
    }

    /// Release every held resource. Call on teardown.
    pub async fn shutdown(&self) {
        self.inner.scan.shutdown().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use threadline_core::{CartLineItem, Price, UserId};

    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::remote::MemoryBackend;
    use crate::scan::SimulatedCamera;
    use crate::session::FixedIdentityProvider;
    use crate::storage::MemoryStore;

    fn storefront(provider: FixedIdentityProvider) -> (Storefront, Arc<MemoryBackend>, RecordingNotifier) {
        let backend = Arc::new(MemoryBackend::new());
        let notifier = RecordingNotifier::new();
        let storefront = Storefront::new(
            StorefrontConfig::default(),
            Collaborators {
                identity: Arc::new(provider),
                remote_cart: Arc::clone(&backend) as Arc<dyn RemoteCartStore>,
                remote_scans: Arc::clone(&backend) as Arc<dyn RemoteScanStore>,
                camera: Arc::new(SimulatedCamera::new()),
                storage: Arc::new(MemoryStore::new()),
                notifier: Arc::new(notifier.clone()),
            },
        )
        .unwrap();
        (storefront, backend, notifier)
    }

    #[tokio::test]
    async fn test_login_migrates_guest_cart() {
        let (store, backend, _) = storefront(FixedIdentityProvider::new(Identity::new("u1")));
        store
            .cart()
            .add(CartLineItem::new("1", "Tee", Price::new(1999)))
            .await
            .unwrap();

        store.login().await.unwrap();
        assert_eq!(backend.stored_cart(&UserId::new("u1")).item_count(), 1);
        assert_eq!(store.cart().item_count(), 1);
        assert!(store.cart().guest_cart().is_empty());
    }

    #[tokio::test]
    async fn test_logout_notifies_and_returns_to_guest_cart() {
        let (store, _, notifier) = storefront(FixedIdentityProvider::new(Identity::new("u1")));
        store.login().await.unwrap();
        store
            .cart()
            .add(CartLineItem::new("1", "Tee", Price::new(1999)))
            .await
            .unwrap();

        store.logout().await.unwrap();
        assert!(store.session().current_user().is_none());
        assert!(store.cart().get_cart().is_empty());
        assert_eq!(notifier.titles().last().unwrap(), "Logged Out");
    }

    #[tokio::test]
    async fn test_login_prefills_profile() {
        let provider =
            FixedIdentityProvider::new(Identity::new("u1").with_display_name("Asha Rao"));
        let (store, _, notifier) = storefront(provider);

        store.login().await.unwrap();
        assert_eq!(store.profile().get().name, "Asha Rao");
        assert!(!notifier.titles().iter().any(|title| title == "Profile Updated"));
    }

    #[tokio::test]
    async fn test_failed_logout_keeps_session() {
        let provider = FixedIdentityProvider::new(Identity::new("u1")).failing_logout();
        let (store, _, notifier) = storefront(provider);
        store.login().await.unwrap();

        assert!(store.logout().await.is_err());
        assert!(store.session().is_authenticated());
        assert_eq!(notifier.titles().last().unwrap(), "Logout Failed");
    }

    #[tokio::test]
    async fn test_restore_session_loads_remote_cart() {
        let provider = FixedIdentityProvider::new(Identity::new("u1")).signed_in();
        let (store, backend, _) = storefront(provider);
        backend.seed_cart(
            &UserId::new("u1"),
            threadline_core::Cart::from_lines([CartLineItem::new("2", "Cap", Price::new(499))]),
        );

        let restored = store.restore_session().await.unwrap();
        assert!(restored.is_some());
        assert_eq!(store.cart().item_count(), 1);
    }
}
