//! Cart reconciliation.
//!
//! [`CartService`] is the single cart the UI binds to. Guests read and write
//! the [`LocalCartStore`]; signed-in shoppers read the last snapshot fetched
//! from the [`RemoteCartStore`] and write through it.
//!
//! # Consistency
//!
//! - Mutations are serialized: one in flight per service, later ones wait
//! - A [`HeldCart`] keeps that serialization for the length of a checkout, so
//!   lines added while the order is processing land after it
//! - A remote mutation is visible only after the refreshed snapshot lands;
//!   a failed write or fetch leaves the last-known-good snapshot in place
//! - At most one fetch is in flight; callers that arrive while one is running
//!   wait for it and share its result

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use threadline_core::{
    Cart, CartLineItem, PricingBreakdown, PricingRules, ProductId, UserId, clamp_quantity,
};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use super::LocalCartStore;
use crate::error::{Result, StorefrontError, add_breadcrumb};
use crate::notify::{Notification, SharedNotifier};
use crate::remote::{RemoteCartStore, RemoteError, RemoteLimits, bounded, bounded_with_retry};
use crate::session::SessionGate;

/// A cart mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOp {
    /// Merge a line into the cart.
    Add(CartLineItem),
    /// Set a line's quantity; zero or less removes it.
    UpdateQuantity {
        id: ProductId,
        size: Option<String>,
        quantity: i64,
    },
    /// Remove a line.
    Remove { id: ProductId, size: Option<String> },
}

impl CartOp {
    /// Rewrite non-positive quantity updates as removals.
    fn normalize(self) -> Self {
        match self {
            Self::UpdateQuantity { id, size, quantity } if quantity <= 0 => Self::Remove { id, size },
            op => op,
        }
    }

    const fn action(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::UpdateQuantity { .. } => "update_quantity",
            Self::Remove { .. } => "remove",
        }
    }

    fn product(&self) -> &ProductId {
        match self {
            Self::Add(item) => &item.id,
            Self::UpdateQuantity { id, .. } | Self::Remove { id, .. } => id,
        }
    }

    /// Apply to a cart copy. Returns whether anything changed.
    fn apply(&self, cart: &mut Cart) -> bool {
        match self {
            Self::Add(item) => cart.add(item.clone()),
            Self::UpdateQuantity { id, size, quantity } => {
                cart.update_quantity(id, size.as_deref(), *quantity)
            }
            Self::Remove { id, size } => cart.remove(id, size.as_deref()),
        }
    }

    fn success_notification(&self) -> Notification {
        match self {
            Self::Add(item) => Notification::success(
                "Added to Cart",
                format!("{} has been added to your cart!", item.name),
            ),
            Self::UpdateQuantity { .. } => {
                Notification::success("Cart Updated", "Item quantity has been updated.")
            }
            Self::Remove { .. } => {
                Notification::success("Item Removed", "Item has been removed from your cart.")
            }
        }
    }
}

/// Outcome of moving the guest cart into a shopper's account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Lines written to the remote cart and removed locally.
    pub migrated: usize,
    /// Lines the remote store refused; they stay in the guest cart.
    pub retained: usize,
}

#[derive(Debug, Default)]
struct RemoteSnapshot {
    owner: Option<UserId>,
    cart: Cart,
}

/// Unified cart view over the guest and the remote cart.
pub struct CartService {
    session: Arc<SessionGate>,
    local: LocalCartStore,
    remote: Arc<dyn RemoteCartStore>,
    notifier: SharedNotifier,
    rules: PricingRules,
    limits: RemoteLimits,
    snapshot: RwLock<RemoteSnapshot>,
    mutation_lock: Mutex<()>,
    fetch_gate: Mutex<()>,
    fetch_generation: AtomicU64,
}

impl std::fmt::Debug for CartService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartService")
            .field("local", &self.local)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl CartService {
    #[must_use]
    pub fn new(
        session: Arc<SessionGate>,
        local: LocalCartStore,
        remote: Arc<dyn RemoteCartStore>,
        notifier: SharedNotifier,
    ) -> Self {
        Self {
            session,
            local,
            remote,
            notifier,
            rules: PricingRules::default(),
            limits: RemoteLimits::default(),
            snapshot: RwLock::new(RemoteSnapshot::default()),
            mutation_lock: Mutex::new(()),
            fetch_gate: Mutex::new(()),
            fetch_generation: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: RemoteLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub const fn with_pricing_rules(mut self, rules: PricingRules) -> Self {
        self.rules = rules;
        self
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The cart the UI shows: the guest cart, or the shopper's last fetched
    /// remote snapshot.
    #[must_use]
    pub fn get_cart(&self) -> Cart {
        match self.session.current_user() {
            None => self.local.cart(),
            Some(identity) => self.snapshot_for(&identity.id),
        }
    }

    /// The guest cart, regardless of sign-in state.
    #[must_use]
    pub fn guest_cart(&self) -> Cart {
        self.local.cart()
    }

    /// Total units in the cart (header badge).
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.get_cart().item_count()
    }

    /// Pricing for the current cart, recomputed on every call.
    #[must_use]
    pub fn pricing(&self) -> PricingBreakdown {
        self.rules.breakdown(&self.get_cart())
    }

    fn snapshot_for(&self, user: &UserId) -> Cart {
        self.snapshot
            .read()
            .ok()
            .filter(|snapshot| snapshot.owner.as_ref() == Some(user))
            .map(|snapshot| snapshot.cart.clone())
            .unwrap_or_default()
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Replace the snapshot with the shopper's remote cart.
    ///
    /// Guests have nothing to refresh and get their local cart back.
    ///
    /// # Errors
    ///
    /// Returns `RemoteFetchFailed` once retries are spent; the previous
    /// snapshot stays in place.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Cart> {
        let Some(identity) = self.session.current_user() else {
            return Ok(self.local.cart());
        };

        let observed = self.fetch_generation.load(Ordering::SeqCst);
        let _gate = self.fetch_gate.lock().await;
        if self.fetch_generation.load(Ordering::SeqCst) != observed {
            debug!("Joined in-flight cart fetch");
            return Ok(self.snapshot_for(&identity.id));
        }

        self.fetch_locked(&identity.id)
            .await
            .map_err(|e| e.surface(self.notifier.as_ref()))
    }

    /// Fetch unconditionally. Used after writes, where a fetch that started
    /// before the write cannot be reused.
    async fn fetch_fresh(&self, user: &UserId) -> Result<Cart> {
        let _gate = self.fetch_gate.lock().await;
        self.fetch_locked(user).await
    }

    /// Fetch and commit. The caller holds `fetch_gate`.
    async fn fetch_locked(&self, user: &UserId) -> Result<Cart> {
        let cart = bounded_with_retry(self.limits.timeout, self.limits.fetch_retries, || {
            self.remote.fetch_cart(user)
        })
        .await
        .map_err(StorefrontError::RemoteFetchFailed)?;

        // A fetch for a shopper who has since signed out must not land.
        let still_current = self
            .session
            .current_user()
            .is_some_and(|identity| &identity.id == user);
        if still_current {
            let mut snapshot = self.snapshot.write().map_err(|_| {
                StorefrontError::RemoteFetchFailed(RemoteError::Unavailable(
                    "cart snapshot poisoned".into(),
                ))
            })?;
            snapshot.owner = Some(user.clone());
            snapshot.cart = cart.clone();
        }
        self.fetch_generation.fetch_add(1, Ordering::SeqCst);
        debug!(lines = cart.len(), "Cart snapshot refreshed");
        Ok(cart)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Apply a mutation to the current cart.
    ///
    /// # Errors
    ///
    /// - `Storage` if the guest cart cannot be written
    /// - `RemoteWriteFailed` if the remote store refuses the write
    /// - `RemoteFetchFailed` if the write landed but the refresh did not
    #[instrument(skip(self, op), fields(action = op.action(), product_id = %op.product()))]
    pub async fn mutate(&self, op: CartOp) -> Result<Cart> {
        let op = op.normalize();
        if let CartOp::Add(item) = &op
            && item.quantity == 0
        {
            return Ok(self.get_cart());
        }

        let _serial = self.mutation_lock.lock().await;
        add_breadcrumb("cart", op.action(), Some(&[("product_id", op.product().as_str())]));

        let result = match self.session.current_user() {
            None => self.mutate_local(&op),
            Some(identity) => self.mutate_remote(&identity.id, &op).await,
        };
        result.map_err(|e| e.surface(self.notifier.as_ref()))
    }

    /// Add a line.
    ///
    /// # Errors
    ///
    /// See [`CartService::mutate`].
    pub async fn add(&self, item: CartLineItem) -> Result<Cart> {
        self.mutate(CartOp::Add(item)).await
    }

    /// Set a line's quantity; zero or less removes it.
    ///
    /// # Errors
    ///
    /// See [`CartService::mutate`].
    pub async fn update_quantity(
        &self,
        id: &ProductId,
        size: Option<&str>,
        quantity: i64,
    ) -> Result<Cart> {
        self.mutate(CartOp::UpdateQuantity {
            id: id.clone(),
            size: size.map(String::from),
            quantity,
        })
        .await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// See [`CartService::mutate`].
    pub async fn remove(&self, id: &ProductId, size: Option<&str>) -> Result<Cart> {
        self.mutate(CartOp::Remove {
            id: id.clone(),
            size: size.map(String::from),
        })
        .await
    }

    fn mutate_local(&self, op: &CartOp) -> Result<Cart> {
        let changed = match op {
            CartOp::Add(item) => self.local.add(item.clone())?,
            CartOp::UpdateQuantity { id, size, quantity } => {
                self.local.update_quantity(id, size.as_deref(), *quantity)?
            }
            CartOp::Remove { id, size } => self.local.remove(id, size.as_deref())?,
        };
        if changed {
            self.notifier.notify(op.success_notification());
        }
        Ok(self.local.cart())
    }

    async fn mutate_remote(&self, user: &UserId, op: &CartOp) -> Result<Cart> {
        if !matches!(op, CartOp::Add(_)) {
            let mut current = self.fetch_fresh(user).await?;
            if !op.apply(&mut current) {
                debug!("Remote cart already in requested state");
                return Ok(current);
            }
        }

        let limit = self.limits.timeout;
        let written = match op {
            CartOp::Add(item) => bounded(limit, self.remote.add_item(user, item)).await,
            CartOp::UpdateQuantity { id, size, quantity } => {
                let quantity = clamp_quantity(*quantity);
                bounded(
                    limit,
                    self.remote.set_quantity(user, id, size.as_deref(), quantity),
                )
                .await
            }
            CartOp::Remove { id, size } => {
                bounded(limit, self.remote.remove_item(user, id, size.as_deref())).await
            }
        };
        written.map_err(StorefrontError::RemoteWriteFailed)?;

        self.notifier.notify(op.success_notification());
        self.fetch_fresh(user).await
    }

    // =========================================================================
    // Session transitions
    // =========================================================================

    /// Move the guest cart into the shopper's remote cart.
    ///
    /// Each guest line is added to the remote cart (the remote store merges
    /// by `(id, size)`) and removed locally once the remote write succeeds.
    /// Lines the remote refuses stay in the guest cart for the next sign-in.
    /// The snapshot is refreshed afterwards either way.
    ///
    /// # Errors
    ///
    /// Returns `RemoteWriteFailed` if any line was retained, or
    /// `RemoteFetchFailed` if the final refresh failed.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn migrate_guest_cart(&self, user: &UserId) -> Result<MigrationReport> {
        let _serial = self.mutation_lock.lock().await;
        let guest = self.local.cart();
        let mut report = MigrationReport::default();
        let mut retained = Cart::new();
        let mut last_error = None;

        for line in guest.lines() {
            match bounded(self.limits.timeout, self.remote.add_item(user, line)).await {
                Ok(()) => report.migrated += 1,
                Err(e) => {
                    warn!(product_id = %line.id, error = %e, "Guest line not migrated");
                    retained.add(line.clone());
                    last_error = Some(e);
                }
            }
        }
        report.retained = retained.len();

        if report.migrated > 0 {
            self.local.replace(retained).map_err(|e| {
                StorefrontError::from(e).surface(self.notifier.as_ref())
            })?;
            info!(migrated = report.migrated, "Guest cart moved to account");
            self.notifier.notify(Notification::success(
                "Cart Synced",
                format!("{} item(s) from your guest cart were added to your account.", report.migrated),
            ));
        }

        self.fetch_fresh(user)
            .await
            .map_err(|e| e.surface(self.notifier.as_ref()))?;

        match last_error {
            Some(e) => Err(StorefrontError::RemoteWriteFailed(e).surface(self.notifier.as_ref())),
            None => Ok(report),
        }
    }

    /// Remove every line from the shopper's remote cart, then refresh.
    ///
    /// # Errors
    ///
    /// Returns `RemoteWriteFailed` on the first refused removal (lines removed
    /// before it stay removed) or `RemoteFetchFailed` if the refresh fails.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn clear_remote(&self, user: &UserId) -> Result<()> {
        let _serial = self.mutation_lock.lock().await;
        let current = self.fetch_fresh(user).await?;
        self.remove_lines(user, &current).await
    }

    /// Take the mutation lock and fetch the shopper's cart as it stands.
    ///
    /// Every other cart mutation waits until the returned [`HeldCart`] is
    /// settled or dropped.
    ///
    /// # Errors
    ///
    /// Returns `RemoteFetchFailed` if the cart cannot be read.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn hold(&self, user: &UserId) -> Result<HeldCart<'_>> {
        let serial = self.mutation_lock.lock().await;
        let cart = self.fetch_fresh(user).await?;
        Ok(HeldCart {
            service: self,
            user: user.clone(),
            cart,
            _serial: serial,
        })
    }

    /// Remove `lines` from the remote cart and refresh. The caller holds
    /// `mutation_lock`.
    async fn remove_lines(&self, user: &UserId, lines: &Cart) -> Result<()> {
        for line in lines.lines() {
            bounded(
                self.limits.timeout,
                self.remote.remove_item(user, &line.id, line.size.as_deref()),
            )
            .await
            .map_err(StorefrontError::RemoteWriteFailed)?;
        }

        self.fetch_fresh(user).await.map(drop)
    }

    /// Empty the current cart (guest or remote).
    ///
    /// # Errors
    ///
    /// See [`CartService::clear_remote`]; guests only fail on storage errors.
    pub async fn clear(&self) -> Result<()> {
        let result = match self.session.current_user() {
            None => {
                let _serial = self.mutation_lock.lock().await;
                self.local.clear().map_err(StorefrontError::from)
            }
            Some(identity) => self.clear_remote(&identity.id).await,
        };
        result.map_err(|e| e.surface(self.notifier.as_ref()))
    }

    /// Forget the remote snapshot after sign-out.
    pub fn on_logout(&self) {
        if let Ok(mut snapshot) = self.snapshot.write() {
            *snapshot = RemoteSnapshot::default();
        }
    }
}

/// A shopper's remote cart with mutations held off.
///
/// Produced by [`CartService::hold`]. Dropping it without settling releases
/// the cart untouched.
pub struct HeldCart<'a> {
    service: &'a CartService,
    user: UserId,
    cart: Cart,
    _serial: MutexGuard<'a, ()>,
}

impl std::fmt::Debug for HeldCart<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeldCart")
            .field("user", &self.user)
            .field("cart", &self.cart)
            .finish_non_exhaustive()
    }
}

impl HeldCart<'_> {
    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    #[must_use]
    pub fn pricing(&self) -> PricingBreakdown {
        self.service.rules.breakdown(&self.cart)
    }

    /// Remove exactly the held lines from the remote cart, then release it.
    ///
    /// # Errors
    ///
    /// Returns `RemoteWriteFailed` on the first refused removal or
    /// `RemoteFetchFailed` if the refresh fails.
    pub async fn settle(self) -> Result<()> {
        self.service.remove_lines(&self.user, &self.cart).await
    }
}
