//! Simulated checkout.
//!
//! No payment is taken. A signed-in shopper with a non-empty cart goes
//! `Idle -> Processing`, waits out a fixed delay, and lands in `Settled` with
//! an order confirmation and an emptied cart.
//!
//! The cart is held from pricing until the priced lines are removed, so a
//! line added while the order is processing waits and stays in the cart.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use threadline_core::{CheckoutStatus, PricingBreakdown};
use tokio::sync::watch;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::cart::CartService;
use crate::error::{Result, StorefrontError, add_breadcrumb};
use crate::notify::{Notification, SharedNotifier};
use crate::session::SessionGate;

/// Default simulated processing time.
pub const DEFAULT_CHECKOUT_DELAY: Duration = Duration::from_secs(2);

/// Receipt for a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    pub order_id: Uuid,
    pub breakdown: PricingBreakdown,
    pub placed_at: DateTime<Utc>,
}

/// Checkout state machine.
pub struct CheckoutStub {
    session: Arc<SessionGate>,
    cart: Arc<CartService>,
    notifier: SharedNotifier,
    delay: Duration,
    status: watch::Sender<CheckoutStatus>,
}

impl std::fmt::Debug for CheckoutStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutStub")
            .field("status", &*self.status.borrow())
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl CheckoutStub {
    #[must_use]
    pub fn new(session: Arc<SessionGate>, cart: Arc<CartService>, notifier: SharedNotifier) -> Self {
        let (status, _) = watch::channel(CheckoutStatus::Idle);
        Self {
            session,
            cart,
            notifier,
            delay: DEFAULT_CHECKOUT_DELAY,
            status,
        }
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn status(&self) -> CheckoutStatus {
        *self.status.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CheckoutStatus> {
        self.status.subscribe()
    }

    /// Place the order for the current cart.
    ///
    /// # Errors
    ///
    /// - `NotAuthenticated` for guests; status stays idle and the cart is kept
    /// - `EmptyCart` if there is nothing to buy
    /// - `CheckoutInProgress` if another checkout is processing
    /// - Remote errors from clearing the cart; status returns to idle
    #[instrument(skip(self))]
    pub async fn checkout(&self) -> Result<OrderConfirmation> {
        let notifier = self.notifier.as_ref();
        let Some(identity) = self.session.current_user() else {
            return Err(StorefrontError::NotAuthenticated("complete your purchase").surface(notifier));
        };

        if self.status() == CheckoutStatus::Processing {
            return Err(StorefrontError::CheckoutInProgress.surface(notifier));
        }
        let held = self
            .cart
            .hold(&identity.id)
            .await
            .map_err(|e| e.surface(notifier))?;
        if held.cart().is_empty() {
            return Err(StorefrontError::EmptyCart.surface(notifier));
        }
        let breakdown = held.pricing();

        let claimed = self.status.send_if_modified(|status| {
            if *status == CheckoutStatus::Processing {
                false
            } else {
                *status = CheckoutStatus::Processing;
                true
            }
        });
        if !claimed {
            return Err(StorefrontError::CheckoutInProgress.surface(notifier));
        }
        add_breadcrumb("checkout", "processing", Some(&[("user_id", identity.id.as_str())]));
        info!(user_id = %identity.id, total = %breakdown.total, "Processing order");

        tokio::time::sleep(self.delay).await;

        if let Err(e) = held.settle().await {
            self.status.send_replace(CheckoutStatus::Idle);
            return Err(e.surface(notifier));
        }

        let confirmation = OrderConfirmation {
            order_id: Uuid::new_v4(),
            breakdown,
            placed_at: Utc::now(),
        };
        self.status.send_replace(CheckoutStatus::Settled);
        info!(order_id = %confirmation.order_id, "Order placed");
        self.notifier.notify(Notification::success(
            "Order Placed!",
            "Your order has been placed successfully.",
        ));
        Ok(confirmation)
    }
}
