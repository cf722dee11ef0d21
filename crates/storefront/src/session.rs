//! Session/auth gate.
//!
//! Tracks whether a shopper is signed in and publishes every change over a
//! `watch` channel. Sign-in itself is delegated to an [`IdentityProvider`].

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use threadline_core::Identity;
use tokio::sync::watch;
use tracing::instrument;

use crate::error::{clear_sentry_user, set_sentry_user};

/// Error reported by an identity provider.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct IdentityError(pub String);

/// External sign-in service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The identity the provider currently holds, if any.
    async fn current_user(&self) -> Result<Option<Identity>, IdentityError>;

    /// Run the provider's sign-in flow.
    async fn login(&self) -> Result<Identity, IdentityError>;

    /// Sign out.
    async fn logout(&self) -> Result<(), IdentityError>;
}

/// Provider that signs in a fixed identity. Backs the CLI and tests.
#[derive(Debug, Default)]
pub struct FixedIdentityProvider {
    identity: Option<Identity>,
    signed_in: Mutex<bool>,
    fail_logout: bool,
}

impl FixedIdentityProvider {
    /// Provider whose `login` yields `identity`.
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            ..Self::default()
        }
    }

    /// Provider that refuses every sign-in.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Start already signed in.
    #[must_use]
    pub fn signed_in(self) -> Self {
        if let Ok(mut signed_in) = self.signed_in.lock() {
            *signed_in = self.identity.is_some();
        }
        self
    }

    /// Make `logout` fail.
    #[must_use]
    pub const fn failing_logout(mut self) -> Self {
        self.fail_logout = true;
        self
    }

    fn set_signed_in(&self, value: bool) -> Result<(), IdentityError> {
        let mut signed_in = self
            .signed_in
            .lock()
            .map_err(|_| IdentityError("provider state poisoned".into()))?;
        *signed_in = value;
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for FixedIdentityProvider {
    async fn current_user(&self) -> Result<Option<Identity>, IdentityError> {
        let signed_in = self
            .signed_in
            .lock()
            .map_err(|_| IdentityError("provider state poisoned".into()))?;
        Ok(if *signed_in { self.identity.clone() } else { None })
    }

    async fn login(&self) -> Result<Identity, IdentityError> {
        let identity = self
            .identity
            .clone()
            .ok_or_else(|| IdentityError("sign-in is unavailable".into()))?;
        self.set_signed_in(true)?;
        Ok(identity)
    }

    async fn logout(&self) -> Result<(), IdentityError> {
        if self.fail_logout {
            return Err(IdentityError("sign-out failed".into()));
        }
        self.set_signed_in(false)
    }
}

/// Current identity plus change notifications.
pub struct SessionGate {
    provider: Arc<dyn IdentityProvider>,
    current: watch::Sender<Option<Identity>>,
}

impl std::fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGate")
            .field("current", &*self.current.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionGate {
    /// Create a gate that starts as guest.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (current, _) = watch::channel(None);
        Self { provider, current }
    }

    /// Ask the provider for an existing sign-in and adopt it.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the provider cannot be queried.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<Option<Identity>, IdentityError> {
        let identity = self.provider.current_user().await?;
        self.publish(identity.clone());
        Ok(identity)
    }

    /// The signed-in identity, or `None` for a guest.
    #[must_use]
    pub fn current_user(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    /// Whether a shopper is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Subscribe to identity changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    /// Sign in through the provider.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the provider refuses; the gate stays guest.
    #[instrument(skip(self))]
    pub async fn login(&self) -> Result<Identity, IdentityError> {
        let identity = self.provider.login().await?;
        tracing::info!(user_id = %identity.id, "Shopper signed in");
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    /// Sign out through the provider.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the provider refuses; the identity is kept.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), IdentityError> {
        self.provider.logout().await?;
        tracing::info!("Shopper signed out");
        self.publish(None);
        Ok(())
    }

    fn publish(&self, identity: Option<Identity>) {
        match &identity {
            Some(identity) => set_sentry_user(&identity.id, identity.email.as_ref().map(|e| e.as_str())),
            None => clear_sentry_user(),
        }
        self.current.send_if_modified(|current| {
            if *current == identity {
                false
            } else {
                *current = identity;
                true
            }
        });
    }
}
