//! Unified error handling with Sentry integration.
//!
//! Every storefront operation returns `Result<T, StorefrontError>`. None of
//! the errors are fatal: the UI recovers from each by showing the
//! notification from [`StorefrontError::notification`] and keeping the
//! last-known-good state.

use thiserror::Error;
use threadline_core::EmailError;

use crate::notify::Notification;
use crate::remote::RemoteError;
use crate::notify::NotificationSink;
use crate::scan::CameraError;
use crate::session::IdentityError;
use crate::storage::StorageError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Camera access was refused.
    #[error("camera permission denied")]
    PermissionDenied,

    /// The operation requires a signed-in shopper.
    #[error("not authenticated: {0}")]
    NotAuthenticated(&'static str),

    /// A remote write (cart or scan) failed; nothing was committed.
    #[error("remote write failed: {0}")]
    RemoteWriteFailed(#[source] RemoteError),

    /// A remote read failed; the previous snapshot is still in use.
    #[error("remote fetch failed: {0}")]
    RemoteFetchFailed(#[source] RemoteError),

    /// No usable camera.
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    /// Client storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Identity provider failed.
    #[error("identity provider error: {0}")]
    Identity(#[from] IdentityError),

    /// The requested transition is not valid from the current state.
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: String,
    },

    /// A checkout is already being processed.
    #[error("checkout already in progress")]
    CheckoutInProgress,

    /// Checkout was requested for an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// The product cannot be added because it is out of stock.
    #[error("product {0} is out of stock")]
    OutOfStock(String),

    /// A saved address or scan report does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A profile edit carried an unusable email address.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
}

impl From<CameraError> for StorefrontError {
    fn from(err: CameraError) -> Self {
        match err {
            CameraError::PermissionDenied => Self::PermissionDenied,
            CameraError::Unavailable(reason) => Self::CameraUnavailable(reason),
        }
    }
}

impl StorefrontError {
    /// The toast the UI shows for this error.
    #[must_use]
    pub fn notification(&self) -> Notification {
        match self {
            Self::PermissionDenied => Notification::error(
                "Camera Access Denied",
                "Please allow camera access to use body scan feature.",
            ),
            Self::NotAuthenticated(what) => {
                Notification::warning("Login Required", format!("Please login to {what}."))
            }
            Self::CameraUnavailable(_) => {
                Notification::error("Camera Unavailable", "No camera was found on this device.")
            }
            Self::RemoteWriteFailed(_) => {
                Notification::error("Error", "Failed to save your changes. Please try again.")
            }
            Self::RemoteFetchFailed(_) => {
                Notification::error("Error", "Failed to load your data. Please try again.")
            }
            Self::Storage(_) | Self::Identity(_) => {
                Notification::error("Error", "Something went wrong. Please try again.")
            }
            Self::InvalidTransition { .. } => Notification::info("Please Wait", self.to_string()),
            Self::CheckoutInProgress => {
                Notification::info("Processing", "Your order is already being placed.")
            }
            Self::EmptyCart => {
                Notification::warning("Cart Empty", "Add something to your cart first.")
            }
            Self::OutOfStock(_) => {
                Notification::warning("Out of Stock", "This item is currently out of stock.")
            }
            Self::NotFound(what) => {
                Notification::error("Not Found", format!("{what} could not be found."))
            }
            Self::InvalidEmail(_) => {
                Notification::warning("Invalid Email", "Please enter a valid email address.")
            }
        }
    }

    /// Whether this error indicates a backend or device fault worth tracking,
    /// as opposed to an expected user-state condition.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(
            self,
            Self::RemoteWriteFailed(_)
                | Self::RemoteFetchFailed(_)
                | Self::Storage(_)
                | Self::Identity(_)
        )
    }

    /// Capture faults to Sentry and log them. Returns `self` so call sites can
    /// write `Err(err.report())`.
    #[must_use]
    pub fn report(self) -> Self {
        if self.is_fault() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Storefront operation failed"
            );
        } else {
            tracing::debug!(error = %self, "Storefront operation rejected");
        }
        self
    }

    /// Report the error and show its toast. Returns `self` for `Err(...)`.
    #[must_use]
    pub fn surface(self, notifier: &dyn NotificationSink) -> Self {
        let err = self.report();
        notifier.notify(err.notification());
        err
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after login to associate errors with the shopper.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the shopper.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for shopper actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart and
/// scan actions leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use threadline_core::NotificationKind;

    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorefrontError::NotAuthenticated("complete your purchase");
        assert_eq!(err.to_string(), "not authenticated: complete your purchase");

        let err = StorefrontError::InvalidTransition {
            action: "cancel",
            state: "idle".to_string(),
        };
        assert_eq!(err.to_string(), "cannot cancel while idle");
    }

    #[test]
    fn test_error_notifications() {
        let login = StorefrontError::NotAuthenticated("use the body scan feature").notification();
        assert_eq!(login.kind, NotificationKind::Warning);
        assert_eq!(login.title, "Login Required");
        assert_eq!(login.message, "Please login to use the body scan feature.");

        let camera = StorefrontError::PermissionDenied.notification();
        assert_eq!(camera.kind, NotificationKind::Error);
        assert_eq!(camera.title, "Camera Access Denied");

        let write = StorefrontError::RemoteWriteFailed(RemoteError::Unavailable("x".into()));
        assert_eq!(write.notification().kind, NotificationKind::Error);

        let missing = StorefrontError::NotFound("Address 3".into()).notification();
        assert_eq!(missing.message, "Address 3 could not be found.");
    }

    #[test]
    fn test_surface_shows_toast() {
        let notifier = crate::notify::RecordingNotifier::new();
        let err = StorefrontError::EmptyCart.surface(&notifier);

        assert!(matches!(err, StorefrontError::EmptyCart));
        assert_eq!(notifier.titles(), vec!["Cart Empty"]);
    }

    #[test]
    fn test_fault_classification() {
        assert!(StorefrontError::RemoteFetchFailed(RemoteError::NotFound("x".into())).is_fault());
        assert!(!StorefrontError::PermissionDenied.is_fault());
        assert!(!StorefrontError::EmptyCart.is_fault());
        assert!(!StorefrontError::NotFound("Scan scan_1".into()).is_fault());
    }
}
