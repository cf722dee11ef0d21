//! Status enums for the storefront state machines and notifications.

use serde::{Deserialize, Serialize};

/// Checkout stub status.
///
/// `Idle -> Processing -> Settled`. There is no failure state: checkout is
/// simulated and cannot fail once it has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    #[default]
    Idle,
    Processing,
    Settled,
}

/// Scan capture phase.
///
/// ```text
/// Idle -> RequestingCamera -> Previewing -> CountingDown(n..0) -> Completing -> Idle
///               |                  |               |
///               +-> Idle (denied)  +---- cancel ---+-> Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "phase", content = "remaining")]
pub enum ScanPhase {
    #[default]
    Idle,
    RequestingCamera,
    Previewing,
    /// Seconds left before capture completes.
    CountingDown(u32),
    Completing,
}

impl ScanPhase {
    /// Whether a camera stream is held in this phase.
    #[must_use]
    pub const fn holds_camera(self) -> bool {
        matches!(self, Self::Previewing | Self::CountingDown(_) | Self::Completing)
    }

    /// Whether `cancel` is accepted in this phase.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Previewing | Self::CountingDown(_))
    }
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::RequestingCamera => write!(f, "requesting_camera"),
            Self::Previewing => write!(f, "previewing"),
            Self::CountingDown(n) => write!(f, "counting_down({n})"),
            Self::Completing => write!(f, "completing"),
        }
    }
}

/// Severity of a user-visible notification (toast).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            _ => Err(format!("invalid notification kind: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_phase_camera_ownership() {
        assert!(!ScanPhase::Idle.holds_camera());
        assert!(!ScanPhase::RequestingCamera.holds_camera());
        assert!(ScanPhase::Previewing.holds_camera());
        assert!(ScanPhase::CountingDown(12).holds_camera());
        assert!(ScanPhase::Completing.holds_camera());
    }

    #[test]
    fn test_scan_phase_cancellable() {
        assert!(ScanPhase::Previewing.is_cancellable());
        assert!(ScanPhase::CountingDown(1).is_cancellable());
        assert!(ScanPhase::CountingDown(0).is_cancellable());
        assert!(!ScanPhase::Completing.is_cancellable());
        assert!(!ScanPhase::Idle.is_cancellable());
    }

    #[test]
    fn test_scan_phase_serde() {
        let json = serde_json::to_value(ScanPhase::CountingDown(30)).unwrap();
        assert_eq!(json, serde_json::json!({"phase": "counting_down", "remaining": 30}));
    }

    #[test]
    fn test_notification_kind_roundtrip() {
        for kind in [
            NotificationKind::Success,
            NotificationKind::Info,
            NotificationKind::Warning,
            NotificationKind::Error,
        ] {
            assert_eq!(kind.to_string().parse::<NotificationKind>().unwrap(), kind);
        }
    }
}
