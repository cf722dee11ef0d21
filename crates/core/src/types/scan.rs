//! Body-scan records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ScanId;

/// User-agent fragments that classify a client as a mobile device.
const MOBILE_MARKERS: &[&str] = &["Mobile", "Android", "iPhone", "iPad"];

/// Device class a scan was captured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Mobile,
    #[default]
    Desktop,
}

impl Device {
    /// Classify a user-agent string.
    #[must_use]
    pub fn from_user_agent(user_agent: &str) -> Self {
        if MOBILE_MARKERS.iter().any(|m| user_agent.contains(m)) {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mobile => write!(f, "mobile"),
            Self::Desktop => write!(f, "desktop"),
        }
    }
}

/// Body measurements, when a capture produced any.
///
/// Lengths are centimetres, weight is kilograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurements {
    pub height: Option<u16>,
    pub weight: Option<u16>,
    pub chest: Option<u16>,
    pub waist: Option<u16>,
    pub shoulders: Option<u16>,
    pub hips: Option<u16>,
}

/// The persisted outcome of one completed capture session.
///
/// Immutable once saved; there is no update path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub scan_id: ScanId,
    pub timestamp: DateTime<Utc>,
    pub device: Device,
    #[serde(default)]
    pub measurements: Option<Measurements>,
    #[serde(default)]
    pub try_on_count: u32,
}

impl ScanRecord {
    /// A fresh record captured at `at`, with no measurements and no try-ons.
    ///
    /// The id is `scan_<unix millis>`.
    #[must_use]
    pub fn captured(device: Device, at: DateTime<Utc>) -> Self {
        Self {
            scan_id: ScanId::new(format!("scan_{}", at.timestamp_millis())),
            timestamp: at,
            device,
            measurements: None,
            try_on_count: 0,
        }
    }
}
