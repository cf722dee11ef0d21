//! Notification preferences from the settings page.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorefrontError};
use crate::notify::{Notification, SharedNotifier};
use crate::storage::{KeyValueStore, StorageError, keys, load_json, save_json};

/// Which notifications the shopper wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPreferences {
    pub order_updates: bool,
    pub promotions: bool,
    pub scan_reminders: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            order_updates: true,
            promotions: false,
            scan_reminders: true,
        }
    }
}

/// One preference toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceToggle {
    OrderUpdates,
    Promotions,
    ScanReminders,
}

impl PreferenceToggle {
    const fn label(self) -> &'static str {
        match self {
            Self::OrderUpdates => "Order updates",
            Self::Promotions => "Promotions",
            Self::ScanReminders => "Scan reminders",
        }
    }
}

impl NotificationPreferences {
    const fn slot(&mut self, toggle: PreferenceToggle) -> &mut bool {
        match toggle {
            PreferenceToggle::OrderUpdates => &mut self.order_updates,
            PreferenceToggle::Promotions => &mut self.promotions,
            PreferenceToggle::ScanReminders => &mut self.scan_reminders,
        }
    }
}

/// Persisted preferences under the `preferences` key.
pub struct PreferencesStore {
    storage: Arc<dyn KeyValueStore>,
    current: Mutex<NotificationPreferences>,
    notifier: SharedNotifier,
}

impl std::fmt::Debug for PreferencesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferencesStore")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl PreferencesStore {
    /// Load saved preferences, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store itself cannot be read.
    pub fn load(
        storage: Arc<dyn KeyValueStore>,
        notifier: SharedNotifier,
    ) -> std::result::Result<Self, StorageError> {
        let current = load_json(storage.as_ref(), keys::PREFERENCES)?.unwrap_or_default();
        Ok(Self {
            storage,
            current: Mutex::new(current),
            notifier,
        })
    }

    #[must_use]
    pub fn get(&self) -> NotificationPreferences {
        self.current.lock().map(|p| *p).unwrap_or_default()
    }

    /// Flip one toggle on or off and save.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the preferences cannot be written; nothing changes.
    pub fn set(&self, toggle: PreferenceToggle, enabled: bool) -> Result<NotificationPreferences> {
        let saved = self.write(toggle, enabled).map_err(|e| {
            StorefrontError::from(e).surface(self.notifier.as_ref())
        })?;
        let state = if enabled { "enabled" } else { "disabled" };
        self.notifier.notify(Notification::success(
            "Notification Updated",
            format!("{} {state}.", toggle.label()),
        ));
        Ok(saved)
    }

    fn write(
        &self,
        toggle: PreferenceToggle,
        enabled: bool,
    ) -> std::result::Result<NotificationPreferences, StorageError> {
        let mut current = self.current.lock().map_err(|_| StorageError::Poisoned)?;
        let mut next = *current;
        *next.slot(toggle) = enabled;
        save_json(self.storage.as_ref(), keys::PREFERENCES, &next)?;
        *current = next;
        Ok(next)
    }
}
