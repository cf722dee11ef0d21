//! Profile details and saved delivery addresses.
//!
//! Kept on the client under the `profile` key, next to the preferences. The
//! name and email are filled from the identity provider on sign-in when the
//! shopper has not set them yet.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use threadline_core::{Email, Identity};
use tracing::debug;

use crate::error::{Result, StorefrontError};
use crate::notify::{Notification, SharedNotifier};
use crate::storage::{KeyValueStore, StorageError, keys, load_json, save_json};

/// A saved delivery address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: u32,
    /// Label shown above the address, such as "Home".
    #[serde(rename = "type")]
    pub label: String,
    pub address: String,
    #[serde(default)]
    pub is_default: bool,
}

/// What the shopper has told the storefront about themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub name: String,
    pub email: Option<Email>,
    pub phone: String,
    pub style_preference: String,
    pub gender: String,
    pub addresses: Vec<Address>,
}

impl Profile {
    #[must_use]
    pub fn default_address(&self) -> Option<&Address> {
        self.addresses.iter().find(|address| address.is_default)
    }

    fn address_mut(&mut self, id: u32) -> Result<&mut Address> {
        self.addresses
            .iter_mut()
            .find(|address| address.id == id)
            .ok_or_else(|| StorefrontError::NotFound(format!("Address {id}")))
    }
}

/// A partial profile edit. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileEdit {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub style_preference: Option<String>,
    pub gender: Option<String>,
}

impl ProfileEdit {
    fn apply(self, profile: &mut Profile) -> Result<()> {
        // Validate before touching anything so a bad email changes nothing.
        let email = self.email.as_deref().map(Email::parse).transpose()?;

        if let Some(name) = self.name {
            profile.name = name.trim().to_string();
        }
        if email.is_some() {
            profile.email = email;
        }
        if let Some(phone) = self.phone {
            profile.phone = phone.trim().to_string();
        }
        if let Some(style) = self.style_preference {
            profile.style_preference = style.trim().to_string();
        }
        if let Some(gender) = self.gender {
            profile.gender = gender.trim().to_string();
        }
        Ok(())
    }
}

/// Persisted profile under the `profile` key.
pub struct ProfileStore {
    storage: Arc<dyn KeyValueStore>,
    current: Mutex<Profile>,
    notifier: SharedNotifier,
}

impl std::fmt::Debug for ProfileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStore").finish_non_exhaustive()
    }
}

impl ProfileStore {
    /// Load the saved profile, or an empty one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store itself cannot be read.
    pub fn load(
        storage: Arc<dyn KeyValueStore>,
        notifier: SharedNotifier,
    ) -> std::result::Result<Self, StorageError> {
        let current = load_json(storage.as_ref(), keys::PROFILE)?.unwrap_or_default();
        Ok(Self {
            storage,
            current: Mutex::new(current),
            notifier,
        })
    }

    #[must_use]
    pub fn get(&self) -> Profile {
        self.current
            .lock()
            .map(|profile| profile.clone())
            .unwrap_or_default()
    }

    /// Fill an empty name and email from the signed-in identity. Silent.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the profile cannot be written.
    pub fn prefill(&self, identity: &Identity) -> Result<Profile> {
        self.write(|profile| {
            if profile.name.is_empty()
                && let Some(name) = &identity.display_name
            {
                profile.name.clone_from(name);
            }
            if profile.email.is_none() {
                profile.email.clone_from(&identity.email);
            }
            Ok(())
        })
        .map(|((), profile)| profile)
    }

    /// Save profile edits.
    ///
    /// # Errors
    ///
    /// - `InvalidEmail` if the new email does not parse; nothing changes
    /// - `Storage` if the profile cannot be written
    pub fn update(&self, edit: ProfileEdit) -> Result<Profile> {
        let ((), profile) = self
            .write(|profile| edit.apply(profile))
            .map_err(|e| e.surface(self.notifier.as_ref()))?;
        self.notifier.notify(Notification::success(
            "Profile Updated",
            "Your profile has been updated successfully!",
        ));
        Ok(profile)
    }

    /// Save a new delivery address. The first one saved becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the profile cannot be written.
    pub fn add_address(&self, label: &str, address: &str) -> Result<Address> {
        let (added, _) = self
            .write(|profile| {
                let id = profile.addresses.iter().map(|a| a.id).max().unwrap_or(0) + 1;
                let added = Address {
                    id,
                    label: label.trim().to_string(),
                    address: address.trim().to_string(),
                    is_default: profile.addresses.is_empty(),
                };
                profile.addresses.push(added.clone());
                Ok(added)
            })
            .map_err(|e| e.surface(self.notifier.as_ref()))?;
        debug!(address_id = added.id, "Address added");
        self.notifier.notify(Notification::success(
            "Address Added",
            "Your address has been saved.",
        ));
        Ok(added)
    }

    /// Replace the text of a saved address.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no address has this id
    /// - `Storage` if the profile cannot be written
    pub fn update_address(&self, id: u32, address: &str) -> Result<Address> {
        let (updated, _) = self
            .write(|profile| {
                let entry = profile.address_mut(id)?;
                entry.address = address.trim().to_string();
                Ok(entry.clone())
            })
            .map_err(|e| e.surface(self.notifier.as_ref()))?;
        self.notifier.notify(Notification::success(
            "Address Updated",
            "Your address has been updated successfully!",
        ));
        Ok(updated)
    }

    /// Apply `change` to a copy, save it, then commit it in memory.
    fn write<T>(&self, change: impl FnOnce(&mut Profile) -> Result<T>) -> Result<(T, Profile)> {
        let mut current = self.current.lock().map_err(|_| StorageError::Poisoned)?;
        let mut next = current.clone();
        let output = change(&mut next)?;
        if next != *current {
            save_json(self.storage.as_ref(), keys::PROFILE, &next)?;
            current.clone_from(&next);
        }
        Ok((output, next))
    }
}
