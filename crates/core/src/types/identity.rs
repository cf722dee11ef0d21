//! Signed-in identity.

use serde::{Deserialize, Serialize};

use super::{Email, UserId};

/// The identity of a signed-in shopper.
///
/// Absence of an `Identity` means the shopper is a guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Identity provider user id; also keys the remote cart and scan stores.
    pub id: UserId,
    /// Display name, if the provider has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Email, if the provider has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
}

impl Identity {
    /// Create an identity with only a user id.
    #[must_use]
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            email: None,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Set the email.
    #[must_use]
    pub fn with_email(mut self, email: Email) -> Self {
        self.email = Some(email);
        self
    }

    /// Name to greet the shopper with: display name, else email local part,
    /// else the user id.
    #[must_use]
    pub fn greeting_name(&self) -> &str {
        self.display_name
            .as_deref()
            .or_else(|| self.email.as_ref().map(Email::local_part))
            .unwrap_or_else(|| self.id.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_name_fallbacks() {
        let bare = Identity::new("uid-7");
        assert_eq!(bare.greeting_name(), "uid-7");

        let with_email = bare.clone().with_email(Email::parse("meera@example.in").unwrap());
        assert_eq!(with_email.greeting_name(), "meera");

        let named = with_email.with_display_name("Meera K");
        assert_eq!(named.greeting_name(), "Meera K");
    }
}
