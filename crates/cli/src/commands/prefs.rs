//! Notification preference commands.

#![allow(clippy::print_stdout)]

use threadline_storefront::Storefront;
use threadline_storefront::preferences::PreferenceToggle;

use super::CliError;

/// Print the current preferences as JSON.
///
/// # Errors
///
/// Returns `Json` if the preferences cannot be encoded.
pub fn show(storefront: &Storefront) -> Result<(), CliError> {
    let prefs = storefront.preferences().get();
    println!("{}", serde_json::to_string_pretty(&prefs)?);
    Ok(())
}

pub fn set(storefront: &Storefront, toggle: PreferenceToggle, enabled: bool) -> Result<(), CliError> {
    storefront.preferences().set(toggle, enabled)?;
    show(storefront)
}
