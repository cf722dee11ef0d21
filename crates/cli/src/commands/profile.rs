//! Profile and delivery address commands.

#![allow(clippy::print_stdout)]

use threadline_storefront::Storefront;
use threadline_storefront::profile::ProfileEdit;

use super::CliError;

/// Print the saved profile as JSON.
///
/// # Errors
///
/// Returns `Json` if the profile cannot be encoded.
pub fn show(storefront: &Storefront) -> Result<(), CliError> {
    let profile = storefront.profile().get();
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

/// Apply the given fields and print the result.
///
/// # Errors
///
/// Returns `InvalidArgument` when no field is given, or the storefront's
/// error for an invalid email or a failed write.
pub fn set(storefront: &Storefront, edit: ProfileEdit) -> Result<(), CliError> {
    if edit == ProfileEdit::default() {
        return Err(CliError::InvalidArgument(
            "give at least one of --name, --email, --phone, --style, --gender".to_string(),
        ));
    }
    storefront.profile().update(edit)?;
    show(storefront)
}

pub fn add_address(storefront: &Storefront, label: &str, address: &str) -> Result<(), CliError> {
    let added = storefront.profile().add_address(label, address)?;
    println!("Saved address {} ({})", added.id, added.label);
    Ok(())
}

pub fn update_address(storefront: &Storefront, id: u32, address: &str) -> Result<(), CliError> {
    let updated = storefront.profile().update_address(id, address)?;
    println!("{}  {}  {}", updated.id, updated.label, updated.address);
    Ok(())
}
