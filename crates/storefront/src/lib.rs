//! Threadline storefront client state.
//!
//! The state a storefront UI binds to: the guest or signed-in cart with its
//! pricing, a simulated checkout, the body scan capture flow and its reports,
//! the wishlist, notification preferences and the shopper's profile. Backends, the camera and the toast surface are
//! reached through traits so each can be swapped for an in-process fake.
//!
//! Start from [`Storefront`], which wires every component together.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod notify;
pub mod preferences;
pub mod profile;
pub mod remote;
pub mod scan;
pub mod session;
pub mod state;
pub mod storage;
pub mod wishlist;

pub use error::{Result, StorefrontError};
pub use state::{Collaborators, Storefront};
