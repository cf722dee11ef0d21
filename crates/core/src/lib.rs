//! Threadline Core - Shared types library.
//!
//! This crate provides the domain types used across all Threadline components:
//! - `storefront` - Client-side cart, checkout and scan state
//! - `cli` - Command-line driver for the guest cart and simulated scans
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no timers,
//! no HTTP clients. Everything here can be evaluated synchronously, which is
//! what keeps cart arithmetic and pricing trivially testable.
//!
//! # Modules
//!
//! - [`types`] - Ids, prices, emails, identities, carts, pricing and scan records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
