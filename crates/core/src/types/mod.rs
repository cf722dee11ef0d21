//! Core types for Threadline.
//!
//! This module provides type-safe wrappers for the storefront domain.

pub mod cart;
pub mod email;
pub mod id;
pub mod identity;
pub mod price;
pub mod pricing;
pub mod product;
pub mod scan;
pub mod status;

pub use cart::{Cart, CartLineItem, LineKey, clamp_quantity};
pub use email::{Email, EmailError};
pub use id::*;
pub use identity::Identity;
pub use price::{CurrencyCode, Price};
pub use pricing::{PricingBreakdown, PricingRules};
pub use product::Product;
pub use scan::{Device, Measurements, ScanRecord};
pub use status::*;
