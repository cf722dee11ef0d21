//! Guest cart storage and the unified cart view.

mod local;
mod service;

pub use local::LocalCartStore;
pub use service::{CartOp, CartService, HeldCart, MigrationReport};
