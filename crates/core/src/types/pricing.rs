//! Order pricing derived from a cart.
//!
//! A [`PricingBreakdown`] is recomputed from the cart on every read and is
//! never stored, so it cannot go stale.
//!
//! Tax is computed with exact decimal arithmetic and rounded to the nearest
//! whole unit, midpoints away from zero (`999 × 0.18 = 179.82 → 180`,
//! `2050 × 0.18 = 369.00`, `25 × 0.18 = 4.50 → 5`).

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::{Cart, Price};

/// Subtotal above which shipping is free.
pub const FREE_SHIPPING_THRESHOLD: Price = Price::new(2000);

/// Flat shipping fee below the threshold.
pub const FLAT_SHIPPING_FEE: Price = Price::new(200);

/// Tax rate in basis points (18%).
pub const TAX_RATE_BASIS_POINTS: i64 = 1800;

/// The storefront's pricing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingRules {
    /// Shipping is free when the subtotal is strictly greater than this.
    pub free_shipping_threshold: Price,
    /// Shipping charged otherwise.
    pub flat_shipping_fee: Price,
    /// Tax rate as a fraction (0.18 for 18%).
    pub tax_rate: Decimal,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            free_shipping_threshold: FREE_SHIPPING_THRESHOLD,
            flat_shipping_fee: FLAT_SHIPPING_FEE,
            tax_rate: Decimal::new(TAX_RATE_BASIS_POINTS, 4),
        }
    }
}

impl PricingRules {
    /// Price a cart.
    #[must_use]
    pub fn breakdown(&self, cart: &Cart) -> PricingBreakdown {
        let subtotal = cart.subtotal();
        let shipping = self.shipping_for(subtotal);
        let tax = self.tax_for(subtotal);

        PricingBreakdown {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }

    /// Shipping for a subtotal.
    #[must_use]
    pub fn shipping_for(&self, subtotal: Price) -> Price {
        if subtotal > self.free_shipping_threshold {
            Price::ZERO
        } else {
            self.flat_shipping_fee
        }
    }

    /// Tax for a subtotal, rounded half away from zero.
    #[must_use]
    pub fn tax_for(&self, subtotal: Price) -> Price {
        let tax = (subtotal.to_decimal() * self.tax_rate)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        // A rounded product of an i64 and a rate below 1 always fits in i64.
        Price::new(tax.to_i64().unwrap_or(i64::MAX))
    }
}

/// Subtotal, shipping, tax and total for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub subtotal: Price,
    pub shipping: Price,
    pub tax: Price,
    pub total: Price,
}

impl PricingBreakdown {
    /// Price a cart with the default rules.
    #[must_use]
    pub fn for_cart(cart: &Cart) -> Self {
        PricingRules::default().breakdown(cart)
    }
}
