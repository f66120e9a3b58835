//! Cart totals.

use crate::cart::CartLineItem;
use crate::error::CommerceError;
use crate::ids::LineItemId;
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Pricing rules applied to a cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CartPolicy {
    /// Currency of the storefront.
    pub currency: Currency,
    /// Tax rate applied to the subtotal (0.20 = 20% VAT).
    pub tax_rate: f64,
    /// Subtotal at or above which shipping is free.
    pub free_shipping_threshold: Money,
    /// Shipping charged below the threshold.
    pub standard_shipping: Money,
    /// Ceiling for a single line's quantity.
    pub max_quantity: u32,
}

impl Default for CartPolicy {
    fn default() -> Self {
        Self {
            currency: Currency::GBP,
            tax_rate: 0.20,
            free_shipping_threshold: Money::gbp(5000),
            standard_shipping: Money::gbp(499),
            max_quantity: 10,
        }
    }
}

impl CartPolicy {
    /// Clamp a requested quantity into `1..=max_quantity`.
    pub fn clamp_quantity(&self, quantity: i64) -> u32 {
        let max = self.max_quantity.max(1);
        quantity.clamp(1, i64::from(max)) as u32
    }

    /// Fail when the threshold or shipping cost is not in `currency`.
    pub fn validate(&self) -> Result<(), CommerceError> {
        for amount in [&self.free_shipping_threshold, &self.standard_shipping] {
            if amount.currency != self.currency {
                return Err(CommerceError::CurrencyMismatch {
                    expected: self.currency.code().to_string(),
                    got: amount.currency.code().to_string(),
                });
            }
        }
        Ok(())
    }

    /// How much more the shopper must spend for free shipping, if anything.
    pub fn remaining_for_free_shipping(&self, subtotal: &Money) -> Option<Money> {
        let remaining = self.free_shipping_threshold.try_subtract(subtotal)?;
        remaining.is_positive().then_some(remaining)
    }
}

/// Complete pricing breakdown for a cart.
///
/// Always computed from the current items; never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartSummary {
    /// Sum of effective price times quantity.
    pub subtotal: Money,
    /// Tax on the subtotal.
    pub tax: Money,
    /// Shipping cost.
    pub shipping: Money,
    /// Promotional discount. Promo codes are not applied, so always zero.
    pub discount: Money,
    /// subtotal + tax + shipping - discount.
    pub total: Money,
    /// Per-line breakdown.
    pub lines: Vec<LineSummary>,
}

impl CartSummary {
    /// Price `items` under `policy`.
    ///
    /// Lines priced in another currency cannot be added to a cart; any that
    /// reach here anyway are left out of every figure and logged.
    pub fn compute(items: &[CartLineItem], policy: &CartPolicy) -> Self {
        let zero = Money::zero(policy.currency);

        let lines: Vec<LineSummary> = items
            .iter()
            .filter(|item| {
                let priced_in = item.unit_price().currency;
                if priced_in != policy.currency {
                    warn!(
                        line = %item.id,
                        currency = priced_in.code(),
                        expected = policy.currency.code(),
                        "cart line priced in another currency left out of totals"
                    );
                }
                priced_in == policy.currency
            })
            .map(|item| LineSummary {
                line_item_id: item.id.clone(),
                unit_price: item.unit_price(),
                quantity: item.quantity,
                line_total: item.line_total(),
            })
            .collect();

        let subtotal = Money::new(
            lines
                .iter()
                .fold(0i64, |acc, line| acc.saturating_add(line.line_total.amount_minor)),
            policy.currency,
        );

        let tax = subtotal.multiply_rate(policy.tax_rate);

        let free = subtotal >= policy.free_shipping_threshold;
        let shipping = if lines.is_empty() || free {
            zero
        } else {
            policy.standard_shipping
        };

        let discount = zero;

        let total = Money::try_sum([subtotal, tax, shipping].iter(), policy.currency)
            .and_then(|sum| sum.try_subtract(&discount))
            .unwrap_or_else(|| {
                warn!(
                    currency = policy.currency.code(),
                    shipping = shipping.currency.code(),
                    "cart policy shipping is in another currency; total excludes it"
                );
                Money::new(
                    subtotal.amount_minor.saturating_add(tax.amount_minor),
                    policy.currency,
                )
            });

        Self {
            subtotal,
            tax,
            shipping,
            discount,
            total,
            lines,
        }
    }

    /// Check if shipping is free for this cart.
    pub fn has_free_shipping(&self) -> bool {
        self.shipping.is_zero()
    }
}

/// Pricing breakdown for a single line item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineSummary {
    /// Line item ID.
    pub line_item_id: LineItemId,
    /// Effective unit price.
    pub unit_price: Money,
    /// Quantity.
    pub quantity: u32,
    /// unit_price * quantity.
    pub line_total: Money,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Product, ProductDraft};
    use crate::ids::RecordId;

    #[test]
    fn test_default_policy() {
        let policy = CartPolicy::default();
        assert_eq!(policy.free_shipping_threshold, Money::gbp(5000));
        assert_eq!(policy.standard_shipping, Money::gbp(499));
        assert_eq!(policy.max_quantity, 10);
    }

    #[test]
    fn test_clamp_quantity() {
        let policy = CartPolicy::default();
        assert_eq!(policy.clamp_quantity(0), 1);
        assert_eq!(policy.clamp_quantity(-3), 1);
        assert_eq!(policy.clamp_quantity(4), 4);
        assert_eq!(policy.clamp_quantity(99), 10);
    }

    #[test]
    fn test_remaining_for_free_shipping() {
        let policy = CartPolicy::default();
        assert_eq!(
            policy.remaining_for_free_shipping(&Money::gbp(3500)),
            Some(Money::gbp(1500))
        );
        assert_eq!(policy.remaining_for_free_shipping(&Money::gbp(5000)), None);
        assert_eq!(policy.remaining_for_free_shipping(&Money::gbp(9000)), None);
    }

    #[test]
    fn test_empty_summary() {
        let summary = CartSummary::compute(&[], &CartPolicy::default());
        assert!(summary.total.is_zero());
        assert!(summary.shipping.is_zero());
        assert!(summary.lines.is_empty());
    }

    fn gbp_line(id: &str, pence: i64, quantity: u32) -> CartLineItem {
        let product = Product::from_draft(
            RecordId::confirmed(id),
            ProductDraft::new(format!("Product {id}"), Money::gbp(pence)),
            0,
        );
        CartLineItem {
            id: LineItemId::for_selection(&product.id, None, None),
            product,
            quantity,
            selected_size: None,
            selected_color: None,
        }
    }

    #[test]
    fn test_lines_in_another_currency_are_left_out_consistently() {
        let mut euro = gbp_line("p2", 2000, 1);
        euro.product.price = Money::new(2000, Currency::EUR);
        let items = vec![gbp_line("p1", 10000, 3), euro];

        let summary = CartSummary::compute(&items, &CartPolicy::default());
        assert_eq!(summary.lines.len(), 1);
        assert_eq!(summary.subtotal, Money::gbp(30000));
        assert_eq!(summary.tax, Money::gbp(6000));
        assert_eq!(summary.total, Money::gbp(36000));
    }

    #[test]
    fn test_threshold_compared_as_money() {
        let policy = CartPolicy::default();
        let at = CartSummary::compute(&[gbp_line("p1", 5000, 1)], &policy);
        let below = CartSummary::compute(&[gbp_line("p1", 4999, 1)], &policy);
        assert!(at.has_free_shipping());
        assert_eq!(below.shipping, Money::gbp(499));
        assert_eq!(below.total, Money::gbp(4999 + 1000 + 499));
    }

    #[test]
    fn test_validate_rejects_mixed_currency_policy() {
        let policy = CartPolicy {
            currency: Currency::EUR,
            ..CartPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(CommerceError::CurrencyMismatch { .. })
        ));
        assert!(CartPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_policy_from_partial_config() {
        let policy: CartPolicy = serde_json::from_str(r#"{"max_quantity": 3}"#).unwrap();
        assert_eq!(policy.max_quantity, 3);
        assert_eq!(policy.tax_rate, 0.20);
    }
}
