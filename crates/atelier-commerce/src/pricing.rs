//! Stateless pricing helpers shared by the storefront and the admin views.

use crate::catalog::Product;
use crate::money::Money;

/// Sale price if set, else list price.
pub fn effective_price(product: &Product) -> Money {
    product.sale_price.unwrap_or(product.price)
}

/// Whether the product has a sale price strictly below its list price.
pub fn is_on_sale(product: &Product) -> bool {
    product
        .sale_price
        .is_some_and(|sale| sale.currency == product.price.currency && sale.amount_minor < product.price.amount_minor)
}

/// Whole-percent saving of `sale` against `compare_at`, rounded.
///
/// A `compare_at` of zero yields 0.
///
/// ```
/// use atelier_commerce::pricing::discount_percentage;
/// assert_eq!(discount_percentage(8000, 6000), 25);
/// assert_eq!(discount_percentage(0, 50), 0);
/// ```
pub fn discount_percentage(compare_at: i64, sale: i64) -> i64 {
    if compare_at == 0 {
        return 0;
    }
    ((compare_at - sale) as f64 / compare_at as f64 * 100.0).round() as i64
}

/// Percentage badge for a product, if it is on sale.
pub fn product_discount_percentage(product: &Product) -> Option<i64> {
    if !is_on_sale(product) {
        return None;
    }
    let sale = effective_price(product);
    Some(discount_percentage(product.price.amount_minor, sale.amount_minor))
}

/// In stock, but at or below the threshold.
pub fn is_low_stock(quantity: u32, threshold: u32) -> bool {
    quantity > 0 && quantity <= threshold
}

/// Format a price for display, e.g. `£1,234.50`.
pub fn format_price(money: &Money) -> String {
    money.display()
}
