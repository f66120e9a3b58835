//! Shopping cart module.
//!
//! Contains the cart store, its line items, and the derived order summary.

#[allow(clippy::module_inception)]
mod cart;
mod summary;

pub use cart::{CartLineItem, CartStore, SelectedOptions, CART_STORAGE_KEY};
pub use summary::{CartPolicy, CartSummary, LineSummary};
