//! Storefront domain types and logic for Atelier.
//!
//! - **Money**: integer minor-unit amounts with GBP formatting
//! - **Pricing**: effective price, discount percentage, low-stock test
//! - **Catalog**: products, categories, collections, reviews
//! - **Orders**: back-office order records and statuses
//! - **Cart**: merge-keyed line items, clamped quantities, derived summary
//!
//! # Example
//!
//! ```rust,ignore
//! use atelier_commerce::prelude::*;
//!
//! let dress = Product::from_draft(
//!     RecordId::confirmed("p1"),
//!     ProductDraft::new("Linen Midi Dress", Money::gbp(8900)),
//!     SystemClock.now_millis(),
//! );
//!
//! let mut cart = CartStore::new(CartPolicy::default());
//! cart.add_item(&dress, 1, SelectedOptions::new().size("M"))?;
//!
//! let summary = cart.summary();
//! println!("Total: {}", summary.total.display());
//! ```

pub mod clock;
pub mod error;
pub mod ids;
pub mod money;
pub mod pricing;

pub mod cart;
pub mod catalog;
pub mod orders;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CommerceError;
pub use ids::{LineItemId, RecordId};
pub use money::{Currency, Money};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::error::CommerceError;
    pub use crate::ids::{LineItemId, RecordId};
    pub use crate::money::{Currency, Money};
    pub use crate::pricing::{discount_percentage, effective_price, format_price, is_low_stock};

    // Catalog
    pub use crate::catalog::{
        Category, CategoryDraft, Collection, CollectionDraft, Product, ProductDraft,
        ProductStatus, Review, ReviewDraft,
    };

    // Orders
    pub use crate::orders::{Address, Order, OrderDraft, OrderLineItem, OrderStatus};

    // Cart
    pub use crate::cart::{
        CartLineItem, CartPolicy, CartStore, CartSummary, LineSummary, SelectedOptions,
    };
}
