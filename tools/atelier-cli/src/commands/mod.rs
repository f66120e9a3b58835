//! CLI command implementations.

pub mod cart;
pub mod categories;
pub mod collections;
pub mod config;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod sync;

use anyhow::{bail, Result};
use atelier_commerce::{Currency, Money, RecordId};
use clap::{Args, Subcommand};
use dialoguer::Confirm;

use crate::context::Context;

/// Arguments for the cart command.
#[derive(Args)]
pub struct CartArgs {
    #[command(subcommand)]
    pub command: Option<CartCommand>,
}

#[derive(Subcommand)]
pub enum CartCommand {
    /// Show cart lines and totals.
    Show,
    /// Add a product from the local catalog.
    Add {
        /// Product id.
        product: String,
        /// Quantity to add.
        #[arg(short, long, default_value = "1", allow_negative_numbers = true)]
        quantity: i64,
        /// Selected size.
        #[arg(long)]
        size: Option<String>,
        /// Selected color.
        #[arg(long)]
        color: Option<String>,
    },
    /// Set a line's quantity; below 1 removes the line.
    Update {
        /// Line id, as shown by `cart show`.
        line: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line.
    Remove {
        /// Line id, as shown by `cart show`.
        line: String,
    },
    /// Remove every line.
    Clear,
}

/// Arguments for the products command.
#[derive(Args)]
pub struct ProductsArgs {
    #[command(subcommand)]
    pub command: Option<ProductsCommand>,
}

#[derive(Subcommand)]
pub enum ProductsCommand {
    /// List products.
    List {
        /// Only products in this category.
        #[arg(long)]
        category: Option<String>,
        /// Only products at or below their low-stock threshold.
        #[arg(long)]
        low_stock: bool,
    },
    /// Show one product.
    Show { id: String },
    /// Create a product.
    Add {
        name: String,
        /// List price, e.g. 89.00.
        #[arg(long)]
        price: String,
        /// Sale price, e.g. 69.00.
        #[arg(long)]
        sale_price: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "0")]
        stock: u32,
        /// Comma-separated sizes.
        #[arg(long, value_delimiter = ',')]
        sizes: Vec<String>,
        /// Comma-separated colors.
        #[arg(long, value_delimiter = ',')]
        colors: Vec<String>,
        /// Mark as active instead of draft.
        #[arg(long)]
        active: bool,
    },
    /// Change fields of a product.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        price: Option<String>,
        /// Sale price; "none" clears it.
        #[arg(long)]
        sale_price: Option<String>,
        #[arg(long)]
        stock: Option<u32>,
        /// draft, active or archived.
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        featured: Option<bool>,
    },
    /// Delete a product.
    Delete {
        id: String,
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the categories command.
#[derive(Args)]
pub struct CategoriesArgs {
    #[command(subcommand)]
    pub command: Option<CategoriesCommand>,
}

#[derive(Subcommand)]
pub enum CategoriesCommand {
    /// List categories.
    List,
    /// Create a category.
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Parent category id.
        #[arg(long)]
        parent: Option<String>,
        #[arg(long, default_value = "0")]
        position: i32,
    },
    /// Rename a category.
    Rename { id: String, name: String },
    /// Delete a category; its products become uncategorized.
    Delete {
        id: String,
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the collections command.
#[derive(Args)]
pub struct CollectionsArgs {
    #[command(subcommand)]
    pub command: Option<CollectionsCommand>,
}

#[derive(Subcommand)]
pub enum CollectionsCommand {
    /// List collections.
    List,
    /// Show a collection and its products in order.
    Show { id: String },
    /// Create a collection.
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        featured: bool,
    },
    /// Replace a collection's ordered product list.
    SetProducts {
        id: String,
        /// Product ids in display order.
        products: Vec<String>,
    },
    /// Delete a collection.
    Delete {
        id: String,
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the orders command.
#[derive(Args)]
pub struct OrdersArgs {
    #[command(subcommand)]
    pub command: Option<OrdersCommand>,
}

#[derive(Subcommand)]
pub enum OrdersCommand {
    /// List orders, newest first.
    List {
        /// Only orders with this status.
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one order.
    Show { id: String },
    /// Record an order taken outside the storefront.
    Add {
        /// Customer name.
        #[arg(long)]
        name: String,
        /// Customer email.
        #[arg(long)]
        email: String,
        /// Line as PRODUCT_ID[:QTY]; repeatable.
        #[arg(long = "item", required = true)]
        items: Vec<String>,
    },
    /// Set an order's status.
    Status {
        id: String,
        /// pending, processing, shipped, delivered, cancelled or refunded.
        status: String,
        #[arg(long)]
        tracking: Option<String>,
    },
    /// Delete an order.
    Delete {
        id: String,
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the reviews command.
#[derive(Args)]
pub struct ReviewsArgs {
    #[command(subcommand)]
    pub command: Option<ReviewsCommand>,
}

#[derive(Subcommand)]
pub enum ReviewsCommand {
    /// List reviews.
    List {
        /// Only reviews of this product.
        #[arg(long)]
        product: Option<String>,
        /// Only reviews awaiting approval.
        #[arg(long)]
        pending: bool,
    },
    /// Record a review.
    Add {
        product: String,
        #[arg(long)]
        author: String,
        /// 1 to 5.
        #[arg(long)]
        rating: u8,
        #[arg(long)]
        title: Option<String>,
        body: String,
    },
    /// Approve a review.
    Approve { id: String },
    /// Withdraw approval of a review.
    Reject { id: String },
    /// Feature a review.
    Feature {
        id: String,
        /// Unfeature instead.
        #[arg(long)]
        off: bool,
    },
    /// Delete a review.
    Delete {
        id: String,
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the sync command.
#[derive(Args)]
pub struct SyncArgs {
    #[command(subcommand)]
    pub command: SyncCommand,
}

#[derive(Subcommand)]
pub enum SyncCommand {
    /// Replace local records with the remote copy.
    Pull,
    /// Retry every write that did not land.
    Push,
    /// Show records that are out of sync.
    Status,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Get a config value.
    Get {
        /// Config key (dot-separated).
        key: String,
    },
    /// Initialize a new config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}

/// Parse a record id typed by the user. Provisional ids are accepted in
/// their `tmp:` form.
pub fn record_id(input: &str) -> RecordId {
    RecordId::parse(input.trim())
}

/// Parse a price in the storefront currency.
pub fn price(input: &str, ctx: &Context) -> Result<Money> {
    let currency = ctx.config.cart_policy().map(|p| p.currency).unwrap_or(Currency::GBP);
    Ok(Money::parse(input, currency)?)
}

/// Ask before a destructive change unless `yes` was given.
pub fn confirm(prompt: &str, yes: bool, ctx: &Context) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if ctx.output.is_json() {
        bail!("Refusing to prompt in JSON mode; pass --yes");
    }
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

/// Fail when `id` names nothing in the store.
pub fn ensure_exists(exists: bool, kind: &str, id: &RecordId) -> Result<()> {
    if !exists {
        bail!("No {kind} with id {id}");
    }
    Ok(())
}

/// Print a single record in JSON mode, or a success line otherwise.
pub fn report<T: serde::Serialize>(ctx: &Context, record: &T, message: &str) {
    if ctx.output.is_json() {
        ctx.output.json(record);
    } else {
        ctx.output.success(message);
    }
}
