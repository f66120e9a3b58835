//! Shopping cart commands.

use anyhow::{bail, Context as _, Result};
use atelier_commerce::cart::{CartStore, SelectedOptions};
use atelier_commerce::pricing::format_price;
use atelier_commerce::LineItemId;
use serde_json::json;

use super::{record_id, CartArgs, CartCommand};
use crate::context::Context;
use crate::output::truncate;

/// Run the cart command.
pub async fn run(args: CartArgs, ctx: &Context) -> Result<()> {
    let mut cart = ctx.cart()?;
    match args.command.unwrap_or(CartCommand::Show) {
        CartCommand::Show => {}
        CartCommand::Add {
            product,
            quantity,
            size,
            color,
        } => {
            let catalog = ctx.catalog()?;
            let id = catalog.resolve(&record_id(&product));
            let Some(product) = catalog.products.iter().find(|p| p.id == id) else {
                bail!("No product with id {id}; run `atelier products list`");
            };
            if !product.is_available() {
                ctx.output.warn(&format!("{} is not available for sale", product.name));
            }
            if let Some(size) = &size {
                if !product.sizes.is_empty() && !product.sizes.contains(size) {
                    bail!("{} comes in {}", product.name, product.sizes.join(", "));
                }
            }
            let mut options = SelectedOptions::new();
            options.size = size;
            options.color = color;
            let line = cart
                .add_item(product, quantity, options)
                .with_context(|| format!("Cannot add {} to the cart", product.name))?;
            let quantity = cart.get_item(&line).map_or(0, |l| l.quantity);
            ctx.output
                .success(&format!("{} × {} in cart ({line})", quantity, product.name));
        }
        CartCommand::Update { line, quantity } => {
            let line = LineItemId::new(line);
            if cart.get_item(&line).is_none() {
                bail!("No cart line {line}");
            }
            cart.update_quantity(&line, quantity);
            match cart.get_item(&line) {
                Some(item) => ctx.output.success(&format!("{line} set to {}", item.quantity)),
                None => ctx.output.success(&format!("Removed {line}")),
            }
        }
        CartCommand::Remove { line } => {
            let line = LineItemId::new(line);
            if cart.get_item(&line).is_none() {
                ctx.output.warn(&format!("No cart line {line}"));
            }
            cart.remove_item(&line);
        }
        CartCommand::Clear => {
            cart.clear_cart();
            ctx.output.success("Cart cleared");
        }
    }
    show_cart(&cart, ctx);
    Ok(())
}

fn show_cart(cart: &CartStore, ctx: &Context) {
    let summary = cart.summary();

    if ctx.output.is_json() {
        ctx.output.json(&json!({
            "items": cart.items(),
            "item_count": cart.item_count(),
            "summary": summary,
        }));
        return;
    }

    ctx.output.header("Cart");
    if cart.is_empty() {
        ctx.output.info("Your cart is empty.");
        return;
    }

    let widths = [34, 26, 4, 10];
    ctx.output.table_header(&["LINE", "PRODUCT", "QTY", "TOTAL"], &widths);
    for item in cart.items() {
        ctx.output.table_row(
            &[
                item.id.as_str(),
                &truncate(&item.product.name, 26),
                &item.quantity.to_string(),
                &format_price(&item.line_total()),
            ],
            &widths,
        );
    }

    ctx.output.info("");
    ctx.output.kv("items", &cart.item_count().to_string());
    ctx.output.kv("subtotal", &format_price(&summary.subtotal));
    ctx.output.kv("tax", &format_price(&summary.tax));
    let shipping = if summary.has_free_shipping() {
        "free".to_string()
    } else {
        format_price(&summary.shipping)
    };
    ctx.output.kv("shipping", &shipping);
    ctx.output.kv("total", &format_price(&summary.total));
    if let Some(remaining) = cart.policy().remaining_for_free_shipping(&summary.subtotal) {
        ctx.output
            .info(&format!("Spend {} more for free shipping", format_price(&remaining)));
    }
}
