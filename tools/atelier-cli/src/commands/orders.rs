//! Order commands.

use anyhow::{bail, Context as _, Result};
use atelier_admin::AdminStore;
use atelier_commerce::cart::{CartStore, SelectedOptions};
use atelier_commerce::orders::{OrderDraft, OrderLineItem, OrderStatus};
use atelier_commerce::pricing::format_price;

use super::{confirm, ensure_exists, record_id, report, OrdersArgs, OrdersCommand};
use crate::context::Context;
use crate::output::{format_timestamp, id_cell, status_badge};

/// Run the orders command.
pub async fn run(args: OrdersArgs, ctx: &Context) -> Result<()> {
    let store = ctx.admin()?;
    match args.command.unwrap_or(OrdersCommand::List { status: None }) {
        OrdersCommand::List { status } => {
            let status = status.map(|s| s.parse::<OrderStatus>()).transpose()?;
            return list_orders(&store, status, ctx);
        }
        OrdersCommand::Show { id } => return show_order(&store, &id, ctx),
        OrdersCommand::Add { name, email, items } => {
            let draft = build_draft(&store, name, email, &items, ctx)?;
            match store.add_order(draft).confirmed().await {
                Ok(order) => report(
                    ctx,
                    &order,
                    &format!("Recorded {} for {}", order.order_number, format_price(&order.total)),
                ),
                Err(e) => ctx.output.warn(&format!("Saved locally, remote create failed: {e}")),
            }
        }
        OrdersCommand::Status {
            id,
            status,
            tracking,
        } => {
            let id = record_id(&id);
            let status: OrderStatus = status.parse()?;
            ensure_exists(store.order(&id).is_some(), "order", &id)?;
            if let Err(e) = store.update_order_status(&id, status, tracking).outcome().await {
                ctx.output.debug(&format!("Remote update failed: {e}"));
            }
            if let Some(order) = store.order(&id) {
                report(
                    ctx,
                    &order,
                    &format!("{} is now {}", order.order_number, status.display_name()),
                );
            }
        }
        OrdersCommand::Delete { id, yes } => {
            let id = record_id(&id);
            let Some(order) = store.order(&id) else {
                bail!("No order with id {id}");
            };
            if !confirm(&format!("Delete order {}?", order.order_number), yes, ctx)? {
                ctx.output.info("Cancelled");
                return Ok(());
            }
            if let Err(e) = store.delete_order(&id).outcome().await {
                ctx.output.debug(&format!("Remote delete failed: {e}"));
            }
            report(ctx, &order, &format!("Deleted order {}", order.order_number));
        }
    }
    ctx.settle(&store).await;
    Ok(())
}

/// Price `PRODUCT_ID[:QTY]` lines with the storefront's cart rules.
fn build_draft(
    store: &AdminStore,
    name: String,
    email: String,
    items: &[String],
    ctx: &Context,
) -> Result<OrderDraft> {
    let mut priced = CartStore::new(ctx.config.cart_policy()?);
    for item in items {
        let (product, quantity) = match item.split_once(':') {
            Some((product, quantity)) => (
                product,
                quantity
                    .parse::<i64>()
                    .with_context(|| format!("Invalid quantity in {item}"))?,
            ),
            None => (item.as_str(), 1),
        };
        let id = record_id(product);
        let Some(product) = store.product(&id) else {
            bail!("No product with id {id}");
        };
        priced
            .add_item(&product, quantity, SelectedOptions::new())
            .with_context(|| format!("Cannot price {}", product.name))?;
    }

    let summary = priced.summary();
    let mut draft = OrderDraft::new(name, email);
    draft.items = priced
        .items()
        .iter()
        .map(|line| OrderLineItem {
            product_id: Some(line.product.id.clone()),
            name: line.product.name.clone(),
            size: line.selected_size.clone(),
            color: line.selected_color.clone(),
            unit_price: line.unit_price(),
            quantity: line.quantity,
        })
        .collect();
    draft.subtotal = summary.subtotal;
    draft.tax = summary.tax;
    draft.shipping = summary.shipping;
    draft.total = summary.total;
    Ok(draft)
}

fn list_orders(store: &AdminStore, status: Option<OrderStatus>, ctx: &Context) -> Result<()> {
    let mut orders = store.orders();
    orders.retain(|o| status.map_or(true, |s| o.status == s));
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    if ctx.output.is_json() {
        ctx.output.json(&orders);
        return Ok(());
    }

    ctx.output.header("Orders");
    if orders.is_empty() {
        ctx.output.info("No orders found.");
        return Ok(());
    }
    let widths = [38, 18, 20, 10, 12, 16];
    ctx.output.table_header(
        &["ID", "NUMBER", "CUSTOMER", "TOTAL", "STATUS", "PLACED"],
        &widths,
    );
    for o in &orders {
        ctx.output.table_row(
            &[
                &id_cell(&o.id),
                &o.order_number,
                &o.customer_name,
                &format_price(&o.total),
                &status_badge(o.status),
                &format_timestamp(o.created_at),
            ],
            &widths,
        );
    }
    Ok(())
}

fn show_order(store: &AdminStore, id: &str, ctx: &Context) -> Result<()> {
    let id = record_id(id);
    let Some(order) = store.order(&id) else {
        bail!("No order with id {id}");
    };
    if ctx.output.is_json() {
        ctx.output.json(&order);
        return Ok(());
    }

    ctx.output.header(&format!("Order {}", order.order_number));
    ctx.output.kv("status", &status_badge(order.status));
    ctx.output.kv("customer", &format!("{} <{}>", order.customer_name, order.customer_email));
    if order.shipping_address.is_complete() {
        ctx.output.kv("ship to", &order.shipping_address.one_line());
    }
    if let Some(tracking) = &order.tracking_number {
        ctx.output.kv("tracking", tracking);
    }
    for item in &order.items {
        ctx.output.list_item(&format!(
            "{} × {} @ {}",
            item.quantity,
            item.name,
            format_price(&item.unit_price)
        ));
    }
    ctx.output.kv("subtotal", &format_price(&order.subtotal));
    ctx.output.kv("tax", &format_price(&order.tax));
    ctx.output.kv("shipping", &format_price(&order.shipping));
    ctx.output.kv("total", &format_price(&order.total));
    ctx.output.kv("placed", &format_timestamp(order.created_at));
    Ok(())
}
