//! Product catalog commands.

use anyhow::{bail, Result};
use atelier_commerce::catalog::{Product, ProductDraft, ProductStatus};
use atelier_commerce::pricing::{format_price, product_discount_percentage};

use super::{confirm, ensure_exists, price, record_id, report, ProductsArgs, ProductsCommand};
use crate::context::Context;
use crate::output::{format_timestamp, id_cell, truncate};

/// Run the products command.
pub async fn run(args: ProductsArgs, ctx: &Context) -> Result<()> {
    match args.command.unwrap_or(ProductsCommand::List {
        category: None,
        low_stock: false,
    }) {
        ProductsCommand::List {
            category,
            low_stock,
        } => list_products(category.as_deref(), low_stock, ctx),
        ProductsCommand::Show { id } => show_product(&id, ctx),
        ProductsCommand::Add {
            name,
            price: list_price,
            sale_price,
            category,
            stock,
            sizes,
            colors,
            active,
        } => {
            let mut draft = ProductDraft::new(name, price(&list_price, ctx)?)
                .with_stock(stock)
                .with_sizes(sizes)
                .with_colors(colors);
            draft.low_stock_threshold = ctx.config.storefront.low_stock_threshold;
            if let Some(sale) = sale_price {
                draft = draft.with_sale_price(price(&sale, ctx)?);
            }
            if let Some(category) = category {
                draft = draft.with_category(record_id(&category));
            }
            if active {
                draft.status = ProductStatus::Active;
            }
            add_product(draft, ctx).await
        }
        ProductsCommand::Update {
            id,
            name,
            price: list_price,
            sale_price,
            stock,
            status,
            featured,
        } => {
            let list_price = list_price.map(|p| price(&p, ctx)).transpose()?;
            let sale_price = match sale_price.as_deref() {
                None => None,
                Some("none") => Some(None),
                Some(p) => Some(Some(price(p, ctx)?)),
            };
            let status = status.map(|s| s.parse::<ProductStatus>()).transpose()?;

            let store = ctx.admin()?;
            let id = record_id(&id);
            ensure_exists(store.product(&id).is_some(), "product", &id)?;
            let handle = store.update_product(&id, |p| {
                if let Some(name) = name {
                    p.name = name;
                }
                if let Some(list_price) = list_price {
                    p.price = list_price;
                }
                if let Some(sale_price) = sale_price {
                    p.sale_price = sale_price;
                }
                if let Some(stock) = stock {
                    p.stock_quantity = stock;
                }
                if let Some(status) = status {
                    p.status = status;
                }
                if let Some(featured) = featured {
                    p.is_featured = featured;
                }
            });
            if let Err(e) = handle.outcome().await {
                ctx.output.debug(&format!("Remote update failed: {e}"));
            }
            ctx.settle(&store).await;
            if let Some(product) = store.product(&id) {
                report(ctx, &product, &format!("Updated {}", product.name));
            }
            Ok(())
        }
        ProductsCommand::Delete { id, yes } => {
            let store = ctx.admin()?;
            let id = record_id(&id);
            let Some(product) = store.product(&id) else {
                bail!("No product with id {id}");
            };
            if !confirm(&format!("Delete {}?", product.name), yes, ctx)? {
                ctx.output.info("Cancelled");
                return Ok(());
            }
            if let Err(e) = store.delete_product(&id).outcome().await {
                ctx.output.debug(&format!("Remote delete failed: {e}"));
            }
            ctx.settle(&store).await;
            report(ctx, &product, &format!("Deleted {}", product.name));
            Ok(())
        }
    }
}

async fn add_product(draft: ProductDraft, ctx: &Context) -> Result<()> {
    let store = ctx.admin()?;
    if let Some(category) = &draft.category_id {
        ensure_exists(store.category(category).is_some(), "category", category)?;
    }
    let pending = store.add_product(draft);
    ctx.output.debug(&format!("Created locally as {}", pending.local().id));
    match pending.confirmed().await {
        Ok(product) => report(ctx, &product, &format!("Created {} ({})", product.name, product.id)),
        Err(e) => ctx.output.warn(&format!("Saved locally, remote create failed: {e}")),
    }
    ctx.settle(&store).await;
    Ok(())
}

fn list_products(category: Option<&str>, low_stock: bool, ctx: &Context) -> Result<()> {
    let store = ctx.admin()?;
    let category = category.map(|c| store.resolve_id(&record_id(c)));
    let products: Vec<Product> = store
        .products()
        .into_iter()
        .filter(|p| category.is_none() || p.category_id == category)
        .filter(|p| !low_stock || p.is_low_stock())
        .collect();

    if ctx.output.is_json() {
        ctx.output.json(&products);
        return Ok(());
    }

    ctx.output.header("Products");
    if products.is_empty() {
        ctx.output.info("No products found.");
        return Ok(());
    }

    let widths = [38, 28, 10, 6, 8];
    ctx.output
        .table_header(&["ID", "NAME", "PRICE", "STOCK", "STATUS"], &widths);
    for p in &products {
        let mut price = format_price(&p.effective_price());
        if let Some(off) = product_discount_percentage(p) {
            price = format!("{price} -{off}%");
        }
        let stock = if p.is_low_stock() {
            format!("{}!", p.stock_quantity)
        } else {
            p.stock_quantity.to_string()
        };
        ctx.output.table_row(
            &[&id_cell(&p.id), &truncate(&p.name, 28), &price, &stock, p.status.as_str()],
            &widths,
        );
    }
    ctx.output.info("");
    ctx.output.info(&format!("Total: {} product(s)", products.len()));
    Ok(())
}

fn show_product(id: &str, ctx: &Context) -> Result<()> {
    let store = ctx.admin()?;
    let id = record_id(id);
    let Some(p) = store.product(&id) else {
        bail!("No product with id {id}");
    };

    if ctx.output.is_json() {
        ctx.output.json(&p);
        return Ok(());
    }

    ctx.output.header(&p.name);
    ctx.output.kv("id", &id_cell(&p.id));
    ctx.output.kv("slug", &p.slug);
    ctx.output.kv("price", &format_price(&p.price));
    if let Some(sale) = &p.sale_price {
        ctx.output.kv("sale price", &format_price(sale));
    }
    if let Some(category) = &p.category_id {
        let name = store.category(category).map(|c| c.name).unwrap_or_default();
        ctx.output.kv("category", &format!("{name} ({category})"));
    }
    ctx.output.kv("stock", &p.stock_quantity.to_string());
    if !p.sizes.is_empty() {
        ctx.output.kv("sizes", &p.sizes.join(", "));
    }
    if !p.colors.is_empty() {
        ctx.output.kv("colors", &p.colors.join(", "));
    }
    ctx.output.kv("status", p.status.as_str());
    ctx.output.kv("updated", &format_timestamp(p.updated_at));
    Ok(())
}
