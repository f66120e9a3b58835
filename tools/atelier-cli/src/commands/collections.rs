//! Collection commands.

use anyhow::{bail, Result};
use atelier_commerce::catalog::CollectionDraft;
use atelier_commerce::pricing::format_price;
use serde_json::json;

use super::{confirm, record_id, report, CollectionsArgs, CollectionsCommand};
use crate::context::Context;
use crate::output::id_cell;

/// Run the collections command.
pub async fn run(args: CollectionsArgs, ctx: &Context) -> Result<()> {
    let store = ctx.admin()?;
    match args.command.unwrap_or(CollectionsCommand::List) {
        CollectionsCommand::List => {
            let collections = store.collections();
            if ctx.output.is_json() {
                ctx.output.json(&collections);
                return Ok(());
            }
            ctx.output.header("Collections");
            if collections.is_empty() {
                ctx.output.info("No collections found.");
                return Ok(());
            }
            let widths = [38, 24, 8, 8];
            ctx.output
                .table_header(&["ID", "NAME", "PRODUCTS", "FEATURED"], &widths);
            for c in &collections {
                let count = store.collection_products(&c.id).len().to_string();
                let featured = if c.is_featured { "yes" } else { "" };
                ctx.output
                    .table_row(&[&id_cell(&c.id), &c.name, &count, featured], &widths);
            }
        }
        CollectionsCommand::Show { id } => {
            let id = record_id(&id);
            let Some(collection) = store.collection(&id) else {
                bail!("No collection with id {id}");
            };
            let products = store.products_in_collection(&id);
            if ctx.output.is_json() {
                ctx.output.json(&json!({ "collection": collection, "products": products }));
                return Ok(());
            }
            ctx.output.header(&collection.name);
            if let Some(description) = &collection.description {
                ctx.output.info(description);
            }
            for (position, p) in products.iter().enumerate() {
                ctx.output.list_item(&format!(
                    "{}. {} {} ({})",
                    position + 1,
                    p.name,
                    format_price(&p.effective_price()),
                    p.id
                ));
            }
        }
        CollectionsCommand::Add {
            name,
            description,
            featured,
        } => {
            let mut draft = CollectionDraft::new(name);
            draft.description = description;
            draft.is_featured = featured;
            match store.add_collection(draft).confirmed().await {
                Ok(collection) => report(
                    ctx,
                    &collection,
                    &format!("Created {} ({})", collection.name, collection.id),
                ),
                Err(e) => ctx.output.warn(&format!("Saved locally, remote create failed: {e}")),
            }
        }
        CollectionsCommand::SetProducts { id, products } => {
            let id = record_id(&id);
            if store.collection(&id).is_none() {
                bail!("No collection with id {id}");
            }
            let ids: Vec<_> = products.iter().map(String::as_str).map(record_id).collect();
            if let Some(missing) = ids.iter().find(|p| store.product(p).is_none()) {
                ctx.output.warn(&format!("{missing} is not a known product"));
            }
            if let Err(e) = store.set_collection_products(&id, ids).outcome().await {
                ctx.output.debug(&format!("Remote update failed: {e}"));
            }
            let members = store.collection_products(&id);
            report(ctx, &members, &format!("Collection now holds {} product(s)", members.len()));
        }
        CollectionsCommand::Delete { id, yes } => {
            let id = record_id(&id);
            let Some(collection) = store.collection(&id) else {
                bail!("No collection with id {id}");
            };
            if !confirm(&format!("Delete {}?", collection.name), yes, ctx)? {
                ctx.output.info("Cancelled");
                return Ok(());
            }
            if let Err(e) = store.delete_collection(&id).outcome().await {
                ctx.output.debug(&format!("Remote delete failed: {e}"));
            }
            report(ctx, &collection, &format!("Deleted {}", collection.name));
        }
    }
    ctx.settle(&store).await;
    Ok(())
}
