//! Category commands.

use anyhow::{bail, Result};
use atelier_commerce::catalog::CategoryDraft;

use super::{confirm, ensure_exists, record_id, report, CategoriesArgs, CategoriesCommand};
use crate::context::Context;
use crate::output::id_cell;

/// Run the categories command.
pub async fn run(args: CategoriesArgs, ctx: &Context) -> Result<()> {
    let store = ctx.admin()?;
    match args.command.unwrap_or(CategoriesCommand::List) {
        CategoriesCommand::List => {
            let mut categories = store.categories();
            categories.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
            if ctx.output.is_json() {
                ctx.output.json(&categories);
                return Ok(());
            }
            ctx.output.header("Categories");
            if categories.is_empty() {
                ctx.output.info("No categories found.");
                return Ok(());
            }
            let products = store.products();
            let widths = [38, 24, 8];
            ctx.output.table_header(&["ID", "NAME", "PRODUCTS"], &widths);
            for c in &categories {
                let count = products.iter().filter(|p| p.category_id.as_ref() == Some(&c.id)).count();
                let name = match &c.parent_id {
                    Some(_) => format!("  {}", c.name),
                    None => c.name.clone(),
                };
                ctx.output
                    .table_row(&[&id_cell(&c.id), &name, &count.to_string()], &widths);
            }
        }
        CategoriesCommand::Add {
            name,
            description,
            parent,
            position,
        } => {
            let mut draft = CategoryDraft::new(name);
            draft.description = description;
            draft.position = position;
            if let Some(parent) = parent {
                let parent = record_id(&parent);
                ensure_exists(store.category(&parent).is_some(), "category", &parent)?;
                draft.parent_id = Some(store.resolve_id(&parent));
            }
            match store.add_category(draft).confirmed().await {
                Ok(category) => report(ctx, &category, &format!("Created {} ({})", category.name, category.id)),
                Err(e) => ctx.output.warn(&format!("Saved locally, remote create failed: {e}")),
            }
        }
        CategoriesCommand::Rename { id, name } => {
            let id = record_id(&id);
            ensure_exists(store.category(&id).is_some(), "category", &id)?;
            let outcome = store.update_category(&id, |c| c.name = name).outcome().await;
            if let Err(e) = outcome {
                ctx.output.debug(&format!("Remote update failed: {e}"));
            }
            if let Some(category) = store.category(&id) {
                report(ctx, &category, &format!("Renamed to {}", category.name));
            }
        }
        CategoriesCommand::Delete { id, yes } => {
            let id = record_id(&id);
            let Some(category) = store.category(&id) else {
                bail!("No category with id {id}");
            };
            let affected = store
                .products()
                .iter()
                .filter(|p| p.category_id.as_ref() == Some(&category.id))
                .count();
            let prompt = format!(
                "Delete {}? {} product(s) will become uncategorized.",
                category.name, affected
            );
            if !confirm(&prompt, yes, ctx)? {
                ctx.output.info("Cancelled");
                return Ok(());
            }
            if let Err(e) = store.delete_category(&id).outcome().await {
                ctx.output.debug(&format!("Remote delete failed: {e}"));
            }
            report(ctx, &category, &format!("Deleted {}", category.name));
        }
    }
    ctx.settle(&store).await;
    Ok(())
}
