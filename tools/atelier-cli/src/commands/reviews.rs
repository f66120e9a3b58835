//! Review moderation commands.

use anyhow::{bail, Result};
use atelier_admin::{AdminStore, SyncHandle};
use atelier_commerce::catalog::{Review, ReviewDraft};
use atelier_commerce::RecordId;

use super::{confirm, ensure_exists, record_id, report, ReviewsArgs, ReviewsCommand};
use crate::context::Context;
use crate::output::{id_cell, truncate};

/// Run the reviews command.
pub async fn run(args: ReviewsArgs, ctx: &Context) -> Result<()> {
    let store = ctx.admin()?;
    let command = args.command.unwrap_or(ReviewsCommand::List {
        product: None,
        pending: false,
    });
    match command {
        ReviewsCommand::List { product, pending } => {
            let mut reviews = match product {
                Some(product) => store.reviews_for_product(&record_id(&product)),
                None => store.reviews(),
            };
            if pending {
                reviews.retain(|r| !r.is_approved);
            }
            return list_reviews(&store, &reviews, ctx);
        }
        ReviewsCommand::Add {
            product,
            author,
            rating,
            title,
            body,
        } => {
            if !(1..=5).contains(&rating) {
                ctx.output.warn("Ratings run from 1 to 5; clamping");
            }
            let product = record_id(&product);
            ensure_exists(store.product(&product).is_some(), "product", &product)?;
            let mut draft = ReviewDraft::new(store.resolve_id(&product), author, rating, body);
            draft.title = title;
            match store.add_review(draft).confirmed().await {
                Ok(review) => report(ctx, &review, &format!("Recorded review {}", review.id)),
                Err(e) => ctx.output.warn(&format!("Saved locally, remote create failed: {e}")),
            }
        }
        ReviewsCommand::Approve { id } => {
            let id = record_id(&id);
            moderate(&store, &id, ctx, |s, id| s.approve_review(id), "Approved").await?;
        }
        ReviewsCommand::Reject { id } => {
            let id = record_id(&id);
            moderate(&store, &id, ctx, |s, id| s.reject_review(id), "Rejected").await?;
        }
        ReviewsCommand::Feature { id, off } => {
            let id = record_id(&id);
            let verb = if off { "Unfeatured" } else { "Featured" };
            moderate(&store, &id, ctx, |s, id| s.set_review_featured(id, !off), verb).await?;
        }
        ReviewsCommand::Delete { id, yes } => {
            let id = record_id(&id);
            let Some(review) = store.review(&id) else {
                bail!("No review with id {id}");
            };
            let prompt = format!("Delete review by {}?", review.author_name);
            if !confirm(&prompt, yes, ctx)? {
                ctx.output.info("Cancelled");
                return Ok(());
            }
            if let Err(e) = store.delete_review(&id).outcome().await {
                ctx.output.debug(&format!("Remote delete failed: {e}"));
            }
            report(ctx, &review, &format!("Deleted review {}", review.id));
        }
    }
    ctx.settle(&store).await;
    Ok(())
}

async fn moderate(
    store: &AdminStore,
    id: &RecordId,
    ctx: &Context,
    apply: impl FnOnce(&AdminStore, &RecordId) -> SyncHandle,
    verb: &str,
) -> Result<()> {
    ensure_exists(store.review(id).is_some(), "review", id)?;
    if let Err(e) = apply(store, id).outcome().await {
        ctx.output.debug(&format!("Remote update failed: {e}"));
    }
    if let Some(review) = store.review(id) {
        report(ctx, &review, &format!("{verb} review by {}", review.author_name));
    }
    Ok(())
}

fn list_reviews(store: &AdminStore, reviews: &[Review], ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&reviews);
        return Ok(());
    }

    ctx.output.header("Reviews");
    if reviews.is_empty() {
        ctx.output.info("No reviews found.");
        return Ok(());
    }
    let widths = [38, 22, 6, 16, 10];
    ctx.output
        .table_header(&["ID", "PRODUCT", "RATING", "AUTHOR", "STATE"], &widths);
    for r in reviews {
        let product = store
            .product(&r.product_id)
            .map(|p| p.name)
            .unwrap_or_else(|| r.product_id.to_string());
        let stars = "★".repeat(usize::from(r.rating));
        let state = match (r.is_approved, r.is_featured) {
            (true, true) => "featured",
            (true, false) => "approved",
            (false, true) => "featured*",
            (false, false) => "pending",
        };
        ctx.output.table_row(
            &[
                &id_cell(&r.id),
                &truncate(&product, 22),
                &stars,
                &truncate(&r.author_name, 16),
                state,
            ],
            &widths,
        );
    }
    Ok(())
}
