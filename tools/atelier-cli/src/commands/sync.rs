//! Reconcile the local admin data with the remote store.

use anyhow::{Context as _, Result};
use atelier_admin::AdminStore;
use futures::future::join_all;
use serde_json::json;

use super::{SyncArgs, SyncCommand};
use crate::context::Context;
use crate::output::{format_timestamp, id_cell, truncate};

/// Run the sync command.
pub async fn run(args: SyncArgs, ctx: &Context) -> Result<()> {
    let store = ctx.admin()?;
    match args.command {
        SyncCommand::Pull => pull(&store, ctx).await,
        SyncCommand::Push => push(&store, ctx).await,
        SyncCommand::Status => {
            status(&store, ctx);
            Ok(())
        }
    }
}

async fn pull(store: &AdminStore, ctx: &Context) -> Result<()> {
    let spinner = ctx.output.spinner("Fetching remote records...");
    let result = store.refresh().await;
    spinner.finish_and_clear();
    let count = result.context("Failed to fetch remote records")?;

    let kept = store.snapshot().provisional_ids().len();
    if ctx.output.is_json() {
        ctx.output.json(&json!({ "records": count, "unsent": kept }));
        return Ok(());
    }
    ctx.output.success(&format!("Pulled {count} record(s)"));
    if kept > 0 {
        ctx.output.info(&format!(
            "Kept {kept} local record(s) that were never created remotely; run `atelier sync push`"
        ));
    }
    Ok(())
}

async fn push(store: &AdminStore, ctx: &Context) -> Result<()> {
    let handles = store.resync();
    if handles.is_empty() {
        ctx.output.success("Nothing to push");
        return Ok(());
    }

    let spinner = ctx.output.spinner(&format!("Pushing {} write(s)...", handles.len()));
    let outcomes = join_all(handles.into_iter().map(|h| h.outcome())).await;
    store.flush().await;
    spinner.finish_and_clear();

    let failed = outcomes.iter().filter(|o| o.is_err()).count();
    let pushed = outcomes.len() - failed;
    if ctx.output.is_json() {
        ctx.output.json(&json!({
            "pushed": pushed,
            "failed": failed,
            "divergences": store.divergences(),
        }));
        return Ok(());
    }
    if pushed > 0 {
        ctx.output.success(&format!("Pushed {pushed} write(s)"));
    }
    if failed > 0 {
        ctx.output.warn(&format!("{failed} write(s) still failing"));
        status(store, ctx);
    }
    Ok(())
}

fn status(store: &AdminStore, ctx: &Context) {
    let divergences = store.divergences();
    let unsent = store.snapshot().provisional_ids();

    if ctx.output.is_json() {
        let unsent: Vec<_> = unsent
            .iter()
            .map(|(kind, id)| json!({ "kind": kind, "record_id": id }))
            .collect();
        ctx.output.json(&json!({ "divergences": divergences, "unsent": unsent }));
        return;
    }

    ctx.output.header("Sync status");
    if divergences.is_empty() && unsent.is_empty() {
        ctx.output.success("Everything is in sync");
        return;
    }

    if !divergences.is_empty() {
        let widths = [10, 38, 7, 16, 40];
        ctx.output
            .table_header(&["KIND", "ID", "WRITE", "FAILED", "ERROR"], &widths);
        for d in &divergences {
            ctx.output.table_row(
                &[
                    d.kind.as_str(),
                    &id_cell(&d.record_id),
                    d.op.as_str(),
                    &format_timestamp(d.at),
                    &truncate(&d.error, 40),
                ],
                &widths,
            );
        }
    }
    if !unsent.is_empty() {
        ctx.output.info("");
        ctx.output
            .info(&format!("{} record(s) have no server id yet:", unsent.len()));
        for (kind, id) in &unsent {
            ctx.output.list_item(&format!("{kind} {id}"));
        }
    }
}
