use std::time::Duration;

use quire_core::sync::{SyncOutcome, SyncReport};

use crate::commands::common::{open_workspace, remote_store, require_owner, Context};
use crate::error::CliError;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

pub async fn run_sync(compact: bool, retention_days: u64, ctx: &Context) -> Result<(), CliError> {
    require_owner(ctx)?;
    let workspace = open_workspace(ctx).await?;

    match workspace.sync_once().await? {
        SyncOutcome::Skipped => println!("Sync already in progress"),
        SyncOutcome::Completed(report) => {
            for line in format_sync_report(&report) {
                println!("{line}");
            }
        }
    }

    if compact {
        let retention = Duration::from_secs(retention_days.saturating_mul(SECONDS_PER_DAY));
        let removed = workspace.compact_remote_tombstones(retention).await?;
        println!("Compacted {removed} remote tombstone(s)");
    }
    Ok(())
}

/// Sync on the configured interval until Ctrl-C, then flush once more
pub async fn run_watch(ctx: &Context) -> Result<(), CliError> {
    let owner = require_owner(ctx)?;
    let workspace = open_workspace(ctx).await?;
    let remote = remote_store(ctx)?;

    let migrated = workspace.sign_in(owner, remote).await?;
    if migrated > 0 {
        println!("Claimed {migrated} local document(s) for {owner}");
    }
    println!(
        "Syncing every {}s; press Ctrl-C to stop",
        ctx.config.sync_interval().as_secs()
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupted; running a final sync");

    match workspace.sign_out_after_final_sync().await {
        Ok(SyncOutcome::Completed(report)) => {
            for line in format_sync_report(&report) {
                println!("{line}");
            }
        }
        Ok(SyncOutcome::Skipped) => {
            tracing::warn!("Final sync skipped; another cycle was still running");
        }
        Err(error) => tracing::warn!("Final sync failed: {error}"),
    }
    Ok(())
}

pub fn format_sync_report(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Pushed {} ({} purged), pulled {} ({} removed, {} skipped)",
        report.pushed, report.purged, report.pulled, report.removed, report.skipped
    )];
    if let Some(error) = &report.push_error {
        lines.push(format!("Push failed: {error}"));
    }
    if let Some(error) = &report.pull_error {
        lines.push(format!("Pull failed: {error}"));
    }
    if report.is_clean() {
        lines.push("Sync completed".to_string());
    }
    lines
}
