use quire_core::Lifecycle;

use crate::commands::common::{open_workspace, resolve_document, Context};
use crate::error::CliError;

pub async fn run_delete(id: &str, ctx: &Context) -> Result<(), CliError> {
    let workspace = open_workspace(ctx).await?;
    let document = resolve_document(id, &workspace).await?;

    match workspace.delete(&document.id).await? {
        Lifecycle::Purged => println!("{} (removed)", document.id),
        _ => println!("{} (deleted, pending sync)", document.id),
    }
    Ok(())
}
