use crate::commands::common::{normalize_title, open_workspace, resolve_content, Context};
use crate::error::CliError;

pub async fn run_add(title: &str, content_parts: &[String], ctx: &Context) -> Result<(), CliError> {
    let title = normalize_title(title)?;
    let content = resolve_content(content_parts)?;

    let workspace = open_workspace(ctx).await?;
    let document = workspace.create(&title, &content).await?;

    println!("{}", document.id);
    Ok(())
}
