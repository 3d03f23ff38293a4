use crate::cli::PasswordArgs;
use crate::commands::common::{open_workspace, resolve_document, resolve_password, Context};
use crate::error::CliError;

pub async fn run_show(id: &str, password: &PasswordArgs, ctx: &Context) -> Result<(), CliError> {
    let workspace = open_workspace(ctx).await?;
    let document = resolve_document(id, &workspace).await?;

    let content = if document.is_encrypted() {
        let password = resolve_password(password)?;
        workspace.unlock(&document.id, &password).await?
    } else {
        document.content.clone()
    };

    println!("{}", document.title);
    println!();
    println!("{content}");
    Ok(())
}
