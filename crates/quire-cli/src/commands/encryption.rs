use crate::cli::PasswordArgs;
use crate::commands::common::{open_workspace, resolve_document, resolve_password, Context};
use crate::error::CliError;

pub async fn run_encrypt(id: &str, password: &PasswordArgs, ctx: &Context) -> Result<(), CliError> {
    let workspace = open_workspace(ctx).await?;
    let document = resolve_document(id, &workspace).await?;
    let password = resolve_password(password)?;

    let sealed = workspace.encrypt(&document.id, &password).await?;
    println!("{} (encrypted)", sealed.id);
    Ok(())
}

pub async fn run_decrypt(id: &str, password: &PasswordArgs, ctx: &Context) -> Result<(), CliError> {
    let workspace = open_workspace(ctx).await?;
    let document = resolve_document(id, &workspace).await?;
    let password = resolve_password(password)?;

    let plain = workspace.decrypt(&document.id, &password).await?;
    println!("{} (decrypted)", plain.id);
    Ok(())
}
