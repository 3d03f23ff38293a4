use crate::cli::PasswordArgs;
use crate::commands::common::{
    capture_editor_input_with_initial, normalize_title, open_workspace, resolve_document,
    resolve_password, Context,
};
use crate::error::CliError;

pub async fn run_edit(
    id: &str,
    title: Option<&str>,
    content: Option<&str>,
    password: &PasswordArgs,
    ctx: &Context,
) -> Result<(), CliError> {
    let workspace = open_workspace(ctx).await?;
    let document = resolve_document(id, &workspace).await?;

    let title = title.map(normalize_title).transpose()?;
    let wants_editor = title.is_none() && content.is_none();

    let mut current = document.content.clone();
    if document.is_encrypted() && (wants_editor || content.is_some()) {
        let password = resolve_password(password)?;
        current = workspace.unlock(&document.id, &password).await?;
    }

    let content = match content {
        Some(content) => Some(content.trim().to_string()),
        None if wants_editor => {
            let edited = capture_editor_input_with_initial(&current)?.unwrap_or_default();
            if edited == current {
                println!("No changes");
                return Ok(());
            }
            Some(edited)
        }
        None => None,
    };

    let updated = workspace.update(&document.id, title, content).await?;
    println!("{}", updated.id);
    Ok(())
}
