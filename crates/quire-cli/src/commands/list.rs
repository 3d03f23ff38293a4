use crate::commands::common::{
    document_to_list_item, format_document_lines, open_workspace, Context, DocumentListItem,
};
use crate::error::CliError;

pub async fn run_list(limit: usize, as_json: bool, ctx: &Context) -> Result<(), CliError> {
    let workspace = open_workspace(ctx).await?;
    let mut documents = workspace.list().await?;
    documents.truncate(limit);

    if as_json {
        let json_items = documents
            .iter()
            .map(document_to_list_item)
            .collect::<Vec<DocumentListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if documents.is_empty() {
        println!("No documents yet.");
    } else {
        for line in format_document_lines(&documents) {
            println!("{line}");
        }
    }

    Ok(())
}
