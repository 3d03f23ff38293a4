//! Quire CLI - Command-line interface for local-first documents
//!
//! Documents live in a local SQLite file and sync to Supabase when an owner
//! and access token are supplied.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::Context;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::encryption::{run_decrypt, run_encrypt};
use crate::commands::list::run_list;
use crate::commands::show::run_show;
use crate::commands::sync::{run_sync, run_watch};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        tracing::debug!("{error:?}");
        eprintln!("Error: {}", error.user_message());
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive = "quire=info"
        .parse::<Directive>()
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context::load(cli.db_path, cli.config, cli.owner)?;

    match cli.command {
        Commands::Add { title, content } => run_add(&title, &content, &ctx).await?,
        Commands::List { limit, json } => run_list(limit, json, &ctx).await?,
        Commands::Show { id, password } => run_show(&id, &password, &ctx).await?,
        Commands::Edit {
            id,
            title,
            content,
            password,
        } => {
            run_edit(&id, title.as_deref(), content.as_deref(), &password, &ctx).await?;
        }
        Commands::Delete { id } => run_delete(&id, &ctx).await?,
        Commands::Encrypt { id, password } => run_encrypt(&id, &password, &ctx).await?,
        Commands::Decrypt { id, password } => run_decrypt(&id, &password, &ctx).await?,
        Commands::Sync {
            compact,
            retention_days,
        } => run_sync(compact, retention_days, &ctx).await?,
        Commands::Watch => run_watch(&ctx).await?,
        Commands::Config { command } => run_config(&command, &ctx)?,
    }

    Ok(())
}
