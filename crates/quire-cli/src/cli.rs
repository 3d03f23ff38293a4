use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Local-first text documents with optional per-document encryption")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH", env = "QUIRE_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Signed-in account id; documents are synced under this owner
    #[arg(long, global = true, value_name = "ID", env = "QUIRE_OWNER_ID")]
    pub owner: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new document
    #[command(alias = "new")]
    Add {
        /// Document title
        title: String,
        /// Document content (read from stdin when omitted)
        content: Vec<String>,
    },
    /// List documents, newest first
    List {
        /// Number of documents to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a document
    Show {
        /// Document ID or unique ID prefix
        id: String,
        #[command(flatten)]
        password: PasswordArgs,
    },
    /// Edit an existing document
    Edit {
        /// Document ID or unique ID prefix
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New content; opens $EDITOR when neither --title nor --content is given
        #[arg(long)]
        content: Option<String>,
        #[command(flatten)]
        password: PasswordArgs,
    },
    /// Delete a document
    Delete {
        /// Document ID or unique ID prefix
        id: String,
    },
    /// Protect a document's content with a password
    Encrypt {
        /// Document ID or unique ID prefix
        id: String,
        #[command(flatten)]
        password: PasswordArgs,
    },
    /// Remove a document's password protection
    Decrypt {
        /// Document ID or unique ID prefix
        id: String,
        #[command(flatten)]
        password: PasswordArgs,
    },
    /// Run one sync cycle with the remote store
    Sync {
        /// Also delete remote tombstones older than the retention window
        #[arg(long)]
        compact: bool,
        /// Tombstone retention in days, used with --compact
        #[arg(long, default_value = "30", value_name = "DAYS")]
        retention_days: u64,
    },
    /// Keep syncing on the configured interval until interrupted
    Watch,
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Clone, Default)]
pub struct PasswordArgs {
    /// Document password (read from stdin when omitted)
    #[arg(long, env = "QUIRE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as JSON
    Show,
    /// Print the config file location
    Path,
}
