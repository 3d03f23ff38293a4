use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] quire_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Document title cannot be empty")]
    EmptyTitle,
    #[error("Document ID cannot be empty")]
    EmptyDocumentId,
    #[error("Password cannot be empty")]
    EmptyPassword,
    #[error("Document not found for id/prefix: {0}")]
    DocumentNotFound(String),
    #[error("{0}")]
    AmbiguousDocumentId(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Could not resolve a data directory; pass --db-path")]
    NoDataDir,
    #[error(
        "Sync is not configured. Set supabase_url and supabase_anon_key in the config file or QUIRE_SUPABASE_URL and QUIRE_SUPABASE_ANON_KEY."
    )]
    SyncNotConfigured,
    #[error("Sync needs a signed-in account. Pass --owner or set QUIRE_OWNER_ID.")]
    OwnerRequired,
    #[error("Sync needs a session access token in QUIRE_ACCESS_TOKEN")]
    AccessTokenRequired,
}

impl CliError {
    /// Message shown to the user on failure
    pub fn user_message(&self) -> String {
        match self {
            Self::Core(quire_core::Error::Config(detail)) => {
                format!("Configuration error: {detail}")
            }
            Self::Core(quire_core::Error::Validation(detail)) => detail.clone(),
            Self::Core(error) => error.user_message().to_string(),
            other => other.to_string(),
        }
    }
}
