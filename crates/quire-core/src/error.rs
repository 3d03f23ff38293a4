//! Error types for quire-core

use thiserror::Error;

/// Result type alias using quire-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in quire-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote store rejected or failed a request
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Wrong password, or a corrupted or tampered envelope.
    ///
    /// Carries no detail so that callers cannot distinguish the two cases.
    #[error("Authentication failed")]
    Authentication,

    /// Invalid input rejected before any store write
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Document not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of [`Error`] used for propagation decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Storage,
    Network,
    Authentication,
    Validation,
    NotFound,
    Configuration,
}

impl Error {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(_) | Self::Sqlite(_) | Self::Io(_) => ErrorKind::Storage,
            Self::Network(_) | Self::Http(_) => ErrorKind::Network,
            Self::Authentication => ErrorKind::Authentication,
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Config(_) => ErrorKind::Configuration,
        }
    }

    /// Short message suitable for showing to a user.
    ///
    /// Never includes the underlying error detail.
    pub const fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Storage => "Failed to save document",
            ErrorKind::Network => "Could not reach the sync server",
            ErrorKind::Authentication => "Invalid password",
            ErrorKind::Validation => "The change was rejected",
            ErrorKind::NotFound => "Document not found",
            ErrorKind::Configuration => "Sync is not configured",
        }
    }
}
