//! Local store for Quire

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{DocumentRepository, SqliteDocumentRepository};
