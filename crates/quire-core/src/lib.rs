//! quire-core - Core library for Quire
//!
//! Local-first document storage with background sync to a remote store and
//! optional per-document password encryption. Shared by every Quire front end.

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod models;
pub mod ownership;
pub mod remote;
pub mod sync;
pub mod util;
pub mod workspace;

pub use error::{Error, ErrorKind, Result};
pub use models::{Document, DocumentId, Envelope, Lifecycle};
pub use workspace::Workspace;
