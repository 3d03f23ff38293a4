//! Data models for Quire

mod document;
mod envelope;

pub use document::{Document, DocumentId, Lifecycle};
pub use envelope::Envelope;
