//! Remote store contract and adapters

mod memory;
mod supabase;

pub use memory::MemoryRemoteStore;
pub use supabase::SupabaseRemoteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Document, DocumentId, Envelope, Lifecycle};
use crate::util::instant_from_ms;

/// Authoritative multi-device document store.
///
/// Adapters own no sync logic; they only move records.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Insert or replace every record by id
    async fn upsert_documents(&self, documents: &[RemoteDocument]) -> Result<()>;

    /// Records owned by `owner_id`, optionally only those updated strictly after `updated_after`.
    ///
    /// Returns every matching record; adapters backed by a paged API must
    /// follow all pages.
    async fn fetch_documents(
        &self,
        owner_id: &str,
        updated_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteDocument>>;

    /// Remove a record. Deleting a missing record is not an error.
    async fn delete_document(&self, id: &DocumentId) -> Result<()>;
}

/// Wire shape of a document in the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: DocumentId,
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub encrypted_content: Option<String>,
    #[serde(default)]
    pub salt: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub auth_tag: Option<String>,
}

impl RemoteDocument {
    /// Full current state of `document` as pushed for `owner_id`
    pub fn from_document(document: &Document, owner_id: &str) -> Result<Self> {
        let (encrypted_content, salt, nonce, auth_tag) = match document.envelope.clone() {
            Some(envelope) => {
                let (cipher_text, salt, nonce, auth_tag) = envelope.into_parts();
                (Some(cipher_text), Some(salt), Some(nonce), Some(auth_tag))
            }
            None => (None, None, None, None),
        };

        Ok(Self {
            id: document.id,
            owner_id: owner_id.to_string(),
            title: document.title.clone(),
            content: document.content.clone(),
            created_at: instant_from_ms(document.created_at)?,
            updated_at: instant_from_ms(document.updated_at)?,
            deleted: document.is_tombstoned(),
            encrypted_content,
            salt,
            nonce,
            auth_tag,
        })
    }

    /// Local document for this record, acknowledged at `synced_at`.
    ///
    /// Rejects records with a partial envelope or inconsistent timestamps.
    pub fn into_document(self, synced_at: i64) -> Result<Document> {
        let envelope =
            Envelope::from_parts(self.encrypted_content, self.salt, self.nonce, self.auth_tag)?;
        let document = Document {
            id: self.id,
            title: self.title,
            content: self.content,
            created_at: self.created_at.timestamp_millis(),
            updated_at: self.updated_at.timestamp_millis(),
            owner_id: Some(self.owner_id),
            synced_at: Some(synced_at),
            lifecycle: if self.deleted {
                Lifecycle::Tombstoned
            } else {
                Lifecycle::Active
            },
            envelope,
        };
        document.validate()?;
        Ok(document)
    }
}
