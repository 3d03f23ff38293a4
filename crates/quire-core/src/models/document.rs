//! Document model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::Envelope;
use crate::error::{Error, Result};
use crate::util::now_ms;

/// A unique identifier for a document, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Create a new unique document ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Where a document is in its deletion lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Live document
    Active,
    /// Soft-deleted, retained until the remote store acknowledges the deletion
    Tombstoned,
    /// Removed from the local store; never persisted
    Purged,
}

impl Lifecycle {
    /// State after the remote store acknowledged the document's current record.
    #[must_use]
    pub const fn acknowledge(self) -> Self {
        match self {
            Self::Tombstoned | Self::Purged => Self::Purged,
            Self::Active => Self::Active,
        }
    }

    pub const fn is_tombstoned(self) -> bool {
        matches!(self, Self::Tombstoned)
    }
}

/// A text document, the unit of storage and sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier, immutable for the document's lifetime
    pub id: DocumentId,
    /// Plain text title
    pub title: String,
    /// Plain text content; empty while the document is encrypted
    pub content: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms), strictly increasing on every mutation
    pub updated_at: i64,
    /// Owning account; absent while the document is anonymous
    pub owner_id: Option<String>,
    /// Last acknowledged push or pull (Unix ms)
    pub synced_at: Option<i64>,
    /// Deletion lifecycle state
    pub lifecycle: Lifecycle,
    /// Encrypted content, when the document is password protected
    pub envelope: Option<Envelope>,
}

impl Document {
    /// Create a new anonymous document
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: DocumentId::new(),
            title: title.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
            owner_id: None,
            synced_at: None,
            lifecycle: Lifecycle::Active,
            envelope: None,
        }
    }

    /// Assign the owning account at creation time
    #[must_use]
    pub fn owned_by(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// Whether the document has changes the remote store has not acknowledged
    pub fn is_dirty(&self) -> bool {
        self.synced_at
            .is_none_or(|synced_at| self.updated_at > synced_at)
    }

    pub const fn is_encrypted(&self) -> bool {
        self.envelope.is_some()
    }

    pub const fn is_tombstoned(&self) -> bool {
        self.lifecycle.is_tombstoned()
    }

    /// Bump `updated_at` so the document reads as dirty.
    ///
    /// The new value is strictly greater than both the previous `updated_at`
    /// and `synced_at`, even when the clock has not advanced.
    pub fn touch(&mut self) {
        self.updated_at = next_updated_at(self.updated_at, self.synced_at, now_ms());
    }

    /// Replace title and/or content.
    pub fn edit(&mut self, title: Option<String>, content: Option<String>) -> Result<()> {
        self.ensure_active()?;
        if content.is_some() && self.is_encrypted() {
            return Err(Error::Validation(
                "content of an encrypted document must be re-encrypted".to_string(),
            ));
        }
        if let Some(title) = title {
            self.title = title;
        }
        if let Some(content) = content {
            self.content = content;
        }
        self.touch();
        Ok(())
    }

    /// Swap plaintext content for an envelope.
    pub fn seal(&mut self, envelope: Envelope) -> Result<()> {
        self.ensure_active()?;
        envelope.validate()?;
        self.envelope = Some(envelope);
        self.content.clear();
        self.touch();
        Ok(())
    }

    /// Drop the envelope and restore plaintext content.
    pub fn unseal(&mut self, plaintext: String) -> Result<()> {
        self.ensure_active()?;
        self.envelope = None;
        self.content = plaintext;
        self.touch();
        Ok(())
    }

    /// Tombstone the document.
    ///
    /// Returns [`Lifecycle::Purged`] when the document never reached the remote
    /// store and can be removed right away, [`Lifecycle::Tombstoned`] otherwise.
    pub fn soft_delete(&mut self) -> Lifecycle {
        self.content.clear();
        self.envelope = None;
        self.lifecycle = Lifecycle::Tombstoned;
        self.touch();

        if self.synced_at.is_none() {
            Lifecycle::Purged
        } else {
            Lifecycle::Tombstoned
        }
    }

    /// Check the invariants every stored document must hold.
    pub fn validate(&self) -> Result<()> {
        if self.lifecycle == Lifecycle::Purged {
            return Err(Error::Validation(
                "purged documents cannot be stored".to_string(),
            ));
        }
        if let Some(envelope) = &self.envelope {
            envelope.validate()?;
            if !self.content.is_empty() {
                return Err(Error::Validation(
                    "encrypted documents must not carry plaintext content".to_string(),
                ));
            }
        }
        if self.updated_at < self.created_at {
            return Err(Error::Validation(
                "updated_at must not precede created_at".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.lifecycle == Lifecycle::Active {
            Ok(())
        } else {
            Err(Error::Validation(format!("document {} is deleted", self.id)))
        }
    }
}

/// Next `updated_at` value for a mutation at `now`.
fn next_updated_at(updated_at: i64, synced_at: Option<i64>, now: i64) -> i64 {
    let floor = updated_at.max(synced_at.unwrap_or(i64::MIN)).saturating_add(1);
    now.max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn envelope() -> Envelope {
        Envelope {
            cipher_text: "Y3Q=".to_string(),
            salt: "c2FsdA==".to_string(),
            nonce: "bm9uY2U=".to_string(),
            auth_tag: "dGFn".to_string(),
        }
    }

    #[test]
    fn test_document_id_unique() {
        let id1 = DocumentId::new();
        let id2 = DocumentId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_document_id_parse() {
        let id = DocumentId::new();
        let parsed: DocumentId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn new_document_is_anonymous_and_dirty() {
        let doc = Document::new("Groceries", "milk");
        assert_eq!(doc.owner_id, None);
        assert_eq!(doc.synced_at, None);
        assert_eq!(doc.created_at, doc.updated_at);
        assert!(doc.is_dirty());
    }

    #[test]
    fn edit_after_sync_in_same_millisecond_is_dirty() {
        let mut doc = Document::new("t", "c");
        doc.synced_at = Some(doc.updated_at + 5_000);
        assert!(!doc.is_dirty());

        doc.edit(None, Some("changed".to_string())).unwrap();
        assert!(doc.is_dirty());
        assert_eq!(doc.content, "changed");
    }

    #[test]
    fn next_updated_at_strictly_increases() {
        assert_eq!(next_updated_at(100, None, 50), 101);
        assert_eq!(next_updated_at(100, Some(200), 150), 201);
        assert_eq!(next_updated_at(100, Some(50), 300), 300);
    }

    #[test]
    fn seal_clears_plaintext() {
        let mut doc = Document::new("secret", "plaintext");
        let before = doc.updated_at;
        doc.seal(envelope()).unwrap();
        assert!(doc.is_encrypted());
        assert_eq!(doc.content, "");
        assert!(doc.updated_at > before);
        doc.validate().unwrap();
    }

    #[test]
    fn editing_encrypted_content_is_rejected() {
        let mut doc = Document::new("secret", "plaintext");
        doc.seal(envelope()).unwrap();
        let error = doc.edit(None, Some("leak".to_string())).unwrap_err();
        assert!(matches!(error, Error::Validation(_)));
        doc.edit(Some("renamed".to_string()), None).unwrap();
        assert_eq!(doc.title, "renamed");
    }

    #[test]
    fn soft_delete_of_unsynced_document_purges() {
        let mut doc = Document::new("draft", "text");
        assert_eq!(doc.soft_delete(), Lifecycle::Purged);
        assert_eq!(doc.content, "");
    }

    #[test]
    fn soft_delete_of_synced_document_tombstones() {
        let mut doc = Document::new("shared", "text");
        doc.seal(envelope()).unwrap();
        doc.synced_at = Some(doc.updated_at);
        assert_eq!(doc.soft_delete(), Lifecycle::Tombstoned);
        assert!(doc.is_tombstoned());
        assert!(doc.envelope.is_none());
        assert!(doc.is_dirty());
        assert_eq!(doc.lifecycle.acknowledge(), Lifecycle::Purged);
    }

    #[test]
    fn tombstoned_documents_cannot_be_edited() {
        let mut doc = Document::new("gone", "text");
        doc.synced_at = Some(doc.updated_at);
        doc.soft_delete();
        assert!(doc.edit(Some("back".to_string()), None).is_err());
    }

    #[test]
    fn validate_rejects_plaintext_beside_envelope() {
        let mut doc = Document::new("secret", "");
        doc.envelope = Some(envelope());
        doc.content = "leak".to_string();
        assert!(matches!(doc.validate(), Err(Error::Validation(_))));
    }
}
