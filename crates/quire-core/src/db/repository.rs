//! Local document store: the storage interface and its `SQLite` adapter

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;

use super::Database;
use crate::error::{Error, Result};
use crate::models::{Document, DocumentId, Envelope, Lifecycle};

/// Storage interface the rest of the crate depends on.
///
/// Every write either fully applies or fails with a storage error.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Fetch a document by id, including tombstones
    async fn get(&self, id: &DocumentId) -> Result<Option<Document>>;

    /// Live documents for `owner_id` (or anonymous documents when `None`), newest first
    async fn list(&self, owner_id: Option<&str>) -> Result<Vec<Document>>;

    /// Insert or replace a document by id
    async fn put(&self, document: &Document) -> Result<()>;

    /// Tombstone a document, purging it right away if it was never synced.
    ///
    /// Returns the resulting lifecycle state.
    async fn soft_delete(&self, id: &DocumentId) -> Result<Lifecycle>;

    /// Remove a document row. Returns whether a row existed.
    async fn hard_delete(&self, id: &DocumentId) -> Result<bool>;

    /// Documents owned by `owner_id` with unacknowledged changes, tombstones included
    async fn query_dirty(&self, owner_id: &str) -> Result<Vec<Document>>;

    /// Record a push or pull acknowledgement
    async fn mark_synced(&self, id: &DocumentId, synced_at: i64) -> Result<()>;

    /// Apply the remote store's acknowledgement of `pushed`.
    ///
    /// Tombstones are purged and live documents marked synced at `synced_at`.
    /// Returns `None` without changing anything when the stored document no
    /// longer matches the pushed state, so edits made mid-push stay dirty.
    /// A live document purged mid-push comes back as a dirty tombstone and
    /// `Some(Lifecycle::Tombstoned)` is returned.
    async fn acknowledge(&self, pushed: &Document, synced_at: i64) -> Result<Option<Lifecycle>>;

    /// Hand every live anonymous document to `owner_id`, leaving each one dirty.
    ///
    /// Returns the number of migrated documents.
    async fn migrate_ownership(&self, owner_id: &str) -> Result<usize>;

    /// Latest `synced_at` among the owner's documents, 0 if none
    async fn latest_synced_at(&self, owner_id: &str) -> Result<i64>;
}

/// `SQLite` implementation of `DocumentRepository`
#[derive(Clone)]
pub struct SqliteDocumentRepository {
    db: Arc<Mutex<Database>>,
}

impl SqliteDocumentRepository {
    /// Wrap an opened database
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open (or create) the store at `path`
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Database::open(path).map(Self::new)
    }

    /// Open an in-memory store (primarily for tests)
    pub fn open_in_memory() -> Result<Self> {
        Database::open_in_memory().map(Self::new)
    }
}

const SELECT_COLUMNS: &str = "SELECT id, owner_id, title, content, created_at, updated_at,
    synced_at, deleted, cipher_text, salt, nonce, auth_tag FROM documents";

#[async_trait]
impl DocumentRepository for SqliteDocumentRepository {
    async fn get(&self, id: &DocumentId) -> Result<Option<Document>> {
        let db = self.db.lock().await;
        select_one(db.connection(), id)
    }

    async fn list(&self, owner_id: Option<&str>) -> Result<Vec<Document>> {
        let db = self.db.lock().await;
        let sql = format!(
            "{SELECT_COLUMNS} WHERE deleted = 0 AND owner_id IS ? ORDER BY updated_at DESC"
        );
        select_many(db.connection(), &sql, params![owner_id])
    }

    async fn put(&self, document: &Document) -> Result<()> {
        document.validate()?;
        let db = self.db.lock().await;
        upsert(db.connection(), document)
    }

    async fn soft_delete(&self, id: &DocumentId) -> Result<Lifecycle> {
        let mut db = self.db.lock().await;
        let tx = db.connection_mut().transaction()?;

        let mut document =
            select_one(&tx, id)?.ok_or_else(|| Error::NotFound(id.to_string()))?;
        if document.is_tombstoned() {
            return Ok(Lifecycle::Tombstoned);
        }

        let next = document.soft_delete();
        if next == Lifecycle::Purged {
            tx.execute("DELETE FROM documents WHERE id = ?", params![id.as_str()])?;
        } else {
            upsert(&tx, &document)?;
        }
        tx.commit()?;

        tracing::debug!("Soft-deleted document {id} -> {next:?}");
        Ok(next)
    }

    async fn hard_delete(&self, id: &DocumentId) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db
            .connection()
            .execute("DELETE FROM documents WHERE id = ?", params![id.as_str()])?;
        Ok(rows > 0)
    }

    async fn query_dirty(&self, owner_id: &str) -> Result<Vec<Document>> {
        let db = self.db.lock().await;
        let sql = format!(
            "{SELECT_COLUMNS}
             WHERE owner_id = ? AND (synced_at IS NULL OR updated_at > synced_at)
             ORDER BY updated_at ASC"
        );
        select_many(db.connection(), &sql, params![owner_id])
    }

    async fn mark_synced(&self, id: &DocumentId, synced_at: i64) -> Result<()> {
        let db = self.db.lock().await;
        let rows = db.connection().execute(
            "UPDATE documents SET synced_at = ? WHERE id = ?",
            params![synced_at, id.as_str()],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn acknowledge(&self, pushed: &Document, synced_at: i64) -> Result<Option<Lifecycle>> {
        let mut db = self.db.lock().await;
        let tx = db.connection_mut().transaction()?;

        let Some(current) = select_one(&tx, &pushed.id)? else {
            if pushed.is_tombstoned() {
                return Ok(None);
            }
            // Purged while the push was in flight, so the remote now holds a
            // live copy. Keep a dirty tombstone to carry the deletion out.
            let mut tombstone = pushed.clone();
            tombstone.synced_at = Some(synced_at);
            tombstone.soft_delete();
            upsert(&tx, &tombstone)?;
            tx.commit()?;
            return Ok(Some(Lifecycle::Tombstoned));
        };
        if current.updated_at != pushed.updated_at || current.lifecycle != pushed.lifecycle {
            return Ok(None);
        }

        let next = current.lifecycle.acknowledge();
        if next == Lifecycle::Purged {
            tx.execute(
                "DELETE FROM documents WHERE id = ?",
                params![pushed.id.as_str()],
            )?;
        } else {
            tx.execute(
                "UPDATE documents SET synced_at = ? WHERE id = ?",
                params![synced_at, pushed.id.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(Some(next))
    }

    async fn migrate_ownership(&self, owner_id: &str) -> Result<usize> {
        if owner_id.trim().is_empty() {
            return Err(Error::Validation("owner id must not be empty".to_string()));
        }

        let mut db = self.db.lock().await;
        let tx = db.connection_mut().transaction()?;

        let sql = format!("{SELECT_COLUMNS} WHERE owner_id IS NULL AND deleted = 0");
        let anonymous = select_many(&tx, &sql, [])?;
        for mut document in anonymous.iter().cloned() {
            document.owner_id = Some(owner_id.to_string());
            document.touch();
            upsert(&tx, &document)?;
        }
        tx.commit()?;

        Ok(anonymous.len())
    }

    async fn latest_synced_at(&self, owner_id: &str) -> Result<i64> {
        let db = self.db.lock().await;
        let latest = db.connection().query_row(
            "SELECT COALESCE(MAX(synced_at), 0) FROM documents WHERE owner_id = ?",
            params![owner_id],
            |row| row.get(0),
        )?;
        Ok(latest)
    }
}

/// Raw column values, converted to a `Document` after the row borrow ends
struct DocumentRow {
    id: String,
    owner_id: Option<String>,
    title: String,
    content: String,
    created_at: i64,
    updated_at: i64,
    synced_at: Option<i64>,
    deleted: bool,
    cipher_text: Option<String>,
    salt: Option<String>,
    nonce: Option<String>,
    auth_tag: Option<String>,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            synced_at: row.get(6)?,
            deleted: row.get::<_, i32>(7)? != 0,
            cipher_text: row.get(8)?,
            salt: row.get(9)?,
            nonce: row.get(10)?,
            auth_tag: row.get(11)?,
        })
    }
}

impl TryFrom<DocumentRow> for Document {
    type Error = Error;

    fn try_from(row: DocumentRow) -> Result<Self> {
        let id = row
            .id
            .parse()
            .map_err(|_| Error::Storage(format!("invalid document id in store: {}", row.id)))?;
        let envelope = Envelope::from_parts(row.cipher_text, row.salt, row.nonce, row.auth_tag)?;
        Ok(Self {
            id,
            title: row.title,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
            owner_id: row.owner_id,
            synced_at: row.synced_at,
            lifecycle: if row.deleted {
                Lifecycle::Tombstoned
            } else {
                Lifecycle::Active
            },
            envelope,
        })
    }
}

fn select_one(conn: &Connection, id: &DocumentId) -> Result<Option<Document>> {
    let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
    conn.query_row(&sql, params![id.as_str()], DocumentRow::from_row)
        .optional()?
        .map(Document::try_from)
        .transpose()
}

fn select_many(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Document>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, DocumentRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(Document::try_from).collect()
}

fn upsert(conn: &Connection, document: &Document) -> Result<()> {
    let (cipher_text, salt, nonce, auth_tag) = match document.envelope.clone() {
        Some(envelope) => {
            let (cipher_text, salt, nonce, auth_tag) = envelope.into_parts();
            (Some(cipher_text), Some(salt), Some(nonce), Some(auth_tag))
        }
        None => (None, None, None, None),
    };

    conn.execute(
        "INSERT INTO documents (
            id, owner_id, title, content, created_at, updated_at, synced_at, deleted,
            cipher_text, salt, nonce, auth_tag
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            owner_id = COALESCE(excluded.owner_id, documents.owner_id),
            title = excluded.title,
            content = excluded.content,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at,
            synced_at = excluded.synced_at,
            deleted = excluded.deleted,
            cipher_text = excluded.cipher_text,
            salt = excluded.salt,
            nonce = excluded.nonce,
            auth_tag = excluded.auth_tag",
        params![
            document.id.as_str(),
            document.owner_id,
            document.title,
            document.content,
            document.created_at,
            document.updated_at,
            document.synced_at,
            i32::from(document.is_tombstoned()),
            cipher_text,
            salt,
            nonce,
            auth_tag,
        ],
    )?;
    Ok(())
}
