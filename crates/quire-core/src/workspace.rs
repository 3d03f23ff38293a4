//! Application context: the local store, password cache and signed-in session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::crypto::{self, PasswordCache, SweeperGuard, SWEEP_INTERVAL};
use crate::db::DocumentRepository;
use crate::error::{Error, Result};
use crate::models::{Document, DocumentId, Lifecycle};
use crate::ownership::migrate_anonymous_documents;
use crate::remote::RemoteStore;
use crate::sync::{SyncEngine, SyncHandle, SyncOutcome, SyncStatus, Visibility, DEFAULT_SYNC_INTERVAL};

struct Session {
    owner_id: String,
    engine: Arc<SyncEngine>,
    handle: Option<SyncHandle>,
}

/// Everything one user-facing client needs.
///
/// Must be created inside a Tokio runtime; it owns the password cache's
/// sweeper task.
pub struct Workspace {
    local: Arc<dyn DocumentRepository>,
    passwords: PasswordCache,
    _sweeper: SweeperGuard,
    session: Mutex<Option<Session>>,
    sync_interval: Duration,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Workspace")
            .field("owner_id", &self.owner_id())
            .field("passwords", &self.passwords)
            .field("sync_interval", &self.sync_interval)
            .finish_non_exhaustive()
    }
}

impl Workspace {
    pub fn new(local: Arc<dyn DocumentRepository>) -> Self {
        Self::with_passwords(local, PasswordCache::new())
    }

    pub fn with_passwords(local: Arc<dyn DocumentRepository>, passwords: PasswordCache) -> Self {
        let sweeper = passwords.spawn_sweeper(SWEEP_INTERVAL);
        Self {
            local,
            passwords,
            _sweeper: sweeper,
            session: Mutex::new(None),
            sync_interval: DEFAULT_SYNC_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_sync_interval(mut self, sync_interval: Duration) -> Self {
        self.sync_interval = sync_interval;
        self
    }

    /// Owner of the signed-in session, if any
    pub fn owner_id(&self) -> Option<String> {
        self.lock_session()
            .as_ref()
            .map(|session| session.owner_id.clone())
    }

    pub fn status(&self) -> SyncStatus {
        self.lock_session()
            .as_ref()
            .map_or(SyncStatus::Stopped, |session| session.engine.status())
    }

    // Documents

    /// Create a document, owned by the signed-in user if there is one
    pub async fn create(&self, title: &str, content: &str) -> Result<Document> {
        let mut document = Document::new(title, content);
        document.owner_id = self.owner_id();
        self.local.put(&document).await?;
        tracing::debug!("Created document {}", document.id);
        Ok(document)
    }

    /// Live document by id
    pub async fn get(&self, id: &DocumentId) -> Result<Document> {
        match self.local.get(id).await? {
            Some(document) if !document.is_tombstoned() => Ok(document),
            _ => Err(Error::NotFound(id.to_string())),
        }
    }

    /// Live documents, newest first.
    ///
    /// When signed in this first runs a sync cycle so the list reflects the
    /// remote store; a failed refresh still returns the local documents.
    pub async fn list(&self) -> Result<Vec<Document>> {
        let owner_id = match self.session_engine() {
            Some((owner_id, engine)) => {
                if let Err(error) = engine.sync(&owner_id).await {
                    tracing::warn!("Refresh before listing failed: {error}");
                }
                Some(owner_id)
            }
            None => None,
        };
        self.local.list(owner_id.as_deref()).await
    }

    /// Change title and/or content.
    ///
    /// New content for an encrypted document is re-encrypted with the cached
    /// password; the document must be unlocked first.
    pub async fn update(
        &self,
        id: &DocumentId,
        title: Option<String>,
        content: Option<String>,
    ) -> Result<Document> {
        let mut document = self.get(id).await?;
        match content {
            Some(content) if document.is_encrypted() => {
                let password = self.passwords.get(id).ok_or_else(|| {
                    Error::Validation(format!("document {id} is locked"))
                })?;
                let envelope = crypto::encrypt(&content, &password)?;
                if title.is_some() {
                    document.edit(title, None)?;
                }
                document.seal(envelope)?;
            }
            content => document.edit(title, content)?,
        }
        self.local.put(&document).await?;
        Ok(document)
    }

    /// Store `document` under `id`. The id itself can never change.
    pub async fn save_document(&self, id: &DocumentId, document: &Document) -> Result<()> {
        if &document.id != id {
            return Err(Error::Validation(format!(
                "document id is immutable (expected {id}, got {})",
                document.id
            )));
        }
        self.local.put(document).await
    }

    /// Soft delete. A never-synced document is purged right away.
    pub async fn delete(&self, id: &DocumentId) -> Result<Lifecycle> {
        let lifecycle = self.local.soft_delete(id).await?;
        self.passwords.clear(Some(id));
        Ok(lifecycle)
    }

    // Encryption

    /// Protect a document's content with `password`
    pub async fn encrypt(&self, id: &DocumentId, password: &str) -> Result<Document> {
        let mut document = self.get(id).await?;
        if document.is_encrypted() {
            return Err(Error::Validation(format!("document {id} is already encrypted")));
        }
        let envelope = crypto::encrypt(&document.content, password)?;
        document.seal(envelope)?;
        self.local.put(&document).await?;
        self.passwords.cache(*id, password);
        Ok(document)
    }

    /// Decrypt for reading and remember the password for later edits
    pub async fn unlock(&self, id: &DocumentId, password: &str) -> Result<String> {
        let document = self.get(id).await?;
        let envelope = document
            .envelope
            .as_ref()
            .ok_or_else(|| Error::Validation(format!("document {id} is not encrypted")))?;
        let plaintext = crypto::decrypt(envelope, password)?;
        self.passwords.cache(*id, password);
        Ok(plaintext)
    }

    /// Readable content, using the cached password for encrypted documents
    pub async fn read_content(&self, id: &DocumentId) -> Result<String> {
        let document = self.get(id).await?;
        let Some(envelope) = &document.envelope else {
            return Ok(document.content);
        };
        let password = self
            .passwords
            .get(id)
            .ok_or_else(|| Error::Validation(format!("document {id} is locked")))?;
        crypto::decrypt(envelope, &password)
    }

    /// Remove encryption permanently, restoring plaintext content
    pub async fn decrypt(&self, id: &DocumentId, password: &str) -> Result<Document> {
        let mut document = self.get(id).await?;
        let envelope = document
            .envelope
            .as_ref()
            .ok_or_else(|| Error::Validation(format!("document {id} is not encrypted")))?;
        let plaintext = crypto::decrypt(envelope, password)?;
        document.unseal(plaintext)?;
        self.local.put(&document).await?;
        self.passwords.clear(Some(id));
        Ok(document)
    }

    /// Forget the cached password for one document, or all of them
    pub fn lock(&self, id: Option<&DocumentId>) {
        self.passwords.clear(id);
    }

    pub fn is_unlocked(&self, id: &DocumentId) -> bool {
        self.passwords.get(id).is_some()
    }

    // Session

    /// Attach a session for `owner_id` without scheduling sync.
    ///
    /// Anonymous documents are migrated to the owner first. Returns the number
    /// of migrated documents.
    pub async fn connect(&self, owner_id: &str, remote: Arc<dyn RemoteStore>) -> Result<usize> {
        if self.owner_id().is_some() {
            self.sign_out().await;
        }
        let migrated = migrate_anonymous_documents(self.local.as_ref(), owner_id).await?;
        let engine = Arc::new(SyncEngine::new(Arc::clone(&self.local), remote));
        *self.lock_session() = Some(Session {
            owner_id: owner_id.to_string(),
            engine,
            handle: None,
        });
        Ok(migrated)
    }

    /// Sign in: migrate anonymous documents, then start scheduled sync
    pub async fn sign_in(&self, owner_id: &str, remote: Arc<dyn RemoteStore>) -> Result<usize> {
        let migrated = self.connect(owner_id, remote).await?;
        if let Some(session) = self.lock_session().as_mut() {
            session.handle = Some(session.engine.start(owner_id, self.sync_interval));
        }
        Ok(migrated)
    }

    /// Stop scheduled sync and forget every cached password
    pub async fn sign_out(&self) {
        let session = self.lock_session().take();
        if let Some(handle) = session.and_then(|session| session.handle) {
            handle.stop().await;
        }
        self.passwords.clear(None);
    }

    /// Stop scheduled sync, let a running cycle finish, sync once more, then
    /// sign out. The final cycle's outcome is returned even when it failed.
    pub async fn sign_out_after_final_sync(&self) -> Result<SyncOutcome> {
        let handle = self
            .lock_session()
            .as_mut()
            .and_then(|session| session.handle.take());
        if let Some(handle) = handle {
            handle.stop().await;
        }

        let outcome = match self.require_session() {
            Ok((owner_id, engine)) => {
                engine.wait_idle().await;
                engine.sync(&owner_id).await
            }
            Err(error) => Err(error),
        };
        self.sign_out().await;
        outcome
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        if let Some(handle) = self
            .lock_session()
            .as_ref()
            .and_then(|session| session.handle.as_ref())
        {
            handle.set_visibility(visibility);
        }
    }

    /// Fire a last sync without waiting for it and end the session
    pub fn teardown(&self) {
        if let Some(handle) = self
            .lock_session()
            .take()
            .and_then(|session| session.handle)
        {
            handle.teardown();
        }
    }

    /// Run one sync cycle now
    pub async fn sync_once(&self) -> Result<SyncOutcome> {
        let (owner_id, engine) = self.require_session()?;
        engine.sync(&owner_id).await
    }

    /// Delete the signed-in owner's remote tombstones older than `retention`
    pub async fn compact_remote_tombstones(&self, retention: Duration) -> Result<usize> {
        let (owner_id, engine) = self.require_session()?;
        engine.compact_remote_tombstones(&owner_id, retention).await
    }

    fn require_session(&self) -> Result<(String, Arc<SyncEngine>)> {
        self.session_engine()
            .ok_or_else(|| Error::Validation("not signed in".to_string()))
    }

    fn session_engine(&self) -> Option<(String, Arc<SyncEngine>)> {
        self.lock_session()
            .as_ref()
            .map(|session| (session.owner_id.clone(), Arc::clone(&session.engine)))
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
