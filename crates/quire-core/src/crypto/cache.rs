//! Volatile, time-limited cache of document passwords

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use zeroize::Zeroizing;

use crate::models::DocumentId;

/// How long a cached password stays usable
pub const PASSWORD_TTL: Duration = Duration::from_secs(30 * 60);

/// How often the background sweep evicts expired entries
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct CachedPassword {
    password: Zeroizing<String>,
    expires_at: Instant,
}

impl CachedPassword {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory password cache keyed by document.
///
/// Entries are never persisted. Expired entries are evicted lazily on read and
/// proactively by the sweeper task.
#[derive(Clone)]
pub struct PasswordCache {
    entries: Arc<Mutex<HashMap<DocumentId, CachedPassword>>>,
    ttl: Duration,
}

impl Default for PasswordCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PasswordCache {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PasswordCache")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl PasswordCache {
    pub fn new() -> Self {
        Self::with_ttl(PASSWORD_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Remember `password` for `document_id` until the TTL elapses
    pub fn cache(&self, document_id: DocumentId, password: &str) {
        let entry = CachedPassword {
            password: Zeroizing::new(password.to_string()),
            expires_at: Instant::now() + self.ttl,
        };
        self.lock().insert(document_id, entry);
    }

    /// Cached password for `document_id`, evicting it if expired
    pub fn get(&self, document_id: &DocumentId) -> Option<Zeroizing<String>> {
        let mut entries = self.lock();
        let entry = entries.get(document_id)?;
        if entry.is_expired(Instant::now()) {
            entries.remove(document_id);
            tracing::debug!("Evicted expired password for document {document_id}");
            return None;
        }
        Some(entry.password.clone())
    }

    /// Forget one document's password, or every password when `None`
    pub fn clear(&self, document_id: Option<&DocumentId>) {
        let mut entries = self.lock();
        match document_id {
            Some(id) => {
                entries.remove(id);
            }
            None => entries.clear(),
        }
    }

    /// Evict every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the periodic sweep on the current Tokio runtime.
    ///
    /// The task stops when the returned guard is dropped.
    #[must_use]
    pub fn spawn_sweeper(&self, interval: Duration) -> SweeperGuard {
        let cache = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = cache.sweep();
                if evicted > 0 {
                    tracing::debug!("Password cache sweep evicted {evicted} entries");
                }
            }
        });
        SweeperGuard { task }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DocumentId, CachedPassword>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Aborts the sweeper task on drop
#[derive(Debug)]
pub struct SweeperGuard {
    task: JoinHandle<()>,
}

impl Drop for SweeperGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn cached_password_is_returned_before_expiry() {
        let cache = PasswordCache::new();
        let id = DocumentId::new();
        cache.cache(id, "pw");

        tokio::time::advance(Duration::from_secs(29 * 60)).await;
        assert_eq!(cache.get(&id).as_deref().map(String::as_str), Some("pw"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_password_is_evicted_on_read() {
        let cache = PasswordCache::new();
        let id = DocumentId::new();
        cache.cache(id, "pw");

        tokio::time::advance(PASSWORD_TTL + Duration::from_secs(1)).await;
        assert!(cache.get(&id).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn recaching_extends_expiry() {
        let cache = PasswordCache::new();
        let id = DocumentId::new();
        cache.cache(id, "old");

        tokio::time::advance(Duration::from_secs(20 * 60)).await;
        cache.cache(id, "new");
        tokio::time::advance(Duration::from_secs(20 * 60)).await;

        assert_eq!(cache.get(&id).as_deref().map(String::as_str), Some("new"));
    }

    #[tokio::test]
    async fn clear_removes_one_or_all() {
        let cache = PasswordCache::new();
        let first = DocumentId::new();
        let second = DocumentId::new();
        cache.cache(first, "a");
        cache.cache(second, "b");

        cache.clear(Some(&first));
        assert!(cache.get(&first).is_none());
        assert!(cache.get(&second).is_some());

        cache.clear(None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_without_reads() {
        let cache = PasswordCache::with_ttl(Duration::from_secs(90));
        let _sweeper = cache.spawn_sweeper(SWEEP_INTERVAL);
        cache.cache(DocumentId::new(), "pw");

        // First sweep at 60s keeps the entry, second at 120s evicts it
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(cache.len(), 1);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn debug_output_hides_passwords() {
        let cache = PasswordCache::new();
        cache.cache(DocumentId::new(), "hunter2");
        let rendered = format!("{cache:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
