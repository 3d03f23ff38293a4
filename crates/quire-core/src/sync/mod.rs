//! Sync engine: reconciles the local store with the remote store.
//!
//! A cycle pushes every dirty document, then pulls whatever changed remotely
//! since the local high-water mark. Conflicts resolve last-write-wins on whole
//! documents. A remote record newer than an unpushed local edit overwrites it;
//! that loss is logged but not otherwise surfaced. A remote edit whose
//! `updated_at` is at or below the local high-water mark is never pulled.

mod scheduler;

pub use scheduler::{SyncHandle, Visibility};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;

use crate::db::DocumentRepository;
use crate::error::Result;
use crate::models::{Document, Lifecycle};
use crate::remote::{RemoteDocument, RemoteStore};
use crate::util::{instant_from_ms, now_ms};

/// Period of the scheduled sync timer
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// How long remote tombstones are kept before compaction removes them
pub const DEFAULT_TOMBSTONE_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// No session is scheduled
    Stopped,
    /// Scheduled and waiting for the next trigger
    Idle,
    /// A cycle is running
    Syncing,
}

/// What one completed cycle did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Live documents acknowledged by the remote store
    pub pushed: usize,
    /// Tombstones purged locally after the remote store acknowledged them
    pub purged: usize,
    /// Remote records written to the local store
    pub pulled: usize,
    /// Local documents removed because the remote record is a tombstone
    pub removed: usize,
    /// Remote records rejected as invalid
    pub skipped: usize,
    /// Contained push failure; the pushed documents stay dirty
    pub push_error: Option<String>,
    /// Contained pull failure
    pub pull_error: Option<String>,
}

impl SyncReport {
    pub const fn is_clean(&self) -> bool {
        self.push_error.is_none() && self.pull_error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Dropped because another cycle was already running
    Skipped,
    Completed(SyncReport),
}

pub struct SyncEngine {
    local: Arc<dyn DocumentRepository>,
    remote: Arc<dyn RemoteStore>,
    in_progress: AtomicBool,
    idle: Notify,
    scheduled: AtomicBool,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncEngine")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Clears the in-progress flag when a cycle ends, including on error
struct InProgress<'a> {
    flag: &'a AtomicBool,
    idle: &'a Notify,
}

impl<'a> InProgress<'a> {
    fn acquire(flag: &'a AtomicBool, idle: &'a Notify) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, idle })
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.idle.notify_waiters();
    }
}

impl SyncEngine {
    pub fn new(local: Arc<dyn DocumentRepository>, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            local,
            remote,
            in_progress: AtomicBool::new(false),
            idle: Notify::new(),
            scheduled: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> SyncStatus {
        if self.in_progress.load(Ordering::Acquire) {
            SyncStatus::Syncing
        } else if self.scheduled.load(Ordering::Acquire) {
            SyncStatus::Idle
        } else {
            SyncStatus::Stopped
        }
    }

    /// Wait until no cycle is running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.in_progress.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }

    /// Run one push-then-pull cycle for `owner_id`.
    ///
    /// Returns [`SyncOutcome::Skipped`] if a cycle is already running. Remote
    /// failures are contained in the report; local store failures abort the
    /// cycle with an error.
    pub async fn sync(&self, owner_id: &str) -> Result<SyncOutcome> {
        let Some(_guard) = InProgress::acquire(&self.in_progress, &self.idle) else {
            tracing::debug!("Sync already in progress, dropping trigger");
            return Ok(SyncOutcome::Skipped);
        };

        // Captured before push acknowledgements move it forward
        let high_water_mark = self.local.latest_synced_at(owner_id).await?;

        let mut report = SyncReport::default();
        self.push(owner_id, &mut report).await?;
        self.pull(owner_id, high_water_mark, &mut report).await?;

        tracing::debug!(
            "Sync for {owner_id}: pushed {}, purged {}, pulled {}, removed {}",
            report.pushed,
            report.purged,
            report.pulled,
            report.removed
        );
        Ok(SyncOutcome::Completed(report))
    }

    async fn push(&self, owner_id: &str, report: &mut SyncReport) -> Result<()> {
        let dirty = self.local.query_dirty(owner_id).await?;
        if dirty.is_empty() {
            return Ok(());
        }

        let records = dirty
            .iter()
            .map(|document| RemoteDocument::from_document(document, owner_id))
            .collect::<Result<Vec<_>>>()?;
        if let Err(error) = self.remote.upsert_documents(&records).await {
            tracing::warn!("Push of {} documents failed: {error}", records.len());
            report.push_error = Some(error.to_string());
            return Ok(());
        }

        let pushed_at = now_ms();
        for document in &dirty {
            let synced_at = pushed_at.max(document.updated_at);
            match self.local.acknowledge(document, synced_at).await? {
                Some(Lifecycle::Purged) => report.purged += 1,
                Some(Lifecycle::Tombstoned) if !document.is_tombstoned() => {
                    tracing::debug!("Document {} deleted during push", document.id);
                }
                Some(_) => report.pushed += 1,
                None => tracing::debug!("Document {} changed during push", document.id),
            }
        }
        Ok(())
    }

    async fn pull(&self, owner_id: &str, high_water_mark: i64, report: &mut SyncReport) -> Result<()> {
        let updated_after = if high_water_mark > 0 {
            Some(instant_from_ms(high_water_mark)?)
        } else {
            None
        };

        let records = match self.remote.fetch_documents(owner_id, updated_after).await {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!("Pull failed: {error}");
                report.pull_error = Some(error.to_string());
                return Ok(());
            }
        };

        let pulled_at = now_ms();
        for record in records {
            let id = record.id;
            let incoming = match record.into_document(pulled_at) {
                Ok(document) => document,
                Err(error) => {
                    tracing::warn!("Skipping invalid remote document {id}: {error}");
                    report.skipped += 1;
                    continue;
                }
            };
            self.apply_pulled(incoming, pulled_at, report).await?;
        }
        Ok(())
    }

    async fn apply_pulled(
        &self,
        mut incoming: Document,
        pulled_at: i64,
        report: &mut SyncReport,
    ) -> Result<()> {
        let id = incoming.id;
        if let Some(local) = self.local.get(&id).await? {
            if local.is_dirty() {
                if local.updated_at > incoming.updated_at {
                    // Pushed on the next cycle
                    return Ok(());
                }
                tracing::warn!(
                    "Remote record for document {id} overwrites unpushed local changes"
                );
            } else if local.updated_at == incoming.updated_at
                && local.lifecycle == incoming.lifecycle
            {
                return Ok(());
            }
        } else if incoming.is_tombstoned() {
            return Ok(());
        }

        if incoming.is_tombstoned() {
            if self.local.hard_delete(&id).await? {
                report.removed += 1;
            }
            return Ok(());
        }

        incoming.synced_at = Some(pulled_at.max(incoming.updated_at));
        self.local.put(&incoming).await?;
        report.pulled += 1;
        Ok(())
    }

    /// Delete the owner's remote tombstones older than `retention`.
    ///
    /// Returns how many were removed. Unlike a sync cycle, remote failures are
    /// returned to the caller.
    pub async fn compact_remote_tombstones(
        &self,
        owner_id: &str,
        retention: Duration,
    ) -> Result<usize> {
        let retention = chrono::Duration::from_std(retention)
            .map_err(|error| crate::Error::Validation(format!("invalid retention: {error}")))?;
        let cutoff = Utc::now() - retention;

        let records = self.remote.fetch_documents(owner_id, None).await?;
        let mut removed = 0;
        for record in records
            .iter()
            .filter(|record| record.deleted && record.updated_at < cutoff)
        {
            self.remote.delete_document(&record.id).await?;
            removed += 1;
        }

        if removed > 0 {
            tracing::info!("Compacted {removed} remote tombstones for {owner_id}");
        }
        Ok(removed)
    }

    pub(crate) fn set_scheduled(&self, scheduled: bool) {
        self.scheduled.store(scheduled, Ordering::Release);
    }
}
