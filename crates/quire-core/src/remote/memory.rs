//! Process-local remote store.
//!
//! Shared by clones, so two workspaces holding clones of one store behave like
//! two devices talking to the same server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{RemoteDocument, RemoteStore};
use crate::error::{Error, Result};
use crate::models::DocumentId;

#[derive(Debug, Default)]
struct Counters {
    upsert_batches: AtomicUsize,
    fetch_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRemoteStore {
    records: Arc<Mutex<HashMap<DocumentId, RemoteDocument>>>,
    counters: Arc<Counters>,
    unreachable: Arc<AtomicBool>,
    latency: Option<Duration>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every request by `latency` before it touches the records
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every request fail with a network error until switched back
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn upsert_batches(&self) -> usize {
        self.counters.upsert_batches.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.counters.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.counters.delete_calls.load(Ordering::SeqCst)
    }

    /// Highest number of requests observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    /// Current record for `id`, if any
    pub async fn record(&self, id: &DocumentId) -> Option<RemoteDocument> {
        self.records.lock().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Insert a record directly, bypassing counters and reachability
    pub async fn insert(&self, document: RemoteDocument) {
        self.records.lock().await.insert(document.id, document);
    }

    async fn enter(&self) -> Result<InFlight<'_>> {
        let current = self.counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .max_in_flight
            .fetch_max(current, Ordering::SeqCst);
        let guard = InFlight {
            counters: &self.counters,
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Network("remote store unreachable".to_string()));
        }
        Ok(guard)
    }
}

struct InFlight<'a> {
    counters: &'a Counters,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn upsert_documents(&self, documents: &[RemoteDocument]) -> Result<()> {
        self.counters.upsert_batches.fetch_add(1, Ordering::SeqCst);
        let _request = self.enter().await?;

        let mut records = self.records.lock().await;
        for document in documents {
            records.insert(document.id, document.clone());
        }
        Ok(())
    }

    async fn fetch_documents(
        &self,
        owner_id: &str,
        updated_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteDocument>> {
        self.counters.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let _request = self.enter().await?;

        let records = self.records.lock().await;
        let mut documents: Vec<_> = records
            .values()
            .filter(|document| document.owner_id == owner_id)
            .filter(|document| updated_after.is_none_or(|after| document.updated_at > after))
            .cloned()
            .collect();
        documents.sort_by_key(|document| document.updated_at);
        Ok(documents)
    }

    async fn delete_document(&self, id: &DocumentId) -> Result<()> {
        self.counters.delete_calls.fetch_add(1, Ordering::SeqCst);
        let _request = self.enter().await?;

        self.records.lock().await.remove(id);
        Ok(())
    }
}
