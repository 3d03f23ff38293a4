//! Two devices sharing one remote store.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use quire_core::db::{DocumentRepository, SqliteDocumentRepository};
use quire_core::remote::MemoryRemoteStore;
use quire_core::sync::SyncOutcome;
use quire_core::{Lifecycle, Workspace};

fn device() -> (Arc<SqliteDocumentRepository>, Workspace) {
    let local = Arc::new(SqliteDocumentRepository::open_in_memory().unwrap());
    let workspace = Workspace::new(local.clone());
    (local, workspace)
}

#[tokio::test]
async fn anonymous_document_reaches_second_device_after_sign_in() {
    let remote = MemoryRemoteStore::new();
    let (laptop_store, laptop) = device();

    let draft = laptop.create("Trip plan", "pack boots").await.unwrap();
    assert_eq!(draft.owner_id, None);
    assert_eq!(draft.synced_at, None);

    laptop.connect("u1", Arc::new(remote.clone())).await.unwrap();
    let migrated = laptop_store.get(&draft.id).await.unwrap().unwrap();
    assert_eq!(migrated.owner_id.as_deref(), Some("u1"));
    assert!(migrated.is_dirty());

    laptop.sync_once().await.unwrap();
    let pushed = laptop_store.get(&draft.id).await.unwrap().unwrap();
    assert!(pushed.synced_at.is_some());
    assert!(!pushed.is_dirty());

    let (_phone_store, phone) = device();
    phone.connect("u1", Arc::new(remote.clone())).await.unwrap();
    let listed = phone.list().await.unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, draft.id);
    assert_eq!(listed[0].title, "Trip plan");
    assert_eq!(listed[0].content, "pack boots");
}

#[tokio::test]
async fn deletion_propagates_and_purges_on_both_devices() {
    let remote = MemoryRemoteStore::new();
    let (laptop_store, laptop) = device();
    let (phone_store, phone) = device();
    laptop.connect("u1", Arc::new(remote.clone())).await.unwrap();
    phone.connect("u1", Arc::new(remote.clone())).await.unwrap();

    let doc = laptop.create("Shared", "text").await.unwrap();
    laptop.sync_once().await.unwrap();
    phone.sync_once().await.unwrap();
    assert!(phone_store.get(&doc.id).await.unwrap().is_some());

    // The phone pulls by its own last sync time, so the deletion must land after it
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(laptop.delete(&doc.id).await.unwrap(), Lifecycle::Tombstoned);
    laptop.sync_once().await.unwrap();
    assert!(laptop_store.get(&doc.id).await.unwrap().is_none());

    phone.sync_once().await.unwrap();
    assert!(phone_store.get(&doc.id).await.unwrap().is_none());
}

#[tokio::test]
async fn encrypted_document_syncs_as_ciphertext_only() {
    let remote = MemoryRemoteStore::new();
    let (_laptop_store, laptop) = device();
    let (_phone_store, phone) = device();
    laptop.connect("u1", Arc::new(remote.clone())).await.unwrap();
    phone.connect("u1", Arc::new(remote.clone())).await.unwrap();

    let doc = laptop.create("Diary", "dear diary").await.unwrap();
    laptop.encrypt(&doc.id, "pw").await.unwrap();
    laptop.sync_once().await.unwrap();

    let record = remote.record(&doc.id).await.unwrap();
    assert_eq!(record.content, "");
    assert!(record.encrypted_content.is_some());

    phone.sync_once().await.unwrap();
    assert_eq!(phone.unlock(&doc.id, "pw").await.unwrap(), "dear diary");
}

#[tokio::test]
async fn offline_edits_are_pushed_once_reachable() {
    let remote = MemoryRemoteStore::new();
    let (_store, laptop) = device();
    laptop.connect("u1", Arc::new(remote.clone())).await.unwrap();

    remote.set_unreachable(true);
    let doc = laptop.create("Offline", "draft").await.unwrap();
    match laptop.sync_once().await.unwrap() {
        SyncOutcome::Completed(report) => assert!(report.push_error.is_some()),
        SyncOutcome::Skipped => panic!("sync was skipped"),
    }
    assert!(laptop.get(&doc.id).await.unwrap().is_dirty());

    remote.set_unreachable(false);
    laptop.sync_once().await.unwrap();
    assert!(!laptop.get(&doc.id).await.unwrap().is_dirty());
    assert_eq!(remote.record(&doc.id).await.unwrap().content, "draft");
}
