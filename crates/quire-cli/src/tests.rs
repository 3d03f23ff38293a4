use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use pretty_assertions::assert_eq;
use quire_core::config::QuireConfig;
use quire_core::db::{DocumentRepository, SqliteDocumentRepository};
use quire_core::sync::SyncReport;
use quire_core::{Document, DocumentId, Workspace};

use crate::cli::PasswordArgs;
use crate::commands::add::run_add;
use crate::commands::common::{
    content_preview, default_editor, format_document_lines, format_relative_time,
    match_id_prefix, normalize_content, normalize_document_identifier, normalize_password,
    normalize_title, resolve_document, Context,
};
use crate::commands::delete::run_delete;
use crate::commands::encryption::{run_decrypt, run_encrypt};
use crate::commands::sync::{format_sync_report, run_sync};
use crate::error::CliError;

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn normalize_content_keeps_multiline_text() {
    assert_eq!(
        normalize_content("line 1\nline 2\n"),
        Some("line 1\nline 2".to_string())
    );
}

#[test]
fn normalize_title_rejects_blank() {
    assert_eq!(normalize_title(" Plans ").unwrap(), "Plans");
    assert!(matches!(normalize_title("   "), Err(CliError::EmptyTitle)));
}

#[test]
fn normalize_password_strips_only_the_line_ending() {
    assert_eq!(normalize_password(" secret \n").unwrap(), " secret ");
    assert!(matches!(
        normalize_password("\r\n"),
        Err(CliError::EmptyPassword)
    ));
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
}

#[test]
fn content_preview_truncates_with_ellipsis() {
    let preview = content_preview("This is a very long sentence that should be shortened", 20);
    assert_eq!(preview, "This is a very lo...");
}

#[test]
fn content_preview_uses_first_line_only() {
    assert_eq!(content_preview("  first   line \nsecond", 80), "first line");
}

#[test]
fn document_lines_mark_encrypted_documents() {
    let plain = Document::new("Groceries", "milk");
    let mut sealed = Document::new("Diary", "");
    sealed.envelope = Some(quire_core::crypto::encrypt("dear diary", "pw").unwrap());

    let lines = format_document_lines(&[plain, sealed]);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Groceries"));
    assert!(!lines[0].contains("[locked]"));
    assert!(lines[1].contains("Diary"));
    assert!(lines[1].ends_with("[locked]"));
}

#[test]
fn normalize_document_identifier_rejects_empty() {
    assert_eq!(
        normalize_document_identifier("  abc  ").unwrap(),
        "abc".to_string()
    );
    assert!(matches!(
        normalize_document_identifier("  "),
        Err(CliError::EmptyDocumentId)
    ));
}

#[test]
fn match_id_prefix_resolves_unique_prefix() {
    let ids = [
        id("11111111-1111-7111-8111-111111111111"),
        id("11111111-1111-7111-8111-222222222222"),
    ];

    assert_eq!(match_id_prefix("11111111-1111-7111-8111-2", &ids).unwrap(), ids[1]);
}

#[test]
fn match_id_prefix_rejects_ambiguous_and_missing() {
    let ids = [
        id("aaaaaaaa-aaaa-7aaa-8aaa-aaaaaaaaaaaa"),
        id("aaaaaaaa-aaaa-7aaa-8aaa-bbbbbbbbbbbb"),
    ];

    let error = match_id_prefix("aaaaaaaa", &ids).unwrap_err();
    match error {
        CliError::AmbiguousDocumentId(message) => {
            assert!(message.contains("aaaaaaaa-aaaa"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(matches!(
        match_id_prefix("ffff", &ids),
        Err(CliError::DocumentNotFound(_))
    ));
}

#[test]
fn format_sync_report_lists_failures() {
    let clean = SyncReport {
        pushed: 2,
        pulled: 1,
        ..SyncReport::default()
    };
    let lines = format_sync_report(&clean);
    assert_eq!(lines[0], "Pushed 2 (0 purged), pulled 1 (0 removed, 0 skipped)");
    assert_eq!(lines.last().map(String::as_str), Some("Sync completed"));

    let failed = SyncReport {
        push_error: Some("Network error: offline".to_string()),
        ..SyncReport::default()
    };
    let lines = format_sync_report(&failed);
    assert!(lines.contains(&"Push failed: Network error: offline".to_string()));
    assert!(!lines.contains(&"Sync completed".to_string()));
}

#[test]
fn core_validation_errors_are_shown_verbatim() {
    let error = CliError::from(quire_core::Error::Validation("wrong password".to_string()));
    assert_eq!(error.user_message(), "wrong password");
}

#[tokio::test(flavor = "current_thread")]
async fn resolve_document_supports_exact_and_prefix_id() {
    let db_path = unique_test_db_path();
    let repo = Arc::new(SqliteDocumentRepository::open(&db_path).unwrap());
    let mut doc_a = Document::new("A", "Doc A");
    doc_a.id = id("11111111-1111-7111-8111-111111111111");
    let mut doc_b = Document::new("B", "Doc B");
    doc_b.id = id("11111111-1111-7111-8111-222222222222");
    repo.put(&doc_a).await.unwrap();
    repo.put(&doc_b).await.unwrap();
    let workspace = Workspace::new(repo);

    let by_exact = resolve_document("11111111-1111-7111-8111-111111111111", &workspace)
        .await
        .unwrap();
    assert_eq!(by_exact.content, "Doc A");

    let by_prefix = resolve_document("11111111-1111-7111-8111-2", &workspace)
        .await
        .unwrap();
    assert_eq!(by_prefix.content, "Doc B");

    let missing = resolve_document("does-not-exist", &workspace)
        .await
        .unwrap_err();
    assert!(matches!(missing, CliError::DocumentNotFound(_)));

    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "current_thread")]
async fn run_delete_purges_unsynced_document_by_prefix() {
    let db_path = unique_test_db_path();
    let mut keep = Document::new("Keep", "Keep me");
    keep.id = id("bbbbbbbb-bbbb-7bbb-8bbb-111111111111");
    let mut drop_me = Document::new("Drop", "Delete me");
    drop_me.id = id("bbbbbbbb-bbbb-7bbb-8bbb-222222222222");
    {
        let repo = SqliteDocumentRepository::open(&db_path).unwrap();
        repo.put(&keep).await.unwrap();
        repo.put(&drop_me).await.unwrap();
    }

    run_delete("bbbbbbbb-bbbb-7bbb-8bbb-2", &test_context(&db_path, None))
        .await
        .unwrap();

    let repo = SqliteDocumentRepository::open(&db_path).unwrap();
    assert!(repo.get(&drop_me.id).await.unwrap().is_none());
    assert!(repo.get(&keep.id).await.unwrap().is_some());

    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "current_thread")]
async fn encrypt_and_decrypt_round_trip_through_commands() {
    let db_path = unique_test_db_path();
    let ctx = test_context(&db_path, None);
    run_add("Diary", &["dear".to_string(), "diary".to_string()], &ctx)
        .await
        .unwrap();

    let document = {
        let repo = SqliteDocumentRepository::open(&db_path).unwrap();
        repo.list(None).await.unwrap().remove(0)
    };
    assert_eq!(document.content, "dear diary");

    let password = PasswordArgs {
        password: Some("hunter2".to_string()),
    };
    run_encrypt(&document.id.to_string(), &password, &ctx)
        .await
        .unwrap();
    {
        let repo = SqliteDocumentRepository::open(&db_path).unwrap();
        let sealed = repo.get(&document.id).await.unwrap().unwrap();
        assert!(sealed.is_encrypted());
        assert_eq!(sealed.content, "");
    }

    let wrong = PasswordArgs {
        password: Some("nope".to_string()),
    };
    assert!(run_decrypt(&document.id.to_string(), &wrong, &ctx)
        .await
        .is_err());

    run_decrypt(&document.id.to_string(), &password, &ctx)
        .await
        .unwrap();
    let repo = SqliteDocumentRepository::open(&db_path).unwrap();
    let plain = repo.get(&document.id).await.unwrap().unwrap();
    assert!(!plain.is_encrypted());
    assert_eq!(plain.content, "dear diary");

    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "current_thread")]
async fn run_sync_requires_an_owner() {
    let db_path = unique_test_db_path();

    let error = run_sync(false, 30, &test_context(&db_path, None))
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::OwnerRequired));

    cleanup_db_files(&db_path);
}

#[tokio::test(flavor = "current_thread")]
async fn run_sync_requires_remote_configuration() {
    let db_path = unique_test_db_path();

    let error = run_sync(false, 30, &test_context(&db_path, Some("u1")))
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::SyncNotConfigured));

    cleanup_db_files(&db_path);
}

fn id(raw: &str) -> DocumentId {
    raw.parse().unwrap()
}

fn test_context(db_path: &PathBuf, owner: Option<&str>) -> Context {
    Context {
        db_path: db_path.clone(),
        config_path: db_path.with_extension("json"),
        config: QuireConfig::default(),
        owner: owner.map(str::to_string),
    }
}

fn unique_test_db_path() -> PathBuf {
    static NEXT_TEST_DB_ID: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let sequence = NEXT_TEST_DB_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("quire-cli-test-{timestamp}-{sequence}.db"))
}

fn cleanup_db_files(path: &PathBuf) {
    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(path.with_extension("db-shm"));
    let _ = std::fs::remove_file(path.with_extension("db-wal"));
}
