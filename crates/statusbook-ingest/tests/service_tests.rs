//! Record service integration tests
//!
//! Covers the owner rule on statuses, cascade delete and the end-to-end
//! scenario of loading a user file and then editing statuses by hand.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{write_csv, ProbeCollection, USERS_HEADER};
use statusbook_common::{Status, StatusbookError, User};
use statusbook_ingest::pipeline::load_users;
use statusbook_ingest::store::{Collection, Filter, MemoryCollection, Store};
use statusbook_ingest::{LoadStrategy, RecordService, WriteOutcome};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

fn sesame() -> User {
    User::new("SC", "sesame@uw.edu", "Sesame", "Chan")
}

#[tokio::test]
async fn test_load_then_edit_statuses() {
    let dir = tempfile::tempdir().unwrap();
    let rows = vec![
        "SC,sesame@uw.edu,Sesame,Chan".to_string(),
        "SC,sesame@uw.edu,Sesame,Chan".to_string(),
    ];
    let path = write_csv(dir.path(), "accounts.csv", USERS_HEADER, &rows);
    let store = Store::open(Path::new(":memory:")).unwrap();

    let report = load_users(
        &path,
        store.users.clone(),
        NonZeroUsize::new(10).unwrap(),
        LoadStrategy::Sequential,
    )
    .await
    .unwrap();
    assert!(report.is_success());
    assert_eq!(store.users.count_documents(None).await.unwrap(), 1);

    let service = RecordService::new(store.users.clone(), store.statuses.clone());
    assert_eq!(
        service.add_status(&Status::new("SC1", "SC", "Meow")).await.unwrap(),
        WriteOutcome::Applied
    );
    assert_eq!(
        service.update_status(&Status::new("SC1", "OTHER", "x")).await.unwrap(),
        WriteOutcome::OwnerMismatch
    );

    let stored = service.search_status("SC1").await.unwrap().unwrap();
    assert_eq!(stored.status_text, "Meow");
}

#[tokio::test]
async fn test_add_status_for_unknown_user_never_inserts() {
    let statuses = Arc::new(ProbeCollection::new("statuses"));
    let service = RecordService::new(Arc::new(MemoryCollection::new("users")), statuses.clone());

    let outcome = service
        .add_status(&Status::new("X1", "ghost", "boo"))
        .await
        .unwrap();

    assert_eq!(outcome, WriteOutcome::OwnerNotFound);
    assert_eq!(statuses.insert_one_calls(), 0);
    assert_eq!(statuses.count_documents(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_user_cascades_to_statuses() {
    let users = Arc::new(MemoryCollection::new("users"));
    let statuses = Arc::new(MemoryCollection::new("statuses"));
    let service = RecordService::new(users.clone(), statuses.clone());

    service.add_user(&sesame()).await.unwrap();
    service
        .add_user(&User::new("BB", "bird@uw.edu", "Big", "Bird"))
        .await
        .unwrap();
    for (id, text) in [("SC1", "Meow"), ("SC2", "Purr"), ("SC3", "Hiss")] {
        assert!(service
            .add_status(&Status::new(id, "SC", text))
            .await
            .unwrap()
            .is_applied());
    }
    service.add_status(&Status::new("BB1", "BB", "Tweet")).await.unwrap();

    assert_eq!(service.delete_user("SC").await.unwrap(), WriteOutcome::Applied);

    assert!(service.search_user("SC").await.unwrap().is_none());
    assert_eq!(
        statuses
            .count_documents(Some(&Filter::field_eq("user_id", "SC")))
            .await
            .unwrap(),
        0
    );
    // Other users are untouched
    assert_eq!(users.count_documents(None).await.unwrap(), 1);
    assert_eq!(statuses.count_documents(None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_unknown_user_removes_nothing() {
    let users = Arc::new(MemoryCollection::new("users"));
    let statuses = Arc::new(MemoryCollection::new("statuses"));
    let service = RecordService::new(users.clone(), statuses.clone());
    service.add_user(&sesame()).await.unwrap();
    service.add_status(&Status::new("SC1", "SC", "Meow")).await.unwrap();

    assert_eq!(service.delete_user("ghost").await.unwrap(), WriteOutcome::NotFound);
    assert_eq!(users.count_documents(None).await.unwrap(), 1);
    assert_eq!(statuses.count_documents(None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_cascade_is_reported() {
    let statuses = Arc::new(ProbeCollection::new("statuses").failing_delete_many());
    let service = RecordService::new(Arc::new(MemoryCollection::new("users")), statuses.clone());
    service.add_user(&sesame()).await.unwrap();
    service.add_status(&Status::new("SC1", "SC", "Meow")).await.unwrap();

    let err = service.delete_user("SC").await.unwrap_err();

    match err {
        StatusbookError::CascadeIncomplete { user_id, .. } => assert_eq!(user_id, "SC"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(service.search_user("SC").await.unwrap().is_none());
    assert!(service.search_status("SC1").await.unwrap().is_some());
}

#[tokio::test]
async fn test_sqlite_service_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("book.db")).unwrap();
    assert!(store.shareable);
    let service = RecordService::new(store.users.clone(), store.statuses.clone());

    assert!(service.add_user(&sesame()).await.unwrap().is_applied());
    assert_eq!(service.add_user(&sesame()).await.unwrap(), WriteOutcome::AlreadyExists);
    assert!(service
        .add_status(&Status::new("SC1", "SC", "Meow"))
        .await
        .unwrap()
        .is_applied());

    let renamed = User::new("SC", "sesame@uw.edu", "Sesame", "Chan-Lee");
    assert!(service.update_user(&renamed).await.unwrap().is_applied());

    // A second handle on the same file sees the writes
    let reopened = Store::open(&dir.path().join("book.db")).unwrap();
    let other = RecordService::new(reopened.users, reopened.statuses);
    assert_eq!(other.search_user("SC").await.unwrap(), Some(renamed));

    assert!(other.delete_user("SC").await.unwrap().is_applied());
    assert!(service.search_status("SC1").await.unwrap().is_none());
}
