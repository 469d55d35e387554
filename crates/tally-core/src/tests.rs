use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};

use crate::auth::{AuthSession, AuthUser, MemorySessionStore, SessionPersistence};
use crate::config::ClientConfig;
use crate::models::{Collection, FallbackReason, Mutation, Snapshot, SnapshotSource};
use crate::queue::OfflineQueue;
use crate::remote::{MemoryRemoteStore, RemoteCall};
use crate::store::LocalDatabase;
use crate::sync::{ConnectivityFlag, SyncCoordinator};
use crate::TallyContext;

const DOCS: &str = "/v1/projects/demo/databases/(default)/documents";

fn fields(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

async fn memory_coordinator(
    online: bool,
) -> (
    SyncCoordinator<LocalDatabase, MemoryRemoteStore, ConnectivityFlag>,
    MemoryRemoteStore,
    ConnectivityFlag,
) {
    let store = LocalDatabase::open_in_memory().await.unwrap();
    let remote = MemoryRemoteStore::new();
    let connectivity = ConnectivityFlag::new(online);
    let coordinator = SyncCoordinator::new(
        store,
        remote.clone(),
        connectivity.clone(),
        Duration::from_secs(5),
    );
    (coordinator, remote, connectivity)
}

fn seed_ledger(remote: &MemoryRemoteStore) {
    remote.insert_document(
        "u1",
        Collection::Accounts,
        "cash",
        fields(json!({"name": "Cash", "createdAt": 1_700_000_000_000_i64})),
    );
    remote.insert_document(
        "u1",
        Collection::JournalHeaders,
        "h1",
        fields(json!({"memo": "Coffee", "date": "2024-03-01"})),
    );
    remote.insert_document(
        "u1",
        Collection::JournalLines,
        "l1",
        fields(json!({"header": "h1", "amount": -450, "createdAt": 1_700_000_000_001_i64})),
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn repeated_online_loads_are_byte_identical() {
    let (coordinator, remote, _) = memory_coordinator(true).await;
    seed_ledger(&remote);

    let first = coordinator.load_all("u1").await.unwrap();
    let second = coordinator.load_all("u1").await.unwrap();

    assert_eq!(first.source, SnapshotSource::Cloud);
    assert_eq!(second.source, SnapshotSource::Cloud);
    assert_eq!(
        serde_json::to_string(&first.data).unwrap(),
        serde_json::to_string(&second.data).unwrap()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_load_returns_exactly_the_cached_snapshot() {
    let (coordinator, remote, connectivity) = memory_coordinator(true).await;
    seed_ledger(&remote);
    let cached = coordinator.load_all("u1").await.unwrap().data;

    connectivity.set_online(false);
    let result = coordinator.load_all("u1").await.unwrap();

    assert_eq!(result.source, SnapshotSource::Cache);
    assert_eq!(result.fallback, Some(FallbackReason::Offline));
    assert_eq!(result.data, cached);
    assert_eq!(result.data.len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_load_without_cache_is_empty() {
    let (coordinator, _, _) = memory_coordinator(false).await;

    let result = coordinator.load_all("never-seen").await.unwrap();

    assert_eq!(result.source, SnapshotSource::Cache);
    assert_eq!(result.data, Snapshot::default());
    assert_eq!(
        serde_json::to_value(&result.data).unwrap(),
        json!({"accounts": [], "journalHeaders": [], "journalLines": []})
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_remote_falls_back_to_cache() {
    let (coordinator, remote, _) = memory_coordinator(true).await;
    seed_ledger(&remote);
    let cached = coordinator.load_all("u1").await.unwrap().data;

    remote.set_unreachable(true);
    let result = coordinator.load_all("u1").await.unwrap();

    assert_eq!(result.source, SnapshotSource::Cache);
    assert_eq!(result.data, cached);
    assert!(matches!(
        result.fallback,
        Some(FallbackReason::RemoteFailure(ref message)) if message.contains("unreachable")
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_write_replays_after_reconnect() {
    let (coordinator, remote, connectivity) = memory_coordinator(false).await;

    let outcome = coordinator
        .submit(
            "u1",
            Mutation::set(Collection::Accounts, "acc1", fields(json!({"name": "Savings"}))),
        )
        .await
        .unwrap();
    assert!(outcome.drain.skipped_offline);
    assert_eq!(coordinator.queue_size("u1").await.unwrap(), 1);
    assert!(remote.calls().is_empty());

    connectivity.set_online(true);
    let report = coordinator.flush("u1").await.unwrap();

    assert_eq!(report.replayed, 1);
    assert_eq!(coordinator.queue_size("u1").await.unwrap(), 0);
    assert_eq!(
        remote.calls(),
        vec![RemoteCall::Write {
            uid: "u1".to_string(),
            collection: Collection::Accounts,
            id: "acc1".to_string(),
            merge: true,
        }]
    );
    assert_eq!(
        remote.document("u1", Collection::Accounts, "acc1"),
        Some(fields(json!({"name": "Savings"})))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn queue_survives_restart() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("tally.db");

    {
        let store = LocalDatabase::open(&path).await.unwrap();
        let queue = OfflineQueue::with_clock(store, Arc::new(|| 42));
        queue
            .enqueue("u1", Mutation::delete(Collection::JournalLines, "l9"))
            .await
            .unwrap();
    }

    let store = LocalDatabase::open(&path).await.unwrap();
    let remote = MemoryRemoteStore::new();
    let coordinator =
        SyncCoordinator::new(store, remote.clone(), true, Duration::from_secs(5));
    let pending = coordinator.queue().pending("u1").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].queued_at, 42);

    coordinator.flush("u1").await.unwrap();
    assert_eq!(coordinator.queue_size("u1").await.unwrap(), 0);
    assert_eq!(remote.calls().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn sign_up_then_first_load_caches_an_empty_snapshot() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/accounts:signUp");
            then.status(200).json_body(json!({
                "localId": "new-user",
                "email": "a@b.com",
                "idToken": "id-token",
                "refreshToken": "refresh-token",
                "expiresIn": "3600"
            }));
        })
        .await;
    let reads = server
        .mock_async(|when, then| {
            when.method(GET)
                .path_contains("/users/new-user/")
                .header("authorization", "Bearer id-token");
            then.status(200).json_body(json!({}));
        })
        .await;

    let context = TallyContext::in_memory(
        ClientConfig::for_base_url(&server.base_url(), "demo"),
        MemorySessionStore::default(),
    )
    .await
    .unwrap();

    let session = context.auth().sign_up("a@b.com", "secret1").await.unwrap();
    assert_eq!(session.user.uid, "new-user");
    assert_eq!(session.user.email.as_deref(), Some("a@b.com"));

    let (restored, coordinator) = context.signed_in().await.unwrap();
    assert_eq!(restored.user, session.user);

    let result = coordinator.load_all(&session.user.uid).await.unwrap();
    reads.assert_hits_async(3).await;
    assert_eq!(result.source, SnapshotSource::Cloud);
    assert!(result.data.is_empty());
    assert_eq!(
        coordinator.cached_snapshot("new-user").await.unwrap(),
        Some(Snapshot::default())
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn firestore_write_failure_keeps_item_queued() {
    let server = MockServer::start_async().await;
    let commit = server
        .mock_async(|when, then| {
            when.method(POST).path(format!("{DOCS}:commit"));
            then.status(503).json_body(json!({
                "error": {"code": 503, "message": "The service is currently unavailable.", "status": "UNAVAILABLE"}
            }));
        })
        .await;

    let context = TallyContext::in_memory(
        ClientConfig::for_base_url(&server.base_url(), "demo"),
        MemorySessionStore::default(),
    )
    .await
    .unwrap();
    let session = crate::auth::AuthSession {
        id_token: "id".to_string(),
        refresh_token: "refresh".to_string(),
        expires_at: i64::MAX / 2,
        user: crate::auth::AuthUser {
            uid: "u1".to_string(),
            email: None,
        },
    };
    let coordinator = context.coordinator(&session);

    let outcome = coordinator
        .submit("u1", Mutation::delete(Collection::Accounts, "acc1"))
        .await
        .unwrap();

    commit.assert_async().await;
    let halt = outcome.drain.halted.unwrap();
    assert!(!halt.permanent);
    assert_eq!(halt.item_id, outcome.item.id);
    assert_eq!(coordinator.queue_size("u1").await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn signed_in_requires_a_session() {
    let context = TallyContext::in_memory(
        ClientConfig::for_base_url("http://127.0.0.1:9", "demo"),
        MemorySessionStore::default(),
    )
    .await
    .unwrap();

    assert!(matches!(
        context.signed_in().await,
        Err(crate::Error::NotSignedIn)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_auth_keeps_expired_session_usable() {
    let sessions = MemorySessionStore::default();
    let expired = AuthSession {
        id_token: "old-id".to_string(),
        refresh_token: "refresh-1".to_string(),
        expires_at: 0,
        user: AuthUser {
            uid: "u1".to_string(),
            email: Some("a@b.com".to_string()),
        },
    };
    sessions.save_session(&expired).unwrap();
    let context = TallyContext::in_memory(
        ClientConfig::for_base_url("http://127.0.0.1:9", "demo"),
        sessions.clone(),
    )
    .await
    .unwrap();

    let (session, coordinator) = context.signed_in().await.unwrap();
    assert_eq!(session.user.uid, "u1");
    assert_eq!(sessions.load_session().unwrap(), Some(expired));

    let loaded = coordinator.load_all("u1").await.unwrap();
    assert_eq!(loaded.source, SnapshotSource::Cache);
    assert!(matches!(
        loaded.fallback,
        Some(FallbackReason::RemoteFailure(_))
    ));

    let outcome = coordinator
        .submit("u1", Mutation::delete(Collection::Accounts, "acc1"))
        .await
        .unwrap();
    assert!(outcome.drain.halted.is_some());
    assert_eq!(coordinator.queue_size("u1").await.unwrap(), 1);
}
