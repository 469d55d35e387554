//! Offline write queue.
//!
//! Every mutation is persisted in the local store before anything touches
//! the network. `drain` replays a user's items oldest first and removes each
//! one only after the remote store accepted it. The first failure halts the
//! drain so later writes never overtake an earlier one.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::error::{Error, Result};
use crate::models::{Mutation, MutationKind, QueueItem};
use crate::remote::{RemoteResult, RemoteStore};
use crate::store::{LocalStore, Namespace, StorageError};
use crate::sync::Connectivity;
use crate::util::unix_millis_now;

/// Millisecond clock used to stamp `queued_at`.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Outcome of a drain attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    /// Items accepted by the remote store and removed locally
    pub replayed: usize,
    /// Items still queued for the user
    pub remaining: usize,
    /// Drain did nothing because the device was offline
    pub skipped_offline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted: Option<DrainHalt>,
}

impl DrainReport {
    pub const fn is_complete(&self) -> bool {
        !self.skipped_offline && self.halted.is_none()
    }
}

/// The item a drain stopped at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainHalt {
    pub item_id: String,
    pub error: String,
    /// Retrying this item unchanged can never succeed
    pub permanent: bool,
}

/// Durable per-user queue of pending mutations.
#[derive(Clone)]
pub struct OfflineQueue<L> {
    store: L,
    clock: Clock,
    last_queued_at: Arc<AtomicI64>,
}

impl<L: LocalStore> OfflineQueue<L> {
    pub fn new(store: L) -> Self {
        Self::with_clock(store, Arc::new(unix_millis_now))
    }

    pub fn with_clock(store: L, clock: Clock) -> Self {
        Self {
            store,
            clock,
            last_queued_at: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Strictly increasing enqueue timestamp for this queue instance.
    fn next_queued_at(&self) -> i64 {
        let now = (self.clock)();
        let mut last = self.last_queued_at.load(Ordering::SeqCst);
        loop {
            let next = now.max(last + 1);
            match self.last_queued_at.compare_exchange(
                last,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }

    /// Validate and persist a mutation; returns the stored item.
    pub async fn enqueue(&self, uid: &str, mutation: Mutation) -> Result<QueueItem> {
        require_uid(uid)?;
        mutation.validate()?;

        let item = QueueItem::new(uid, mutation, self.next_queued_at());
        let payload = serde_json::to_string(&item)?;
        self.store.set(Namespace::Queue, &item.id, &payload).await?;

        tracing::debug!(
            "Queued {} {}/{} for {uid} as {}",
            item.mutation.kind,
            item.mutation.collection,
            item.mutation.target_id,
            item.id
        );
        Ok(item)
    }

    /// A user's pending items in replay order.
    ///
    /// Rows that fail to decode are reported with their key unless they
    /// visibly belong to another user.
    pub async fn pending(&self, uid: &str) -> Result<Vec<QueueItem>> {
        let mut items = Vec::new();
        for (key, raw) in self.store.list_entries(Namespace::Queue).await? {
            match serde_json::from_str::<QueueItem>(&raw) {
                Ok(item) if item.uid == uid => items.push(item),
                Ok(_) => {}
                Err(source) => {
                    if owner_of(&raw).is_some_and(|owner| owner != uid) {
                        tracing::warn!("Skipping undecodable queue entry {key} of another user");
                        continue;
                    }
                    return Err(Error::Storage(StorageError::Corrupt { key, source }));
                }
            }
        }
        items.sort_by(|a, b| {
            a.queued_at
                .cmp(&b.queued_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(items)
    }

    pub async fn size_for(&self, uid: &str) -> Result<usize> {
        Ok(self.pending(uid).await?.len())
    }

    /// Pending items across every user.
    pub async fn total_size(&self) -> Result<usize> {
        Ok(self.store.list_entries(Namespace::Queue).await?.len())
    }

    /// Replay a user's items against `remote`, oldest first.
    ///
    /// No-op while `connectivity` reports offline. Stops at the first
    /// remote failure and leaves that item and everything after it queued.
    pub async fn drain<R, C>(&self, uid: &str, remote: &R, connectivity: &C) -> Result<DrainReport>
    where
        R: RemoteStore,
        C: Connectivity + ?Sized,
    {
        require_uid(uid)?;

        let items = self.pending(uid).await?;
        if !connectivity.is_online() {
            tracing::debug!("Offline; leaving {} queued items for {uid}", items.len());
            return Ok(DrainReport {
                remaining: items.len(),
                skipped_offline: true,
                ..DrainReport::default()
            });
        }

        let total = items.len();
        let mut report = DrainReport::default();
        for item in items {
            if let Err(error) = replay(remote, &item).await {
                tracing::warn!(
                    "Queue drain for {uid} halted at {} ({} {}/{}): {error}",
                    item.id,
                    item.mutation.kind,
                    item.mutation.collection,
                    item.mutation.target_id
                );
                report.halted = Some(DrainHalt {
                    item_id: item.id,
                    error: error.to_string(),
                    permanent: error.is_permanent(),
                });
                break;
            }

            self.store.delete(Namespace::Queue, &item.id).await?;
            report.replayed += 1;
        }
        report.remaining = total - report.replayed;

        if report.replayed > 0 {
            tracing::info!(
                "Replayed {} queued mutations for {uid} ({} remaining)",
                report.replayed,
                report.remaining
            );
        }
        Ok(report)
    }
}

/// The `uid` field of a stored item, read without decoding the rest.
fn owner_of(raw: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct Owner {
        uid: String,
    }
    serde_json::from_str::<Owner>(raw).ok().map(|owner| owner.uid)
}

async fn replay<R: RemoteStore>(remote: &R, item: &QueueItem) -> RemoteResult<()> {
    let mutation = &item.mutation;
    let empty = Map::new();
    let data = mutation.data.as_ref().unwrap_or(&empty);

    match mutation.kind {
        MutationKind::Set => {
            remote
                .write_document(&item.uid, mutation.collection, &mutation.target_id, data, true)
                .await
        }
        MutationKind::Update => {
            remote
                .update_document(&item.uid, mutation.collection, &mutation.target_id, data)
                .await
        }
        MutationKind::Delete => {
            remote
                .delete_document(&item.uid, mutation.collection, &mutation.target_id)
                .await
        }
    }
}

pub(crate) fn require_uid(uid: &str) -> Result<()> {
    if uid.trim().is_empty() {
        return Err(Error::validation("user id must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Collection;
    use crate::remote::{MemoryRemoteStore, RemoteCall};
    use crate::store::LocalDatabase;
    use crate::sync::ConnectivityFlag;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    async fn queue_with_clock(times: Vec<i64>) -> OfflineQueue<LocalDatabase> {
        let store = LocalDatabase::open_in_memory().await.unwrap();
        let times = std::sync::Mutex::new(times.into_iter());
        OfflineQueue::with_clock(
            store,
            Arc::new(move || times.lock().unwrap().next().unwrap_or(0)),
        )
    }

    /// Persist an item with an exact `queued_at`, as a previous session would.
    async fn stage(queue: &OfflineQueue<LocalDatabase>, uid: &str, id: &str, queued_at: i64) {
        let item = QueueItem::new(
            uid,
            Mutation::set(Collection::Accounts, id, fields(json!({"name": id}))),
            queued_at,
        );
        queue
            .store
            .set(
                Namespace::Queue,
                &item.id,
                &serde_json::to_string(&item).unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_persists_before_returning() {
        let queue = queue_with_clock(vec![1_000]).await;
        let item = queue
            .enqueue(
                "u1",
                Mutation::set(Collection::Accounts, "acc1", fields(json!({"name": "Cash"}))),
            )
            .await
            .unwrap();

        assert_eq!(item.queued_at, 1_000);
        assert!(item.id.ends_with(":1000"));
        let stored = queue
            .store
            .get(Namespace::Queue, &item.id)
            .await
            .unwrap()
            .unwrap();
        let decoded: QueueItem = serde_json::from_str(&stored).unwrap();
        assert_eq!(decoded, item);
        assert_eq!(queue.size_for("u1").await.unwrap(), 1);
        assert_eq!(queue.size_for("u2").await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn corrupt_entry_is_reported_with_its_key() {
        let queue = queue_with_clock(vec![]).await;
        stage(&queue, "u1", "acc1", 1).await;
        queue
            .store
            .set(Namespace::Queue, "bad:2", "not json")
            .await
            .unwrap();

        let error = queue.pending("u1").await.unwrap_err();
        assert!(matches!(
            error,
            Error::Storage(StorageError::Corrupt { ref key, .. }) if key == "bad:2"
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn other_users_broken_entry_does_not_block_drain() {
        let queue = queue_with_clock(vec![]).await;
        stage(&queue, "u1", "acc1", 1).await;
        queue
            .store
            .set(
                Namespace::Queue,
                "u2-item:2",
                r#"{"uid":"u2","type":"explode","queuedAt":2}"#,
            )
            .await
            .unwrap();

        let remote = MemoryRemoteStore::new();
        let report = queue.drain("u1", &remote, &true).await.unwrap();

        assert_eq!(report.replayed, 1);
        assert_eq!(queue.size_for("u1").await.unwrap(), 0);
        assert_eq!(queue.total_size().await.unwrap(), 1);
        assert!(queue.pending("u2").await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn queued_at_is_strictly_increasing() {
        let queue = queue_with_clock(vec![500, 500, 400]).await;
        let mut stamps = Vec::new();
        for id in ["a", "b", "c"] {
            let item = queue
                .enqueue("u1", Mutation::delete(Collection::Accounts, id))
                .await
                .unwrap();
            stamps.push(item.queued_at);
        }
        assert_eq!(stamps, vec![500, 501, 502]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_rejects_invalid_mutations() {
        let queue = queue_with_clock(vec![]).await;

        let missing_uid = queue
            .enqueue(" ", Mutation::delete(Collection::Accounts, "a"))
            .await;
        assert!(matches!(missing_uid, Err(Error::Validation(_))));

        let empty_update = queue
            .enqueue("u1", Mutation::update(Collection::Accounts, "a", Map::new()))
            .await;
        assert!(matches!(empty_update, Err(Error::Validation(_))));
        assert_eq!(queue.total_size().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drain_replays_in_queued_at_order() {
        let queue = queue_with_clock(vec![]).await;
        stage(&queue, "u1", "first", 1).await;
        stage(&queue, "u1", "third", 3).await;
        stage(&queue, "u1", "second", 2).await;

        let remote = MemoryRemoteStore::new();
        let report = queue
            .drain("u1", &remote, &ConnectivityFlag::new(true))
            .await
            .unwrap();

        assert_eq!(report.replayed, 3);
        assert!(report.is_complete());
        let written: Vec<String> = remote
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Write { id, merge, .. } => {
                    assert!(merge);
                    Some(id)
                }
                _ => None,
            })
            .collect();
        assert_eq!(written, vec!["first", "second", "third"]);
        assert_eq!(queue.size_for("u1").await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drain_stops_at_first_failure() {
        let queue = queue_with_clock(vec![]).await;
        stage(&queue, "u1", "one", 1).await;
        stage(&queue, "u1", "two", 2).await;
        stage(&queue, "u1", "three", 3).await;

        let remote = MemoryRemoteStore::new();
        remote.fail_writes_to(Collection::Accounts, "two");

        let report = queue
            .drain("u1", &remote, &ConnectivityFlag::new(true))
            .await
            .unwrap();

        assert_eq!(report.replayed, 1);
        assert_eq!(report.remaining, 2);
        let halt = report.halted.unwrap();
        assert!(!halt.permanent);

        let left: Vec<String> = queue
            .pending("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.mutation.target_id)
            .collect();
        assert_eq!(left, vec!["two", "three"]);
        assert_eq!(halt.item_id, queue.pending("u1").await.unwrap()[0].id);
        assert!(remote.document("u1", Collection::Accounts, "three").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drain_offline_is_a_no_op() {
        let queue = queue_with_clock(vec![10]).await;
        queue
            .enqueue("u1", Mutation::delete(Collection::JournalLines, "l1"))
            .await
            .unwrap();

        let remote = MemoryRemoteStore::new();
        let report = queue
            .drain("u1", &remote, &ConnectivityFlag::new(false))
            .await
            .unwrap();

        assert!(report.skipped_offline);
        assert_eq!(report.remaining, 1);
        assert!(remote.calls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drain_only_touches_the_given_user() {
        let queue = queue_with_clock(vec![]).await;
        stage(&queue, "u1", "mine", 1).await;
        stage(&queue, "u2", "theirs", 2).await;

        let remote = MemoryRemoteStore::new();
        queue
            .drain("u1", &remote, &ConnectivityFlag::new(true))
            .await
            .unwrap();

        assert_eq!(queue.size_for("u1").await.unwrap(), 0);
        assert_eq!(queue.size_for("u2").await.unwrap(), 1);
        assert_eq!(queue.total_size().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drain_dispatches_by_mutation_kind() {
        let queue = queue_with_clock(vec![1, 2, 3]).await;
        let remote = MemoryRemoteStore::new();
        remote.insert_document("u1", Collection::JournalHeaders, "h1", fields(json!({"memo": "a"})));

        queue
            .enqueue(
                "u1",
                Mutation::update(Collection::JournalHeaders, "h1", fields(json!({"memo": "b"}))),
            )
            .await
            .unwrap();
        queue
            .enqueue("u1", Mutation::delete(Collection::JournalHeaders, "h1"))
            .await
            .unwrap();

        let report = queue
            .drain("u1", &remote, &ConnectivityFlag::new(true))
            .await
            .unwrap();

        assert_eq!(report.replayed, 2);
        assert_eq!(
            remote.calls(),
            vec![
                RemoteCall::Update {
                    uid: "u1".to_string(),
                    collection: Collection::JournalHeaders,
                    id: "h1".to_string(),
                },
                RemoteCall::Delete {
                    uid: "u1".to_string(),
                    collection: Collection::JournalHeaders,
                    id: "h1".to_string(),
                },
            ]
        );
        assert!(remote.document("u1", Collection::JournalHeaders, "h1").is_none());
    }
}
