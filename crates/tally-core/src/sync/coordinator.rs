use std::time::Duration;

use serde::Serialize;

use super::Connectivity;
use crate::error::{Error, Result};
use crate::models::{Collection, FallbackReason, LoadResult, Mutation, QueueItem, Snapshot};
use crate::queue::{require_uid, DrainReport, OfflineQueue};
use crate::remote::{RemoteResult, RemoteStore, TimedRemote};
use crate::store::{cache_key, LocalStore, Namespace, StorageError};

const SNAPSHOT_KEY: &str = "snapshot";

/// Result of [`SyncCoordinator::submit`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub item: QueueItem,
    pub drain: DrainReport,
}

/// Decides between cloud and cache on every load and owns the write queue.
///
/// Connectivity is probed fresh on each call; there is no persisted
/// online/offline mode.
pub struct SyncCoordinator<L, R, C> {
    store: L,
    remote: TimedRemote<R>,
    connectivity: C,
    queue: OfflineQueue<L>,
}

impl<L, R, C> SyncCoordinator<L, R, C>
where
    L: LocalStore,
    R: RemoteStore,
    C: Connectivity,
{
    /// Every remote call made through the coordinator is bounded by `timeout`.
    pub fn new(store: L, remote: R, connectivity: C, timeout: Duration) -> Self {
        Self {
            queue: OfflineQueue::new(store.clone()),
            store,
            remote: TimedRemote::new(remote, timeout),
            connectivity,
        }
    }

    /// Replace the queue (custom clock).
    #[must_use]
    pub fn with_queue(mut self, queue: OfflineQueue<L>) -> Self {
        self.queue = queue;
        self
    }

    pub const fn queue(&self) -> &OfflineQueue<L> {
        &self.queue
    }

    pub const fn remote(&self) -> &R {
        self.remote.inner()
    }

    pub const fn connectivity(&self) -> &C {
        &self.connectivity
    }

    /// Load every collection for `uid`, from the cloud when possible.
    ///
    /// A successful cloud load replaces the cached snapshot. Offline or on
    /// any remote failure the cached snapshot is returned instead (empty if
    /// nothing was ever cached), tagged with the reason.
    pub async fn load_all(&self, uid: &str) -> Result<LoadResult> {
        require_uid(uid)?;

        if !self.connectivity.is_online() {
            return self.fallback(uid, FallbackReason::Offline).await;
        }

        match self.read_cloud(uid).await {
            Ok(snapshot) => {
                if let Err(error) = self.persist_snapshot(uid, &snapshot).await {
                    tracing::warn!("Failed to cache snapshot for {uid}: {error}");
                }
                tracing::info!("Loaded {} records for {uid} from cloud", snapshot.len());
                Ok(LoadResult::cloud(snapshot))
            }
            Err(error) => {
                self.fallback(uid, FallbackReason::RemoteFailure(error.to_string()))
                    .await
            }
        }
    }

    async fn read_cloud(&self, uid: &str) -> RemoteResult<Snapshot> {
        let read = |collection: Collection| {
            self.remote
                .read_collection(uid, collection, collection.order_field())
        };
        let (accounts, journal_headers, journal_lines) = tokio::try_join!(
            read(Collection::Accounts),
            read(Collection::JournalHeaders),
            read(Collection::JournalLines),
        )?;
        Ok(Snapshot::from_collections(
            accounts,
            journal_headers,
            journal_lines,
        ))
    }

    async fn persist_snapshot(&self, uid: &str, snapshot: &Snapshot) -> Result<()> {
        let payload = serde_json::to_string(snapshot)?;
        self.store
            .set(Namespace::Kv, &cache_key(uid, SNAPSHOT_KEY), &payload)
            .await?;
        Ok(())
    }

    async fn fallback(&self, uid: &str, reason: FallbackReason) -> Result<LoadResult> {
        let cached = self.cached_snapshot(uid).await?;
        tracing::warn!(
            "Serving {} snapshot for {uid} ({reason})",
            if cached.is_some() { "cached" } else { "empty" }
        );
        Ok(LoadResult::cache(cached.unwrap_or_default(), reason))
    }

    /// Last snapshot persisted by a cloud load, if any.
    pub async fn cached_snapshot(&self, uid: &str) -> Result<Option<Snapshot>> {
        require_uid(uid)?;
        let key = cache_key(uid, SNAPSHOT_KEY);
        let Some(raw) = self.store.get(Namespace::Kv, &key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| Error::Storage(StorageError::Corrupt { key, source }))
    }

    /// Enqueue a mutation, then drain the user's queue if online.
    pub async fn submit(&self, uid: &str, mutation: Mutation) -> Result<SubmitOutcome> {
        let item = self.queue.enqueue(uid, mutation).await?;
        let drain = self.flush(uid).await?;
        Ok(SubmitOutcome { item, drain })
    }

    /// Replay the user's pending mutations.
    pub async fn flush(&self, uid: &str) -> Result<DrainReport> {
        self.queue
            .drain(uid, &self.remote, &self.connectivity)
            .await
    }

    pub async fn queue_size(&self, uid: &str) -> Result<usize> {
        self.queue.size_for(uid).await
    }
}
