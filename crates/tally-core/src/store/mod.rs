//! Local persistent store: snapshot cache and offline queue staging.
//!
//! Two namespaces live side by side. `Kv` holds at most one snapshot per
//! user under `"<uid>:snapshot"`; `Queue` holds one entry per pending
//! mutation keyed by its generated id.

mod connection;
mod migrations;

pub use connection::LocalDatabase;

use thiserror::Error;

/// Errors raised by the local store
#[derive(Debug, Error)]
pub enum StorageError {
    /// libSQL error (I/O, quota, corruption)
    #[error("Local storage error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error while preparing the database location
    #[error("Local storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value could not be encoded or decoded
    #[error("Corrupt local value under '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Schema migration failed
    #[error("Local storage migration failed: {0}")]
    Migration(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Logical partition of the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Snapshot cache, keyed `"<uid>:<name>"`
    Kv,
    /// Pending mutations, keyed by queue item id
    Queue,
}

impl Namespace {
    pub(crate) const fn table(self) -> &'static str {
        match self {
            Self::Kv => "kv",
            Self::Queue => "queue",
        }
    }
}

/// Build the per-user cache key `"<uid>:<name>"`.
pub fn cache_key(uid: &str, name: &str) -> String {
    format!("{uid}:{name}")
}

/// Durable key-value and queue storage.
///
/// Values are opaque JSON text. Listing makes no ordering promise;
/// callers re-sort.
#[allow(async_fn_in_trait)]
pub trait LocalStore: Clone {
    async fn get(&self, namespace: Namespace, key: &str) -> StorageResult<Option<String>>;

    async fn set(&self, namespace: Namespace, key: &str, value: &str) -> StorageResult<()>;

    async fn delete(&self, namespace: Namespace, key: &str) -> StorageResult<()>;

    /// Every `(key, value)` pair in `namespace`.
    async fn list_entries(&self, namespace: Namespace) -> StorageResult<Vec<(String, String)>>;

    async fn list_all(&self, namespace: Namespace) -> StorageResult<Vec<String>> {
        Ok(self
            .list_entries(namespace)
            .await?
            .into_iter()
            .map(|(_, value)| value)
            .collect())
    }
}
