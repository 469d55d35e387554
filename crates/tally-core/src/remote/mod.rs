//! Remote document store: per-user collections in a hosted database.
//!
//! Layout is `users/{uid}/{collection}/{id}`. Implementations translate
//! collection reads and single-document writes into network calls; they do
//! no caching of their own.

mod firestore;
mod memory;
mod value;

pub use firestore::FirestoreClient;
pub use memory::{MemoryRemoteStore, RemoteCall};

use std::future::Future;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{Collection, Record};

/// Errors raised by the remote document store
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport-level failure (DNS, TLS, connection reset, body decode)
    #[error("Remote request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Call did not complete within the configured bound
    #[error("Remote request timed out after {0:?}")]
    Timeout(Duration),

    /// Store answered with a non-success status
    #[error("Remote store rejected request: {message} ({status})")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Store is unreachable
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    /// Response body did not have the expected shape
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),

    /// Client is misconfigured (missing project id, bad URL)
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
}

impl RemoteError {
    /// Whether retrying the same request can never succeed.
    ///
    /// Rejected writes (bad argument, missing document, permission, failed
    /// precondition) are permanent. Transport failures, timeouts, expired
    /// credentials, contention, throttling and server errors are transient.
    pub const fn is_permanent(&self) -> bool {
        match self {
            Self::Api { status, .. } => matches!(*status, 400 | 403 | 404 | 412),
            Self::InvalidPayload(_) | Self::InvalidConfiguration(_) => true,
            Self::Http(_) | Self::Timeout(_) | Self::Unavailable(_) => false,
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Authenticated per-user collection access.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Read every document of a user's collection, ascending by `order_field`
    async fn read_collection(
        &self,
        uid: &str,
        collection: Collection,
        order_field: &str,
    ) -> RemoteResult<Vec<Record>>;

    /// Write a full document; with `merge` only the given fields are replaced
    async fn write_document(
        &self,
        uid: &str,
        collection: Collection,
        id: &str,
        data: &Map<String, Value>,
        merge: bool,
    ) -> RemoteResult<()>;

    /// Patch fields of an existing document; fails if it does not exist
    async fn update_document(
        &self,
        uid: &str,
        collection: Collection,
        id: &str,
        data: &Map<String, Value>,
    ) -> RemoteResult<()>;

    /// Remove a document entirely
    async fn delete_document(&self, uid: &str, collection: Collection, id: &str)
        -> RemoteResult<()>;
}

/// Wraps a remote store so every call fails with [`RemoteError::Timeout`]
/// once `timeout` elapses.
#[derive(Debug, Clone)]
pub struct TimedRemote<R> {
    inner: R,
    timeout: Duration,
}

impl<R> TimedRemote<R> {
    pub const fn new(inner: R, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub const fn inner(&self) -> &R {
        &self.inner
    }

    async fn bounded<T>(&self, call: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| RemoteError::Timeout(self.timeout))?
    }
}

impl<R: RemoteStore> RemoteStore for TimedRemote<R> {
    async fn read_collection(
        &self,
        uid: &str,
        collection: Collection,
        order_field: &str,
    ) -> RemoteResult<Vec<Record>> {
        self.bounded(self.inner.read_collection(uid, collection, order_field))
            .await
    }

    async fn write_document(
        &self,
        uid: &str,
        collection: Collection,
        id: &str,
        data: &Map<String, Value>,
        merge: bool,
    ) -> RemoteResult<()> {
        self.bounded(self.inner.write_document(uid, collection, id, data, merge))
            .await
    }

    async fn update_document(
        &self,
        uid: &str,
        collection: Collection,
        id: &str,
        data: &Map<String, Value>,
    ) -> RemoteResult<()> {
        self.bounded(self.inner.update_document(uid, collection, id, data))
            .await
    }

    async fn delete_document(
        &self,
        uid: &str,
        collection: Collection,
        id: &str,
    ) -> RemoteResult<()> {
        self.bounded(self.inner.delete_document(uid, collection, id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StalledRemote;

    impl RemoteStore for StalledRemote {
        async fn read_collection(
            &self,
            _uid: &str,
            _collection: Collection,
            _order_field: &str,
        ) -> RemoteResult<Vec<Record>> {
            std::future::pending().await
        }

        async fn write_document(
            &self,
            _uid: &str,
            _collection: Collection,
            _id: &str,
            _data: &Map<String, Value>,
            _merge: bool,
        ) -> RemoteResult<()> {
            std::future::pending().await
        }

        async fn update_document(
            &self,
            _uid: &str,
            _collection: Collection,
            _id: &str,
            _data: &Map<String, Value>,
        ) -> RemoteResult<()> {
            std::future::pending().await
        }

        async fn delete_document(
            &self,
            _uid: &str,
            _collection: Collection,
            _id: &str,
        ) -> RemoteResult<()> {
            std::future::pending().await
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn timed_remote_turns_stalls_into_timeouts() {
        let remote = TimedRemote::new(StalledRemote, Duration::from_millis(20));
        let error = remote
            .read_collection("u1", Collection::Accounts, "createdAt")
            .await
            .unwrap_err();
        assert!(matches!(error, RemoteError::Timeout(_)));
        assert!(!error.is_permanent());

        let error = remote
            .delete_document("u1", Collection::Accounts, "a")
            .await
            .unwrap_err();
        assert!(matches!(error, RemoteError::Timeout(_)));
    }

    #[test]
    fn rejected_writes_are_permanent() {
        let rejected = RemoteError::Api {
            status: 404,
            code: Some("NOT_FOUND".to_string()),
            message: "no document".to_string(),
        };
        assert!(rejected.is_permanent());

        let throttled = RemoteError::Api {
            status: 429,
            code: Some("RESOURCE_EXHAUSTED".to_string()),
            message: "slow down".to_string(),
        };
        assert!(!throttled.is_permanent());
        assert!(!RemoteError::Unavailable("offline".to_string()).is_permanent());
    }
}
