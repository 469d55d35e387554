//! In-process remote store for tests and offline demos

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use super::{RemoteError, RemoteResult, RemoteStore};
use crate::models::{compare_order_values, Collection, Record};

/// A call observed by [`MemoryRemoteStore`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Read {
        uid: String,
        collection: Collection,
    },
    Write {
        uid: String,
        collection: Collection,
        id: String,
        merge: bool,
    },
    Update {
        uid: String,
        collection: Collection,
        id: String,
    },
    Delete {
        uid: String,
        collection: Collection,
        id: String,
    },
}

type DocumentKey = (String, Collection, String);

#[derive(Debug, Default)]
struct State {
    documents: BTreeMap<DocumentKey, Map<String, Value>>,
    calls: Vec<RemoteCall>,
    failing_writes: HashSet<(Collection, String)>,
    failing_reads: HashSet<Collection>,
    unreachable: bool,
}

/// Remote store keeping documents in memory.
///
/// Clones share state, so a test can keep a handle while the coordinator
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemoteStore {
    state: Arc<Mutex<State>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a document without recording a call.
    pub fn insert_document(
        &self,
        uid: &str,
        collection: Collection,
        id: &str,
        data: Map<String, Value>,
    ) {
        self.lock()
            .documents
            .insert((uid.to_string(), collection, id.to_string()), data);
    }

    pub fn document(&self, uid: &str, collection: Collection, id: &str) -> Option<Map<String, Value>> {
        self.lock()
            .documents
            .get(&(uid.to_string(), collection, id.to_string()))
            .cloned()
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Reject every write or delete of this document with a server error.
    pub fn fail_writes_to(&self, collection: Collection, id: &str) {
        self.lock().failing_writes.insert((collection, id.to_string()));
    }

    pub fn fail_reads_of(&self, collection: Collection) {
        self.lock().failing_reads.insert(collection);
    }

    /// Make every call fail as if the network were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing_writes.clear();
        state.failing_reads.clear();
        state.unreachable = false;
    }

    fn check_write(state: &State, collection: Collection, id: &str) -> RemoteResult<()> {
        if state.unreachable {
            return Err(unreachable());
        }
        if state.failing_writes.contains(&(collection, id.to_string())) {
            return Err(RemoteError::Api {
                status: 503,
                code: Some("UNAVAILABLE".to_string()),
                message: format!("write to {collection}/{id} failed"),
            });
        }
        Ok(())
    }
}

fn unreachable() -> RemoteError {
    RemoteError::Unavailable("remote store unreachable".to_string())
}

impl RemoteStore for MemoryRemoteStore {
    async fn read_collection(
        &self,
        uid: &str,
        collection: Collection,
        order_field: &str,
    ) -> RemoteResult<Vec<Record>> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Read {
            uid: uid.to_string(),
            collection,
        });
        if state.unreachable {
            return Err(unreachable());
        }
        if state.failing_reads.contains(&collection) {
            return Err(RemoteError::Api {
                status: 500,
                code: Some("INTERNAL".to_string()),
                message: format!("read of {collection} failed"),
            });
        }

        let mut records: Vec<Record> = state
            .documents
            .iter()
            .filter(|((owner, kind, _), _)| owner == uid && *kind == collection)
            .map(|((_, _, id), data)| Record::new(id.clone(), data.clone()))
            .collect();
        records.sort_by(|a, b| compare_order_values(a.field(order_field), b.field(order_field)));
        Ok(records)
    }

    async fn write_document(
        &self,
        uid: &str,
        collection: Collection,
        id: &str,
        data: &Map<String, Value>,
        merge: bool,
    ) -> RemoteResult<()> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Write {
            uid: uid.to_string(),
            collection,
            id: id.to_string(),
            merge,
        });
        Self::check_write(&state, collection, id)?;

        let document = state
            .documents
            .entry((uid.to_string(), collection, id.to_string()))
            .or_default();
        if !merge {
            document.clear();
        }
        document.extend(data.iter().map(|(key, value)| (key.clone(), value.clone())));
        Ok(())
    }

    async fn update_document(
        &self,
        uid: &str,
        collection: Collection,
        id: &str,
        data: &Map<String, Value>,
    ) -> RemoteResult<()> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Update {
            uid: uid.to_string(),
            collection,
            id: id.to_string(),
        });
        Self::check_write(&state, collection, id)?;

        let Some(document) = state
            .documents
            .get_mut(&(uid.to_string(), collection, id.to_string()))
        else {
            return Err(RemoteError::Api {
                status: 404,
                code: Some("NOT_FOUND".to_string()),
                message: format!("No document to update: {collection}/{id}"),
            });
        };
        document.extend(data.iter().map(|(key, value)| (key.clone(), value.clone())));
        Ok(())
    }

    async fn delete_document(
        &self,
        uid: &str,
        collection: Collection,
        id: &str,
    ) -> RemoteResult<()> {
        let mut state = self.lock();
        state.calls.push(RemoteCall::Delete {
            uid: uid.to_string(),
            collection,
            id: id.to_string(),
        });
        Self::check_write(&state, collection, id)?;

        state
            .documents
            .remove(&(uid.to_string(), collection, id.to_string()));
        Ok(())
    }
}
