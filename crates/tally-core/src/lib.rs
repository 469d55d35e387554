//! tally-core - Core library for Tally
//!
//! Offline-first sync for a personal ledger: a local libSQL cache, a
//! durable write queue, a Firestore REST client and the coordinator that
//! decides between cloud and cache on every load.

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod queue;
pub mod remote;
pub mod store;
pub mod sync;
pub mod util;

#[cfg(test)]
mod tests;

pub use context::TallyContext;
pub use error::{Error, Result};
pub use models::{Collection, LoadResult, Mutation, QueueItem, Record, Snapshot, SnapshotSource};
pub use sync::{Connectivity, ConnectivityFlag, SyncCoordinator};
