//! Sync coordination between the local cache, the offline queue and the
//! remote document store.

mod connectivity;
mod coordinator;

pub use connectivity::{Connectivity, ConnectivityFlag};
pub use coordinator::{SubmitOutcome, SyncCoordinator};
