//! Data models for Tally

mod queue_item;
mod record;
mod snapshot;

pub use queue_item::{Mutation, MutationKind, QueueItem};
pub(crate) use record::compare_order_values;
pub use record::{Collection, Record};
pub use snapshot::{FallbackReason, LoadResult, Snapshot, SnapshotSource};
