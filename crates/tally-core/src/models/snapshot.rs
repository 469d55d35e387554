//! Snapshot model: a user's full record set from a single source.

use serde::{Deserialize, Serialize};

use super::record::{compare_order_values, Collection, Record};

/// All of a user's records across the three collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub accounts: Vec<Record>,
    #[serde(default)]
    pub journal_headers: Vec<Record>,
    #[serde(default)]
    pub journal_lines: Vec<Record>,
}

impl Snapshot {
    /// Assemble a snapshot, re-sorting each collection by its order field.
    pub fn from_collections(
        accounts: Vec<Record>,
        journal_headers: Vec<Record>,
        journal_lines: Vec<Record>,
    ) -> Self {
        let mut snapshot = Self {
            accounts,
            journal_headers,
            journal_lines,
        };
        for collection in Collection::ALL {
            let order_field = collection.order_field();
            snapshot
                .records_mut(collection)
                .sort_by(|a, b| compare_order_values(a.field(order_field), b.field(order_field)));
        }
        snapshot
    }

    pub fn records(&self, collection: Collection) -> &[Record] {
        match collection {
            Collection::Accounts => &self.accounts,
            Collection::JournalHeaders => &self.journal_headers,
            Collection::JournalLines => &self.journal_lines,
        }
    }

    fn records_mut(&mut self, collection: Collection) -> &mut Vec<Record> {
        match collection {
            Collection::Accounts => &mut self.accounts,
            Collection::JournalHeaders => &mut self.journal_headers,
            Collection::JournalLines => &mut self.journal_lines,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.journal_headers.is_empty() && self.journal_lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.accounts.len() + self.journal_headers.len() + self.journal_lines.len()
    }
}

/// Where a returned snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Cloud,
    Cache,
}

impl SnapshotSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cloud => "cloud",
            Self::Cache => "cache",
        }
    }
}

impl std::fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a load was served from the cache instead of the cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FallbackReason {
    /// Connectivity indicator reported no network
    Offline,
    /// A remote read failed; carries the error text
    RemoteFailure(String),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offline => f.write_str("offline"),
            Self::RemoteFailure(message) => write!(f, "remote failure: {message}"),
        }
    }
}

/// Outcome of loading a user's data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResult {
    pub data: Snapshot,
    pub source: SnapshotSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackReason>,
}

impl LoadResult {
    pub const fn cloud(data: Snapshot) -> Self {
        Self {
            data,
            source: SnapshotSource::Cloud,
            fallback: None,
        }
    }

    pub const fn cache(data: Snapshot, reason: FallbackReason) -> Self {
        Self {
            data,
            source: SnapshotSource::Cache,
            fallback: Some(reason),
        }
    }
}
