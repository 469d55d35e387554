//! Pending mutation model for the offline write queue

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::record::Collection;
use crate::error::{Error, Result};

/// Kind of remote write a queued mutation replays as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    /// Full write, merged into any existing document
    Set,
    /// Partial write to an existing document
    Update,
    /// Document removal
    Delete,
}

impl MutationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "set" => Ok(Self::Set),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown mutation type '{other}'")),
        }
    }
}

/// A write against one document of a user's collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    #[serde(rename = "type")]
    pub kind: MutationKind,
    pub collection: Collection,
    /// Target document id
    #[serde(rename = "id2")]
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

impl Mutation {
    pub fn set(collection: Collection, target_id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            kind: MutationKind::Set,
            collection,
            target_id: target_id.into(),
            data: Some(data),
        }
    }

    pub fn update(
        collection: Collection,
        target_id: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            kind: MutationKind::Update,
            collection,
            target_id: target_id.into(),
            data: Some(data),
        }
    }

    pub fn delete(collection: Collection, target_id: impl Into<String>) -> Self {
        Self {
            kind: MutationKind::Delete,
            collection,
            target_id: target_id.into(),
            data: None,
        }
    }

    /// Check the payload matches the mutation kind.
    pub fn validate(&self) -> Result<()> {
        if self.target_id.trim().is_empty() {
            return Err(Error::validation("target document id must not be empty"));
        }
        if self.target_id.contains('/') {
            return Err(Error::validation("target document id must not contain '/'"));
        }
        match (self.kind, &self.data) {
            (MutationKind::Set | MutationKind::Update, None) => Err(Error::validation(format!(
                "{} mutation requires a data payload",
                self.kind
            ))),
            (MutationKind::Update, Some(data)) if data.is_empty() => Err(Error::validation(
                "update mutation requires at least one field",
            )),
            (MutationKind::Delete, Some(_)) => Err(Error::validation(
                "delete mutation must not carry a data payload",
            )),
            _ => Ok(()),
        }
    }
}

/// A durable pending mutation owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    /// `<uuid v7>:<queued_at>`
    pub id: String,
    pub uid: String,
    #[serde(flatten)]
    pub mutation: Mutation,
    /// Enqueue time (Unix ms)
    pub queued_at: i64,
}

impl QueueItem {
    pub(crate) fn new(uid: &str, mutation: Mutation, queued_at: i64) -> Self {
        Self {
            id: format!("{}:{queued_at}", Uuid::now_v7()),
            uid: uid.to_string(),
            mutation,
            queued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn queue_item_serializes_flat_layout() {
        let item = QueueItem {
            id: "token:1".to_string(),
            uid: "u1".to_string(),
            mutation: Mutation::set(Collection::Accounts, "acc1", fields(json!({"name": "Cash"}))),
            queued_at: 1,
        };
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "id": "token:1",
                "uid": "u1",
                "type": "set",
                "collection": "accounts",
                "id2": "acc1",
                "data": {"name": "Cash"},
                "queuedAt": 1
            })
        );

        let parsed: QueueItem = serde_json::from_value(serde_json::to_value(&item).unwrap()).unwrap();
        assert_eq!(parsed, item);
    }

    #[test]
    fn new_item_id_ends_with_timestamp() {
        let item = QueueItem::new("u1", Mutation::delete(Collection::JournalLines, "l1"), 42);
        assert!(item.id.ends_with(":42"));
        assert_eq!(item.queued_at, 42);
    }

    #[test]
    fn validate_checks_payload_against_kind() {
        assert!(Mutation::delete(Collection::Accounts, "a").validate().is_ok());
        assert!(Mutation::delete(Collection::Accounts, " ").validate().is_err());
        assert!(Mutation::delete(Collection::Accounts, "a/b").validate().is_err());
        assert!(Mutation::update(Collection::Accounts, "a", Map::new())
            .validate()
            .is_err());

        let mut missing = Mutation::set(Collection::Accounts, "a", Map::new());
        missing.data = None;
        assert!(missing.validate().is_err());
    }

    #[test]
    fn mutation_kind_parses_case_insensitively() {
        assert_eq!("SET".parse::<MutationKind>().unwrap(), MutationKind::Set);
        assert!("upsert".parse::<MutationKind>().is_err());
    }
}
