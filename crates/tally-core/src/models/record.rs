//! Ledger record model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The three per-user collections held in the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Accounts,
    JournalHeaders,
    JournalLines,
}

impl Collection {
    pub const ALL: [Self; 3] = [Self::Accounts, Self::JournalHeaders, Self::JournalLines];

    /// Collection name used in document paths
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accounts => "accounts",
            Self::JournalHeaders => "journalHeaders",
            Self::JournalLines => "journalLines",
        }
    }

    /// Field the collection is sorted by (ascending) when loaded
    pub const fn order_field(self) -> &'static str {
        match self {
            Self::Accounts | Self::JournalLines => "createdAt",
            Self::JournalHeaders => "date",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "accounts" => Ok(Self::Accounts),
            "journalHeaders" | "journal-headers" => Ok(Self::JournalHeaders),
            "journalLines" | "journal-lines" => Ok(Self::JournalLines),
            other => Err(format!(
                "unknown collection '{other}' (expected accounts, journalHeaders or journalLines)"
            )),
        }
    }
}

/// A single opaque ledger entity (account, journal header or journal line).
///
/// Serialized flat: `{"id": "...", ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Build a record from a document id and its field map.
    ///
    /// An `id` entry inside `fields` is dropped; the document id wins.
    pub fn new(id: impl Into<String>, mut fields: Map<String, Value>) -> Self {
        fields.remove("id");
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Ordering used for collection sorts: numbers before strings, nulls and
/// missing values first. Ties keep their existing order.
pub(crate) fn compare_order_values(left: Option<&Value>, right: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => rank(left).cmp(&rank(right)),
    }
}
