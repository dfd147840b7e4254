//! Core types for the record mirror.

use crate::error::{MirrorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

/// Unique identifier of a remote record.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        RecordId(id.into())
    }

    /// Generate a fresh client-side id (see [`crate::id::new_record_id`]).
    pub fn generate() -> Self {
        RecordId(crate::id::new_record_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId(s)
    }
}

/// A single remote record: an id plus arbitrary JSON fields.
///
/// Serializes flat, with `id` next to the other fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Create an empty record with the given id.
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Parse a record from a JSON object with a string `id`.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(mut obj) => {
                let id = match obj.remove("id") {
                    Some(Value::String(id)) => RecordId(id),
                    Some(other) => {
                        return Err(MirrorError::InvalidRecord(format!(
                            "id must be a string, got {}",
                            other
                        )))
                    }
                    None => return Err(MirrorError::InvalidRecord("missing id".to_string())),
                };
                Ok(Self { id, fields: obj })
            }
            other => Err(MirrorError::InvalidRecord(format!(
                "expected object, got {}",
                other
            ))),
        }
    }

    /// Convert into a flat JSON object.
    pub fn to_value(&self) -> Value {
        let mut obj = self.fields.clone();
        obj.insert("id".to_string(), Value::String(self.id.0.clone()));
        Value::Object(obj)
    }
}

/// Records keyed by id. Used for both the mirror and the reconciled view.
pub type RecordMap = HashMap<RecordId, Record>;

/// Partial update for one record. A `null` value deletes the field.
pub type RecordUpdate = Map<String, Value>;

/// Updates keyed by record id. `None` deletes the whole record.
pub type RecordsDiff = BTreeMap<RecordId, Option<RecordUpdate>>;

/// Subscription scope.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every record in the collection.
    Collection,
    /// A single record.
    Record(RecordId),
}

impl Topic {
    /// Whether a record belongs to this topic.
    pub fn contains(&self, id: &RecordId) -> bool {
        match self {
            Topic::Collection => true,
            Topic::Record(topic_id) => topic_id == id,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Collection => write!(f, "*"),
            Topic::Record(id) => write!(f, "{}", id),
        }
    }
}

/// Request parameters passed through untouched to the [`crate::RecordClient`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    /// Relations to expand.
    pub expand: Option<String>,

    /// Backend filter expression.
    pub filter: Option<String>,

    pub sort: Option<String>,

    /// Restrict returned fields.
    pub fields: Option<String>,

    /// Extra query parameters.
    pub query: BTreeMap<String, Value>,

    pub headers: BTreeMap<String, String>,

    /// Key used by the client to cancel duplicate in-flight requests.
    pub request_key: Option<String>,

    /// Request timeout enforced by the client, if any.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Options that only expand the given relations.
    pub fn expand(relations: impl Into<String>) -> Self {
        Self {
            expand: Some(relations.into()),
            ..Default::default()
        }
    }
}
