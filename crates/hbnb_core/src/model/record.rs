//! Record header and the capability traits shared by every kind.
//!
//! # Responsibility
//! - Generate and carry record identity plus creation/update timestamps.
//! - Convert records to and from flat field mappings tagged with a kind name.
//!
//! # Invariants
//! - `id` is assigned once and never rewritten through the record API.
//! - `updated_at` equals `created_at` for a freshly constructed record.
//! - The kind tag (`__class__`) is emitted by `to_mapping` and consumed on
//!   rehydration; it never becomes a record attribute.

use super::timestamp;
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt::{self, Debug};
use uuid::Uuid;

/// Reserved mapping key naming the kind of a persisted record.
pub const KIND_TAG_FIELD: &str = "__class__";

const RESERVED_ATTRIBUTES: &[&str] = &["id", "created_at", "updated_at", KIND_TAG_FIELD];

pub type RecordResult<T> = Result<T, RecordError>;

/// Errors raised while building, mutating, or converting records.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("unknown record kind `{0}`")]
    UnknownKind(String),

    #[error("mapping has no `__class__` kind tag")]
    MissingKindTag,

    #[error("mapping is tagged `{found}` but was rehydrated as `{expected}`")]
    KindMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("`{0}` is managed by the record and cannot be assigned")]
    ReservedAttribute(String),

    #[error("invalid attribute `{name}`: {reason}")]
    InvalidAttribute { name: String, reason: String },

    #[error("{kind} record did not serialize to a field mapping")]
    NotAMapping { kind: String },

    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Identity and timestamps embedded in every record kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PersistedHeader")]
pub struct RecordHeader {
    id: String,
    #[serde(serialize_with = "timestamp::serialize")]
    created_at: NaiveDateTime,
    #[serde(serialize_with = "timestamp::serialize")]
    updated_at: NaiveDateTime,
}

/// Header as found in a persisted mapping, where every key is optional.
#[derive(Deserialize)]
struct PersistedHeader {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    created_at: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "timestamp::option::deserialize")]
    updated_at: Option<NaiveDateTime>,
}

impl From<PersistedHeader> for RecordHeader {
    fn from(value: PersistedHeader) -> Self {
        let created_at = value.created_at.unwrap_or_else(timestamp::now);
        Self {
            id: value.id.unwrap_or_else(generate_id),
            created_at,
            updated_at: value.updated_at.unwrap_or(created_at),
        }
    }
}

impl RecordHeader {
    /// Creates a header with a fresh id and `created_at == updated_at == now`.
    pub fn new() -> Self {
        let now = timestamp::now();
        Self {
            id: generate_id(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }

    /// Refreshes `updated_at` to the current time.
    pub fn touch(&mut self) {
        self.updated_at = timestamp::now();
    }
}

impl Default for RecordHeader {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Builds the registry key `"<Kind>.<id>"`.
pub fn composite_key(kind: &str, id: &str) -> String {
    format!("{kind}.{id}")
}

/// Object-safe record capability used by the store and the shell.
pub trait Record: Any + Debug {
    /// Kind name, also written as the persisted kind tag.
    fn kind(&self) -> &'static str;
    fn header(&self) -> &RecordHeader;
    fn header_mut(&mut self) -> &mut RecordHeader;

    /// All instance fields (header, declared fields, extra attributes)
    /// without the kind tag.
    fn to_fields(&self) -> RecordResult<Map<String, Value>>;

    /// Assigns one attribute by name.
    ///
    /// Declared fields only accept strings. Unknown names are kept as extra
    /// attributes. Header keys and the kind tag are rejected.
    fn set_attribute(&mut self, name: &str, value: Value) -> RecordResult<()>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn id(&self) -> &str {
        self.header().id()
    }

    fn key(&self) -> String {
        composite_key(self.kind(), self.id())
    }

    fn touch(&mut self) {
        self.header_mut().touch();
    }

    /// Plain field mapping tagged with the kind name; the persisted shape.
    fn to_mapping(&self) -> RecordResult<Map<String, Value>> {
        let mut fields = self.to_fields()?;
        fields.insert(
            KIND_TAG_FIELD.to_string(),
            Value::String(self.kind().to_string()),
        );
        Ok(fields)
    }

    /// Human-facing form: `[Kind] (id) {'field': 'value', ...}`.
    fn display_string(&self) -> RecordResult<String> {
        let fields = self.to_fields()?;
        let rendered = fields
            .iter()
            .map(|(name, value)| format!("'{name}': {}", render_value(value)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("[{}] ({}) {{{rendered}}}", self.kind(), self.id()))
    }
}

impl fmt::Display for dyn Record + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.display_string().map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

/// Static side of a record kind: its name, schema, and constructors.
pub trait RecordKind: Record + Sized + 'static {
    const KIND: &'static str;
    /// Declared string fields, excluding the header.
    const FIELDS: &'static [&'static str];

    /// Fresh record: new id, current timestamps, empty declared fields.
    fn fresh() -> Self;

    /// Rehydrates a record from a persisted mapping.
    fn from_fields(fields: Map<String, Value>) -> RecordResult<Self>;
}

/// Shared rehydration path for serde-backed kinds.
///
/// A kind tag, when present, must name `T`; it is removed before the
/// remaining keys are assigned.
pub(crate) fn rehydrate<T>(mut fields: Map<String, Value>) -> RecordResult<T>
where
    T: RecordKind + DeserializeOwned,
{
    if let Some(tag) = fields.remove(KIND_TAG_FIELD) {
        if tag.as_str() != Some(T::KIND) {
            return Err(RecordError::KindMismatch {
                expected: T::KIND,
                found: tag_text(&tag),
            });
        }
    }
    Ok(serde_json::from_value(Value::Object(fields))?)
}

pub(crate) fn fields_of<T: Serialize>(kind: &str, record: &T) -> RecordResult<Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(RecordError::NotAMapping {
            kind: kind.to_string(),
        }),
    }
}

pub(crate) fn check_assignable(name: &str) -> RecordResult<()> {
    if name.trim().is_empty() {
        return Err(RecordError::InvalidAttribute {
            name: name.to_string(),
            reason: "attribute name must not be empty".to_string(),
        });
    }
    if RESERVED_ATTRIBUTES.contains(&name) {
        return Err(RecordError::ReservedAttribute(name.to_string()));
    }
    Ok(())
}

pub(crate) fn expect_string(name: &str, value: Value) -> RecordResult<String> {
    match value {
        Value::String(text) => Ok(text),
        other => Err(RecordError::InvalidAttribute {
            name: name.to_string(),
            reason: format!("expected a string, got `{other}`"),
        }),
    }
}

pub(crate) fn tag_text(tag: &Value) -> String {
    match tag {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'")),
        other => other.to_string(),
    }
}
