//! Static kind registry: kind name to constructors.
//!
//! # Responsibility
//! - Resolve a kind name (from the shell or a persisted `__class__` tag) to
//!   its fresh and rehydrating constructors.
//!
//! # Invariants
//! - The builtin registry is built once per process and never mutated.
//! - Unknown names are rejected with `RecordError::UnknownKind`.

use super::kinds::{City, Place, State, User};
use super::record::{tag_text, Record, RecordError, RecordKind, RecordResult, KIND_TAG_FIELD};
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

type ConstructFn = fn() -> Box<dyn Record>;
type RehydrateFn = fn(Map<String, Value>) -> RecordResult<Box<dyn Record>>;

static BUILTIN_KINDS: Lazy<KindRegistry> = Lazy::new(|| {
    let mut registry = KindRegistry::empty();
    registry.register::<User>();
    registry.register::<Place>();
    registry.register::<City>();
    registry.register::<State>();
    registry
});

/// Returns the process-wide registry of supported kinds.
pub fn builtin_kinds() -> &'static KindRegistry {
    &BUILTIN_KINDS
}

/// Constructors and schema for one registered kind.
#[derive(Clone, Copy)]
pub struct KindEntry {
    pub name: &'static str,
    pub fields: &'static [&'static str],
    construct: ConstructFn,
    rehydrate: RehydrateFn,
}

impl std::fmt::Debug for KindEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindEntry")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Mapping from kind name to constructors.
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    entries: BTreeMap<&'static str, KindEntry>,
}

impl KindRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding `User`, `Place`, `City`, and `State`.
    pub fn builtin() -> Self {
        builtin_kinds().clone()
    }

    /// Registers `T` under its kind name, replacing a previous entry.
    pub fn register<T: RecordKind>(&mut self) {
        self.entries.insert(
            T::KIND,
            KindEntry {
                name: T::KIND,
                fields: T::FIELDS,
                construct: construct_boxed::<T>,
                rehydrate: rehydrate_boxed::<T>,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn entry(&self, name: &str) -> RecordResult<&KindEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| RecordError::UnknownKind(name.to_string()))
    }

    /// Declared fields of a kind.
    pub fn fields(&self, name: &str) -> RecordResult<&'static [&'static str]> {
        Ok(self.entry(name)?.fields)
    }

    /// Builds a fresh, unregistered record of the named kind.
    pub fn construct(&self, name: &str) -> RecordResult<Box<dyn Record>> {
        Ok((self.entry(name)?.construct)())
    }

    /// Rehydrates a record from a persisted mapping, dispatching on its kind tag.
    pub fn rehydrate(&self, fields: Map<String, Value>) -> RecordResult<Box<dyn Record>> {
        let entry = match fields.get(KIND_TAG_FIELD) {
            Some(Value::String(name)) => self.entry(name)?,
            Some(other) => return Err(RecordError::UnknownKind(tag_text(other))),
            None => return Err(RecordError::MissingKindTag),
        };
        (entry.rehydrate)(fields)
    }
}

fn construct_boxed<T: RecordKind>() -> Box<dyn Record> {
    Box::new(T::fresh())
}

fn rehydrate_boxed<T: RecordKind>(fields: Map<String, Value>) -> RecordResult<Box<dyn Record>> {
    Ok(Box::new(T::from_fields(fields)?))
}
