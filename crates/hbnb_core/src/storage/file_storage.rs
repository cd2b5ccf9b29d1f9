//! JSON file object store.
//!
//! # Responsibility
//! - Own the in-memory registry of live records.
//! - Serialize the full registry into one JSON object and write it to disk.
//! - Rehydrate persisted entries through the kind registry.
//!
//! # Invariants
//! - `save` replaces the backing file in full; it never appends or merges.
//! - `save` writes a sibling temp file first and renames it over the target.
//! - `reload` merges into the current registry and does not clear it.
//! - A missing backing file is not an error; an unparsable one is logged and
//!   leaves the registry untouched.

use crate::model::record::{composite_key, Record, RecordError, RecordKind};
use crate::model::registry::KindRegistry;
use log::{debug, error, info, warn};
use serde_json::{Map, Value};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

/// Backing file used when no path is configured, relative to the working directory.
pub const DEFAULT_FILE_PATH: &str = "file.json";

/// Live registry: composite key to record.
pub type Objects = BTreeMap<String, Box<dyn Record>>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from store persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing file (or its temp sibling) could not be read or written.
    #[error("I/O error on `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode store document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Result of a [`FileStorage::reload`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// No backing file yet; the registry is unchanged.
    MissingFile,
    /// The backing file is not a JSON object; the registry is unchanged.
    Malformed { reason: String },
    /// Entries were merged into the registry.
    Loaded { loaded: usize, skipped: usize },
}

/// Object store backed by a JSON file.
#[derive(Debug)]
pub struct FileStorage {
    file_path: PathBuf,
    objects: Objects,
    kinds: KindRegistry,
}

impl FileStorage {
    /// Creates an empty store for `file_path` with the builtin kinds.
    ///
    /// Nothing is read until [`FileStorage::reload`] is called.
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self::with_registry(file_path, KindRegistry::builtin())
    }

    pub fn with_registry(file_path: impl Into<PathBuf>, kinds: KindRegistry) -> Self {
        Self {
            file_path: file_path.into(),
            objects: Objects::new(),
            kinds,
        }
    }

    pub fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }

    /// The live registry. No copy is made.
    pub fn all(&self) -> &Objects {
        &self.objects
    }

    /// Mutable access to the live registry.
    ///
    /// Entries removed here are only dropped from disk by a later `save`.
    pub fn all_mut(&mut self) -> &mut Objects {
        &mut self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Registers `record` under `"<Kind>.<id>"`, replacing any entry with the same key.
    pub fn insert(&mut self, record: Box<dyn Record>) {
        let key = record.key();
        debug!("event=record_insert module=storage status=ok key={key}");
        self.objects.insert(key, record);
    }

    /// Constructs a fresh record of `kind` and registers it.
    ///
    /// The record is visible through [`FileStorage::all`] immediately but is
    /// not on disk until the next save.
    pub fn create(&mut self, kind: &str) -> StoreResult<&mut dyn Record> {
        let record = self.kinds.construct(kind)?;
        let key = record.key();
        info!("event=record_create module=storage status=ok key={key}");

        let slot = match self.objects.entry(key) {
            Entry::Vacant(vacant) => vacant.insert(record),
            Entry::Occupied(occupied) => {
                let slot = occupied.into_mut();
                *slot = record;
                slot
            }
        };
        Ok(&mut **slot)
    }

    pub fn get(&self, kind: &str, id: &str) -> Option<&dyn Record> {
        self.objects
            .get(&composite_key(kind, id))
            .map(|record| &**record)
    }

    pub fn get_mut(&mut self, kind: &str, id: &str) -> Option<&mut dyn Record> {
        // `&mut dyn` lifetimes only shorten at a coercion site, not inside `map`.
        match self.objects.get_mut(&composite_key(kind, id)) {
            Some(record) => Some(&mut **record),
            None => None,
        }
    }

    /// Typed lookup by id.
    pub fn get_as<T: RecordKind>(&self, id: &str) -> Option<&T> {
        self.objects
            .get(&composite_key(T::KIND, id))
            .and_then(|record| record.as_any().downcast_ref::<T>())
    }

    pub fn get_as_mut<T: RecordKind>(&mut self, id: &str) -> Option<&mut T> {
        self.objects
            .get_mut(&composite_key(T::KIND, id))
            .and_then(|record| record.as_any_mut().downcast_mut::<T>())
    }

    /// Writes the whole registry to the backing file.
    ///
    /// # Errors
    /// - `StoreError::Io` when the temp file cannot be written or renamed.
    /// - `StoreError::Record` / `StoreError::Serialization` when a record
    ///   cannot be encoded; the backing file is left untouched.
    pub fn save(&self) -> StoreResult<()> {
        let started_at = Instant::now();

        let mut document = Map::new();
        for (key, record) in &self.objects {
            document.insert(key.clone(), Value::Object(record.to_mapping()?));
        }
        let payload = serde_json::to_vec(&Value::Object(document))?;

        match write_replacing(&self.file_path, &payload) {
            Ok(()) => {
                info!(
                    "event=store_save module=storage status=ok objects={} bytes={} duration_ms={}",
                    self.objects.len(),
                    payload.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=store_save module=storage status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Record-level save: refreshes `updated_at` of one record, then saves
    /// the whole registry.
    ///
    /// Returns `Ok(false)` without writing when the record is not registered.
    pub fn save_object(&mut self, kind: &str, id: &str) -> StoreResult<bool> {
        let key = composite_key(kind, id);
        match self.objects.get_mut(&key) {
            Some(record) => record.touch(),
            None => {
                warn!("event=record_save module=storage status=not_found key={key}");
                return Ok(false);
            }
        }
        self.save()?;
        Ok(true)
    }

    /// Merges the backing file into the registry.
    ///
    /// Each top-level entry is rehydrated through the kind registry using its
    /// `__class__` tag and inserted under the key it was persisted with.
    /// Entries that cannot be rehydrated are skipped and counted.
    ///
    /// # Errors
    /// - `StoreError::Io` when the file exists but cannot be read.
    pub fn reload(&mut self) -> StoreResult<ReloadOutcome> {
        let started_at = Instant::now();

        let raw = match fs::read(&self.file_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(
                    "event=store_reload module=storage status=missing path={}",
                    self.file_path.display()
                );
                return Ok(ReloadOutcome::MissingFile);
            }
            Err(source) => {
                error!(
                    "event=store_reload module=storage status=error path={} error={}",
                    self.file_path.display(),
                    source
                );
                return Err(StoreError::Io {
                    path: self.file_path.clone(),
                    source,
                });
            }
        };

        let document = match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Object(document)) => document,
            Ok(other) => {
                return Ok(self.malformed(format!(
                    "top-level value must be an object, got {}",
                    json_type_name(&other)
                )));
            }
            Err(err) => return Ok(self.malformed(err.to_string())),
        };

        let mut loaded = 0;
        let mut skipped = 0;
        for (key, value) in document {
            let mut fields = match value {
                Value::Object(fields) => fields,
                other => {
                    warn!(
                        "event=store_reload_entry module=storage status=skipped key={key} reason=not_an_object type={}",
                        json_type_name(&other)
                    );
                    skipped += 1;
                    continue;
                }
            };
            if !fields.contains_key("id") {
                if let Some((_, id)) = key.split_once('.') {
                    fields.insert("id".to_string(), Value::String(id.to_string()));
                }
            }
            match self.kinds.rehydrate(fields) {
                Ok(record) if record.key() != key => {
                    warn!(
                        "event=store_reload_entry module=storage status=skipped key={key} reason=key_mismatch record_key={}",
                        record.key()
                    );
                    skipped += 1;
                }
                Ok(record) => {
                    self.objects.insert(key, record);
                    loaded += 1;
                }
                Err(err) => {
                    warn!(
                        "event=store_reload_entry module=storage status=skipped key={key} error={err}"
                    );
                    skipped += 1;
                }
            }
        }

        info!(
            "event=store_reload module=storage status=ok loaded={loaded} skipped={skipped} objects={} duration_ms={}",
            self.objects.len(),
            started_at.elapsed().as_millis()
        );
        Ok(ReloadOutcome::Loaded { loaded, skipped })
    }

    /// Removes one record and persists the registry.
    ///
    /// Returns `Ok(false)` without writing when no such record is registered.
    pub fn delete(&mut self, kind: &str, id: &str) -> StoreResult<bool> {
        let key = composite_key(kind, id);
        if self.objects.remove(&key).is_none() {
            warn!("event=record_delete module=storage status=not_found key={key}");
            return Ok(false);
        }
        self.save()?;
        info!("event=record_delete module=storage status=ok key={key}");
        Ok(true)
    }

    fn malformed(&self, reason: String) -> ReloadOutcome {
        warn!(
            "event=store_reload module=storage status=malformed path={} reason={}",
            self.file_path.display(),
            reason
        );
        ReloadOutcome::Malformed { reason }
    }
}

/// Replaces `path` with `payload` through a temp file in the same directory.
fn write_replacing(path: &Path, payload: &[u8]) -> StoreResult<()> {
    let temp_path = temp_sibling(path);

    if let Err(source) = fs::write(&temp_path, payload) {
        let _ = fs::remove_file(&temp_path);
        return Err(StoreError::Io {
            path: temp_path,
            source,
        });
    }

    fs::rename(&temp_path, path).map_err(|source| {
        let _ = fs::remove_file(&temp_path);
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
