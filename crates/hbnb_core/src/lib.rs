//! Core domain logic for the hbnb record shell.
//! This crate owns the record model and its JSON file persistence.

pub mod logging;
pub mod model;
pub mod storage;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::kinds::{City, Place, State, User};
pub use model::record::{
    composite_key, Record, RecordError, RecordHeader, RecordKind, RecordResult, KIND_TAG_FIELD,
};
pub use model::registry::{builtin_kinds, KindEntry, KindRegistry};
pub use storage::file_storage::{
    FileStorage, Objects, ReloadOutcome, StoreError, StoreResult, DEFAULT_FILE_PATH,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
