//! Record persistence.
//!
//! # Responsibility
//! - Hold the live registry of records keyed by `"<Kind>.<id>"`.
//! - Flush the registry to, and merge it back from, a single JSON file.
//!
//! # Invariants
//! - Memory and disk agree right after a successful `save`.
//! - Reload never clears entries that are only present in memory.

pub mod file_storage;
