//! Record model shared by every persisted kind.
//!
//! # Responsibility
//! - Define the common record header (identity and timestamps).
//! - Define the concrete kinds and the name-to-constructor registry.
//!
//! # Invariants
//! - Every record is identified by an id that is never reused.
//! - The kind tag is a persistence concern only and never a record field.

pub mod kinds;
pub mod record;
pub mod registry;
pub mod timestamp;
