//! Authoritative entity storage.
//!
//! The table keeps entities keyed by their string identity, in insertion
//! order, each with a monotonic version. It never emits events; the store's
//! mutation API owns that.

mod entity_table;

pub use entity_table::{EntityTable, TableEntry};
