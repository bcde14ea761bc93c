//! Domain model for sequenced office ledgers.
//!
//! # Responsibility
//! - Define canonical record, entity and reset-window types.
//! - Hold the static per-entity numbering and field-retention tables.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId`.
//! - Deletion is represented by soft-delete tombstones, not hard delete.

pub mod entity;
pub mod fields;
pub mod record;
pub mod window;
