//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for sequenced records.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes sanitize and call `Record::validate()` before
//!   persistence.
//! - Repository APIs return semantic errors (`NotFound`, `WindowChanged`,
//!   `SequenceConflict`) in addition to DB transport errors.

pub mod record_repo;
