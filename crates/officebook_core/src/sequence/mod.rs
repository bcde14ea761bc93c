//! Period-scoped sequence numbering.
//!
//! # Responsibility
//! - Allocate gap-free numbers per entity and reset window.
//! - Resolve number collisions when soft-deleted records come back.
//!
//! # See also
//! - `model::window` for window boundaries.

pub mod allocator;
pub mod sqlite;

pub use allocator::{AllocateError, SequenceAllocator, SequenceStore};
pub use sqlite::SqliteSequenceStore;
