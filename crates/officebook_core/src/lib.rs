//! Core record-keeping logic for officebook.
//! This crate is the single source of truth for ledger numbering invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod sequence;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::{entity_configs, EntityConfig, EntityType};
pub use model::fields::{sanitize, FieldRules};
pub use model::record::{Record, RecordId, RecordValidationError};
pub use model::window::{ResetWindow, WindowError, WindowPolicy};
pub use repo::record_repo::{
    RecordListQuery, RecordRepository, RepoError, RepoResult, SqliteRecordRepository,
};
pub use sequence::{AllocateError, SequenceAllocator, SequenceStore, SqliteSequenceStore};
pub use service::record_service::{RecordPatch, RecordService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
