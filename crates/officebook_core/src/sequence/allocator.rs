//! Period-scoped sequence number allocation.
//!
//! # Responsibility
//! - Hand out the next number of an entity's reset window.
//! - Re-validate a restored record's number against active records.
//!
//! # Invariants
//! - Allocation is a pure read; callers persist the number in the same
//!   transaction as the record write.
//! - An empty window yields the entity's `base_sequence`.
//! - A restore never keeps a number another active record holds.

use crate::model::entity::{EntityConfig, EntityType};
use crate::model::record::{Record, RecordId};
use crate::model::window::{ResetWindow, WindowError};
use chrono::NaiveDate;
use log::{debug, info};
use thiserror::Error;

/// Storage capability required by the allocator.
pub trait SequenceStore {
    type Error;

    /// Highest number among `entity` records dated inside `window`.
    ///
    /// Soft-deleted rows are considered only when `include_deleted` is set.
    fn max_sequence(
        &self,
        entity: EntityType,
        window: &ResetWindow,
        include_deleted: bool,
    ) -> Result<Option<i64>, Self::Error>;

    /// Whether an active record other than `excluding` holds `number` in
    /// `window`.
    fn sequence_taken(
        &self,
        entity: EntityType,
        window: &ResetWindow,
        number: i64,
        excluding: RecordId,
    ) -> Result<bool, Self::Error>;
}

#[derive(Debug, Error)]
pub enum AllocateError<E> {
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error("sequence store failure: {0}")]
    Store(E),
    #[error("{entity} window {window_key} has no number left after {max}")]
    Exhausted {
        entity: EntityType,
        window_key: String,
        max: i64,
    },
}

/// Allocator bound to one store (connection or open transaction).
pub struct SequenceAllocator<'s, S: SequenceStore> {
    store: &'s S,
}

impl<'s, S: SequenceStore> SequenceAllocator<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Returns the next free number for a record of `config.entity` dated
    /// `occurred_on`.
    ///
    /// # Errors
    /// - `AllocateError::Window` when `occurred_on` has no representable window.
    /// - `AllocateError::Store` for storage failures, unchanged.
    /// - `AllocateError::Exhausted` when the window maximum is `i64::MAX`.
    pub fn allocate(
        &self,
        config: &EntityConfig,
        occurred_on: NaiveDate,
    ) -> Result<i64, AllocateError<S::Error>> {
        let window = ResetWindow::containing(occurred_on, config.window_policy)?;
        let max = self
            .store
            .max_sequence(config.entity, &window, config.include_deleted_in_max)
            .map_err(AllocateError::Store)?;
        let next = match max {
            None => config.base_sequence,
            Some(current) => current.checked_add(1).ok_or_else(|| AllocateError::Exhausted {
                entity: config.entity,
                window_key: window.key.clone(),
                max: current,
            })?,
        };

        debug!(
            "event=sequence_allocate module=sequence status=ok entity={} window={} previous_max={} next={}",
            config.entity,
            window.key,
            max.map_or_else(|| "none".to_string(), |value| value.to_string()),
            next
        );
        Ok(next)
    }

    /// Returns the number `record` should carry once restored.
    ///
    /// Keeps the current number when no other active record holds it in the
    /// same window; otherwise allocates a fresh one.
    pub fn resolve_on_restore(
        &self,
        config: &EntityConfig,
        record: &Record,
    ) -> Result<i64, AllocateError<S::Error>> {
        let Some(current) = record.sequence_number else {
            return self.allocate(config, record.occurred_on);
        };

        let window = ResetWindow::containing(record.occurred_on, config.window_policy)?;
        let taken = self
            .store
            .sequence_taken(config.entity, &window, current, record.uuid)
            .map_err(AllocateError::Store)?;
        if !taken {
            return Ok(current);
        }

        let reassigned = self.allocate(config, record.occurred_on)?;
        info!(
            "event=sequence_reassign module=sequence status=ok entity={} window={} record={} previous={} reassigned={}",
            config.entity, window.key, record.uuid, current, reassigned
        );
        Ok(reassigned)
    }
}
