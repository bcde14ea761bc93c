//! Record use-case service.
//!
//! # Responsibility
//! - Provide stable create/edit/list/delete/restore entry points for callers.
//! - Translate caller inputs (entity, date, category, field map) into records.
//!
//! # Invariants
//! - Service APIs never bypass repository sanitize/validate/numbering.
//! - Service layer remains storage-agnostic.

use crate::model::entity::EntityType;
use crate::model::record::{Record, RecordId};
use crate::model::window::ResetWindow;
use crate::repo::record_repo::{RecordListQuery, RecordRepository, RepoError, RepoResult};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;

/// Partial edit of an active record.
///
/// `fields` entries are merged over the stored map; `Value::Null` clears one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub occurred_on: Option<NaiveDate>,
    pub category: Option<String>,
    pub fields: BTreeMap<String, Value>,
}

/// Use-case service wrapper for sequenced records.
pub struct RecordService<R: RecordRepository> {
    repo: R,
}

impl<R: RecordRepository> RecordService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates and numbers a new record.
    ///
    /// # Contract
    /// - Fields outside the category's retained set are stored as `null`.
    /// - Returns the stored record including its sequence number.
    pub fn create_record(
        &mut self,
        entity: EntityType,
        occurred_on: NaiveDate,
        category: Option<String>,
        fields: BTreeMap<String, Value>,
    ) -> RepoResult<Record> {
        let mut record = Record::new(entity, occurred_on);
        record.category = category;
        record.fields = fields;
        self.repo.create_record(&record)
    }

    /// Persists a caller-built record (import paths with external ids).
    pub fn import_record(&mut self, record: &Record) -> RepoResult<Record> {
        self.repo.create_record(record)
    }

    /// Replaces an active record's content; see `RecordRepository::update_record`.
    pub fn update_record(&mut self, record: &Record) -> RepoResult<Record> {
        self.repo.update_record(record)
    }

    /// Applies `patch` to the active record `id`.
    pub fn edit_record(&mut self, id: RecordId, patch: RecordPatch) -> RepoResult<Record> {
        let mut record = self
            .repo
            .get_record(id, false)?
            .ok_or(RepoError::NotFound(id))?;
        if let Some(occurred_on) = patch.occurred_on {
            record.occurred_on = occurred_on;
        }
        if patch.category.is_some() {
            record.category = patch.category;
        }
        record.fields.extend(patch.fields);
        self.repo.update_record(&record)
    }

    /// Gets one record by ID with optional deleted-row visibility.
    pub fn get_record(&self, id: RecordId, include_deleted: bool) -> RepoResult<Option<Record>> {
        self.repo.get_record(id, include_deleted)
    }

    /// Lists records using filter and pagination options.
    pub fn list_records(&self, query: &RecordListQuery) -> RepoResult<Vec<Record>> {
        self.repo.list_records(query)
    }

    /// Lists the `entity` ledger page for the reset window containing `date`.
    pub fn list_window(
        &self,
        entity: EntityType,
        date: NaiveDate,
        include_deleted: bool,
    ) -> RepoResult<Vec<Record>> {
        let window = ResetWindow::containing(date, entity.config().window_policy)?;
        self.repo.list_records(&RecordListQuery {
            entity: Some(entity),
            window_key: Some(window.key),
            include_deleted,
            ..RecordListQuery::default()
        })
    }

    /// Soft-deletes a record by ID.
    pub fn soft_delete_record(&self, id: RecordId) -> RepoResult<()> {
        self.repo.soft_delete_record(id)
    }

    /// Restores a soft-deleted record, returning its final number.
    pub fn restore_record(&mut self, id: RecordId) -> RepoResult<Record> {
        self.repo.restore_record(id)
    }

    /// Previews the number a record of `entity` dated `occurred_on` would get.
    pub fn next_sequence(&self, entity: EntityType, occurred_on: NaiveDate) -> RepoResult<i64> {
        self.repo.peek_next_sequence(entity, occurred_on)
    }
}
