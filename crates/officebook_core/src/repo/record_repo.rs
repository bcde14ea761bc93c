//! Record repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/update/get/list/delete/restore APIs over `records`.
//! - Run sequence allocation and the record write in one transaction.
//!
//! # Invariants
//! - Write paths sanitize then validate before SQL mutations.
//! - Numbering writes hold an IMMEDIATE transaction from the window read to
//!   the row write.
//! - A stored sequence number only changes through `restore_record`.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::db::{date_from_db, date_to_db, DbError};
use crate::model::entity::EntityType;
use crate::model::fields::sanitize;
use crate::model::record::{Record, RecordId, RecordValidationError};
use crate::model::window::{ResetWindow, WindowError};
use crate::sequence::{AllocateError, SequenceAllocator, SqliteSequenceStore};
use chrono::NaiveDate;
use log::{info, warn};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior,
};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

const RECORD_SELECT_SQL: &str = "SELECT
    uuid,
    entity_type,
    sequence_number,
    occurred_on,
    window_key,
    category,
    fields,
    deleted_at
FROM records";

const REQUIRED_COLUMNS: &[&str] = &[
    "uuid",
    "entity_type",
    "sequence_number",
    "occurred_on",
    "window_key",
    "category",
    "fields",
    "created_at",
    "updated_at",
    "deleted_at",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for record persistence and numbering.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] RecordValidationError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error("record not found: {0}")]
    NotFound(RecordId),
    #[error("invalid persisted record data: {0}")]
    InvalidData(String),
    #[error("record {0} already carries a sequence number; numbers are assigned on create")]
    SequenceAlreadyAssigned(RecordId),
    #[error("sequence number of record {id} is immutable: stored {stored}, requested {requested}")]
    SequenceImmutable {
        id: RecordId,
        stored: i64,
        requested: i64,
    },
    #[error("entity type of record {id} is immutable: stored {stored}, requested {requested}")]
    EntityImmutable {
        id: RecordId,
        stored: EntityType,
        requested: EntityType,
    },
    #[error("record {id} cannot move from window {from} to {to}")]
    WindowChanged {
        id: RecordId,
        from: String,
        to: String,
    },
    #[error("{entity} sequence {sequence_number} is already active in window {window_key}")]
    SequenceConflict {
        entity: EntityType,
        window_key: String,
        sequence_number: i64,
    },
    #[error("{entity} window {window_key} has no sequence number left")]
    SequenceExhausted {
        entity: EntityType,
        window_key: String,
    },
    #[error("connection schema version {actual_version} is older than required {expected_version}")]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    #[error("required table `{0}` is missing")]
    MissingRequiredTable(&'static str),
    #[error("required column `{table}.{column}` is missing")]
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<AllocateError<rusqlite::Error>> for RepoError {
    fn from(value: AllocateError<rusqlite::Error>) -> Self {
        match value {
            AllocateError::Window(err) => Self::Window(err),
            AllocateError::Store(err) => err.into(),
            AllocateError::Exhausted {
                entity, window_key, ..
            } => Self::SequenceExhausted { entity, window_key },
        }
    }
}

/// Query options for listing records.
#[derive(Debug, Clone, Default)]
pub struct RecordListQuery {
    pub entity: Option<EntityType>,
    /// Exact window key, e.g. `FY2024-25`.
    pub window_key: Option<String>,
    pub include_deleted: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for sequenced records.
pub trait RecordRepository {
    /// Sanitizes, numbers and inserts a new record; returns the stored shape.
    fn create_record(&mut self, record: &Record) -> RepoResult<Record>;
    /// Replaces category, fields and date of an active record.
    fn update_record(&mut self, record: &Record) -> RepoResult<Record>;
    fn get_record(&self, id: RecordId, include_deleted: bool) -> RepoResult<Option<Record>>;
    fn list_records(&self, query: &RecordListQuery) -> RepoResult<Vec<Record>>;
    /// Tombstones a record. Repeated calls keep the first timestamp.
    fn soft_delete_record(&self, id: RecordId) -> RepoResult<()>;
    /// Clears the tombstone, reassigning the number if it was taken meanwhile.
    fn restore_record(&mut self, id: RecordId) -> RepoResult<Record>;
    /// Number the next create would receive; writes nothing.
    fn peek_next_sequence(&self, entity: EntityType, occurred_on: NaiveDate) -> RepoResult<i64>;
}

/// SQLite-backed record repository.
pub struct SqliteRecordRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteRecordRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations are not fully applied.
    /// - `MissingRequiredTable`/`MissingRequiredColumn` for a foreign schema.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn create_record(&mut self, record: &Record) -> RepoResult<Record> {
        let started_at = Instant::now();
        let config = record.entity.config();
        let mut record = sanitize(config, record);
        if record.sequence_number.is_some() {
            return Err(RepoError::SequenceAlreadyAssigned(record.uuid));
        }
        record.validate()?;
        let window = ResetWindow::containing(record.occurred_on, config.window_policy)?;
        let fields_json = encode_fields(&record.fields)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let store = SqliteSequenceStore::new(&tx);
        let number = SequenceAllocator::new(&store).allocate(config, record.occurred_on)?;

        tx.execute(
            "INSERT INTO records (
                uuid,
                entity_type,
                sequence_number,
                occurred_on,
                window_key,
                category,
                fields
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                record.uuid.to_string(),
                record.entity.as_str(),
                number,
                date_to_db(record.occurred_on),
                window.key.as_str(),
                record.category.as_deref(),
                fields_json,
            ],
        )
        .map_err(|err| conflict_or_db(err, record.entity, &window.key, number))?;
        tx.commit()?;

        record.sequence_number = Some(number);
        record.deleted_at = None;
        info!(
            "event=record_create module=repo status=ok entity={} window={} sequence={} duration_ms={}",
            record.entity,
            window.key,
            number,
            started_at.elapsed().as_millis()
        );
        Ok(record)
    }

    fn update_record(&mut self, record: &Record) -> RepoResult<Record> {
        let config = record.entity.config();
        let mut record = sanitize(config, record);
        record.validate()?;
        let window = ResetWindow::containing(record.occurred_on, config.window_policy)?;
        let fields_json = encode_fields(&record.fields)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let stored =
            load_record(&tx, record.uuid, false)?.ok_or(RepoError::NotFound(record.uuid))?;
        let stored_number = stored_sequence(&stored)?;

        if stored.entity != record.entity {
            return Err(RepoError::EntityImmutable {
                id: record.uuid,
                stored: stored.entity,
                requested: record.entity,
            });
        }
        if let Some(requested) = record.sequence_number {
            if requested != stored_number {
                return Err(RepoError::SequenceImmutable {
                    id: record.uuid,
                    stored: stored_number,
                    requested,
                });
            }
        }
        let stored_window = ResetWindow::containing(stored.occurred_on, config.window_policy)?;
        if stored_window.key != window.key {
            return Err(RepoError::WindowChanged {
                id: record.uuid,
                from: stored_window.key,
                to: window.key,
            });
        }

        tx.execute(
            "UPDATE records
             SET
                occurred_on = ?2,
                category = ?3,
                fields = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND deleted_at IS NULL;",
            params![
                record.uuid.to_string(),
                date_to_db(record.occurred_on),
                record.category.as_deref(),
                fields_json,
            ],
        )?;
        tx.commit()?;

        record.sequence_number = Some(stored_number);
        record.deleted_at = None;
        info!(
            "event=record_update module=repo status=ok entity={} window={} sequence={}",
            record.entity, window.key, stored_number
        );
        Ok(record)
    }

    fn get_record(&self, id: RecordId, include_deleted: bool) -> RepoResult<Option<Record>> {
        load_record(self.conn, id, include_deleted)
    }

    fn list_records(&self, query: &RecordListQuery) -> RepoResult<Vec<Record>> {
        let mut sql = format!("{RECORD_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.include_deleted {
            sql.push_str(" AND deleted_at IS NULL");
        }

        if let Some(entity) = query.entity {
            sql.push_str(" AND entity_type = ?");
            bind_values.push(Value::Text(entity.as_str().to_string()));
        }

        if let Some(window_key) = query.window_key.as_ref() {
            sql.push_str(" AND window_key = ?");
            bind_values.push(Value::Text(window_key.clone()));
        }

        sql.push_str(" ORDER BY entity_type ASC, window_key ASC, sequence_number ASC, uuid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }

        Ok(records)
    }

    fn soft_delete_record(&self, id: RecordId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE records
             SET
                deleted_at = COALESCE(deleted_at, strftime('%s', 'now') * 1000),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        info!("event=record_delete module=repo status=ok record={id}");
        Ok(())
    }

    fn restore_record(&mut self, id: RecordId) -> RepoResult<Record> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut record = load_record(&tx, id, true)?.ok_or(RepoError::NotFound(id))?;
        if record.is_active() {
            return Ok(record);
        }

        let config = record.entity.config();
        let previous = stored_sequence(&record)?;
        let store = SqliteSequenceStore::new(&tx);
        let number = SequenceAllocator::new(&store).resolve_on_restore(config, &record)?;
        let window = ResetWindow::containing(record.occurred_on, config.window_policy)?;

        tx.execute(
            "UPDATE records
             SET
                sequence_number = ?2,
                deleted_at = NULL,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), number],
        )
        .map_err(|err| conflict_or_db(err, record.entity, &window.key, number))?;
        tx.commit()?;

        if number != previous {
            warn!(
                "event=record_restore module=repo status=reassigned entity={} window={} record={id} previous={previous} sequence={number}",
                record.entity, window.key
            );
        } else {
            info!(
                "event=record_restore module=repo status=ok entity={} window={} record={id} sequence={number}",
                record.entity, window.key
            );
        }

        record.restore();
        record.sequence_number = Some(number);
        Ok(record)
    }

    fn peek_next_sequence(&self, entity: EntityType, occurred_on: NaiveDate) -> RepoResult<i64> {
        let store = SqliteSequenceStore::new(self.conn);
        let number = SequenceAllocator::new(&store).allocate(entity.config(), occurred_on)?;
        Ok(number)
    }
}

fn load_record(
    conn: &Connection,
    id: RecordId,
    include_deleted: bool,
) -> RepoResult<Option<Record>> {
    let mut stmt = conn.prepare(&format!(
        "{RECORD_SELECT_SQL}
         WHERE uuid = ?1
           AND (?2 = 1 OR deleted_at IS NULL);"
    ))?;

    let parsed = stmt
        .query_row(
            params![id.to_string(), i64::from(include_deleted)],
            |row| Ok(parse_record_row(row)),
        )
        .optional()?;
    parsed.transpose()
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<Record> {
    let uuid_text: String = row.get("uuid")?;
    let uuid = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in records.uuid"))
    })?;

    let entity_text: String = row.get("entity_type")?;
    let entity = EntityType::parse(&entity_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid entity type `{entity_text}` in records.entity_type"
        ))
    })?;

    let date_text: String = row.get("occurred_on")?;
    let occurred_on = date_from_db(&date_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid date `{date_text}` in records.occurred_on"))
    })?;

    let fields_text: String = row.get("fields")?;
    let fields: BTreeMap<String, JsonValue> =
        serde_json::from_str(&fields_text).map_err(|err| {
            RepoError::InvalidData(format!("invalid json in records.fields for {uuid}: {err}"))
        })?;

    let record = Record {
        uuid,
        entity,
        sequence_number: Some(row.get("sequence_number")?),
        occurred_on,
        category: row.get("category")?,
        fields,
        deleted_at: row.get("deleted_at")?,
    };

    let window_key: String = row.get("window_key")?;
    let expected = ResetWindow::containing(occurred_on, entity.config().window_policy)?;
    if expected.key != window_key {
        return Err(RepoError::InvalidData(format!(
            "window key `{window_key}` does not match occurred_on {date_text} for {uuid}"
        )));
    }

    record.validate()?;
    Ok(record)
}

fn stored_sequence(record: &Record) -> RepoResult<i64> {
    record.sequence_number.ok_or_else(|| {
        RepoError::InvalidData(format!("stored record {} has no sequence number", record.uuid))
    })
}

fn encode_fields(fields: &BTreeMap<String, JsonValue>) -> RepoResult<String> {
    serde_json::to_string(fields)
        .map_err(|err| RepoError::InvalidData(format!("fields are not serializable: {err}")))
}

fn conflict_or_db(
    err: rusqlite::Error,
    entity: EntityType,
    window_key: &str,
    sequence_number: i64,
) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            warn!(
                "event=sequence_conflict module=repo status=error entity={entity} window={window_key} sequence={sequence_number}"
            );
            RepoError::SequenceConflict {
                entity,
                window_key: window_key.to_string(),
                sequence_number,
            }
        }
        _ => err.into(),
    }
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version < expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "records")? {
        return Err(RepoError::MissingRequiredTable("records"));
    }

    for &column in REQUIRED_COLUMNS {
        if !table_has_column(conn, "records", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "records",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
