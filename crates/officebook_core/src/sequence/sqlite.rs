//! SQLite implementation of the allocator's storage contract.
//!
//! # Invariants
//! - Window membership is decided by `occurred_on` range, inclusive.
//! - `sequence_taken` only considers active (non-tombstoned) rows.

use super::allocator::SequenceStore;
use crate::db::date_to_db;
use crate::model::entity::EntityType;
use crate::model::record::RecordId;
use crate::model::window::ResetWindow;
use rusqlite::{params, Connection};

/// Sequence queries over the `records` table.
///
/// Accepts a plain connection or an open transaction (via deref).
pub struct SqliteSequenceStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSequenceStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SequenceStore for SqliteSequenceStore<'_> {
    type Error = rusqlite::Error;

    fn max_sequence(
        &self,
        entity: EntityType,
        window: &ResetWindow,
        include_deleted: bool,
    ) -> Result<Option<i64>, rusqlite::Error> {
        self.conn.query_row(
            "SELECT MAX(sequence_number)
             FROM records
             WHERE entity_type = ?1
               AND occurred_on BETWEEN ?2 AND ?3
               AND (?4 = 1 OR deleted_at IS NULL);",
            params![
                entity.as_str(),
                date_to_db(window.start),
                date_to_db(window.end),
                i64::from(include_deleted),
            ],
            |row| row.get::<_, Option<i64>>(0),
        )
    }

    fn sequence_taken(
        &self,
        entity: EntityType,
        window: &ResetWindow,
        number: i64,
        excluding: RecordId,
    ) -> Result<bool, rusqlite::Error> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM records
                WHERE entity_type = ?1
                  AND occurred_on BETWEEN ?2 AND ?3
                  AND sequence_number = ?4
                  AND deleted_at IS NULL
                  AND uuid <> ?5
            );",
            params![
                entity.as_str(),
                date_to_db(window.start),
                date_to_db(window.end),
                number,
                excluding.to_string(),
            ],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}
