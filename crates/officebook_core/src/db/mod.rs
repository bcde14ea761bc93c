//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the record store.
//! - Apply schema migrations in deterministic order.
//! - Own the textual date encoding shared by every query.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write records before migrations succeed.
//! - Dates are stored as ISO `YYYY-MM-DD` text so range filters compare
//!   lexicographically.

use chrono::NaiveDate;
use thiserror::Error;

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

/// Encodes a date for the `records.occurred_on` column.
pub fn date_to_db(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Decodes a stored `occurred_on` value.
pub fn date_from_db(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::{date_from_db, date_to_db};
    use chrono::NaiveDate;

    #[test]
    fn date_encoding_is_zero_padded_iso() {
        let date = NaiveDate::from_ymd_opt(2025, 4, 5).unwrap();
        assert_eq!(date_to_db(date), "2025-04-05");
        assert_eq!(date_from_db("2025-04-05"), Some(date));
        assert_eq!(date_from_db("05/04/2025"), None);
    }
}
