//! Sequenced record domain model.
//!
//! # Responsibility
//! - Define the canonical record shared by every sequenced ledger.
//! - Provide lifecycle helpers for soft-delete semantics.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another record.
//! - `sequence_number` is `None` until the first persist assigns it.
//! - `deleted_at` is the source of truth for tombstone state.
//! - Field names are lowercase snake_case identifiers.

use super::entity::EntityType;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Stable identifier for every sequenced record.
pub type RecordId = Uuid;

static FIELD_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").expect("valid field name regex"));

/// Validation failure for record shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordValidationError {
    #[error("invalid field name `{0}`; expected lowercase snake_case")]
    InvalidFieldName(String),
    #[error("{entity} records require a `{discriminator}` category")]
    MissingCategory {
        entity: EntityType,
        discriminator: &'static str,
    },
    #[error("unknown {entity} category `{category}`")]
    UnknownCategory { entity: EntityType, category: String },
    #[error("{entity} records do not take a category, got `{category}`")]
    UnexpectedCategory { entity: EntityType, category: String },
    #[error("sequence number must be positive, got {0}")]
    NonPositiveSequence(i64),
}

/// Canonical record for every sequenced ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub uuid: RecordId,
    pub entity: EntityType,
    /// Assigned by the allocator on first persist.
    pub sequence_number: Option<i64>,
    /// Decides which reset window the record is numbered in.
    pub occurred_on: NaiveDate,
    /// Discriminator value; see `FieldRules`.
    pub category: Option<String>,
    pub fields: BTreeMap<String, Value>,
    /// Soft delete tombstone, epoch milliseconds.
    pub deleted_at: Option<i64>,
}

impl Record {
    /// Creates an unnumbered record with a generated stable ID.
    pub fn new(entity: EntityType, occurred_on: NaiveDate) -> Self {
        Self::with_id(Uuid::new_v4(), entity, occurred_on)
    }

    /// Creates an unnumbered record with a caller-provided stable ID.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(uuid: RecordId, entity: EntityType, occurred_on: NaiveDate) -> Self {
        Self {
            uuid,
            entity,
            sequence_number: None,
            occurred_on,
            category: None,
            fields: BTreeMap::new(),
            deleted_at: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Marks this record as softly deleted at `now_ms`.
    pub fn soft_delete(&mut self, now_ms: i64) {
        self.deleted_at.get_or_insert(now_ms);
    }

    /// Clears the soft delete tombstone.
    pub fn restore(&mut self) {
        self.deleted_at = None;
    }

    /// Returns whether this record should be considered visible/active.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Checks field names and category against the entity's rules.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if let Some(number) = self.sequence_number {
            if number < 1 {
                return Err(RecordValidationError::NonPositiveSequence(number));
            }
        }

        if let Some(name) = self
            .fields
            .keys()
            .find(|name| !FIELD_NAME_RE.is_match(name))
        {
            return Err(RecordValidationError::InvalidFieldName(name.clone()));
        }

        match (self.entity.config().field_rules, self.category.as_deref()) {
            (Some(rules), None) => Err(RecordValidationError::MissingCategory {
                entity: self.entity,
                discriminator: rules.discriminator,
            }),
            (Some(rules), Some(category)) if rules.allowed_fields(category).is_none() => {
                Err(RecordValidationError::UnknownCategory {
                    entity: self.entity,
                    category: category.to_string(),
                })
            }
            (None, Some(category)) => Err(RecordValidationError::UnexpectedCategory {
                entity: self.entity,
                category: category.to_string(),
            }),
            _ => Ok(()),
        }
    }
}
