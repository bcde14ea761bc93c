//! Sequenced ledger types and their static numbering configuration.
//!
//! # Responsibility
//! - Enumerate every ledger that receives period-scoped sequence numbers.
//! - Hold per-ledger numbering policy as plain data, one row per ledger.
//!
//! # Invariants
//! - Window policy, base value and deleted-row handling are fixed per
//!   entity type, never per record.
//! - `base_sequence >= 1`.

use super::fields::{FieldRules, BILL_RULES, BMDS_RULES, GIC_RULES, MF_RULES, RTO_RULES};
use super::window::WindowPolicy;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Ledger kind owning a sequence-number series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Life insurance policy register.
    LicPolicy,
    /// General insurance policy register.
    GicPolicy,
    /// Transport office work register.
    RtoWork,
    /// Driving school enrolment register.
    BmdsEntry,
    /// Mutual fund investment register.
    MfInvestment,
    /// Office bills.
    Bill,
}

/// Numbering policy for one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityConfig {
    pub entity: EntityType,
    pub window_policy: WindowPolicy,
    /// First number handed out in an empty window.
    pub base_sequence: i64,
    /// Whether soft-deleted rows count toward the window maximum.
    ///
    /// Ledgers that count them never reissue a deleted record's number.
    pub include_deleted_in_max: bool,
    /// Discriminator-driven field retention, if the ledger has one.
    pub field_rules: Option<&'static FieldRules>,
}

const ENTITY_CONFIGS: &[EntityConfig] = &[
    EntityConfig {
        entity: EntityType::LicPolicy,
        window_policy: WindowPolicy::FinancialYear,
        base_sequence: 1,
        include_deleted_in_max: false,
        field_rules: None,
    },
    EntityConfig {
        entity: EntityType::GicPolicy,
        window_policy: WindowPolicy::FinancialYear,
        base_sequence: 1,
        include_deleted_in_max: false,
        field_rules: Some(&GIC_RULES),
    },
    EntityConfig {
        entity: EntityType::RtoWork,
        window_policy: WindowPolicy::Monthly,
        base_sequence: 1,
        include_deleted_in_max: true,
        field_rules: Some(&RTO_RULES),
    },
    EntityConfig {
        entity: EntityType::BmdsEntry,
        window_policy: WindowPolicy::Monthly,
        base_sequence: 1,
        include_deleted_in_max: true,
        field_rules: Some(&BMDS_RULES),
    },
    EntityConfig {
        entity: EntityType::MfInvestment,
        window_policy: WindowPolicy::CalendarYear,
        base_sequence: 1,
        include_deleted_in_max: true,
        field_rules: Some(&MF_RULES),
    },
    EntityConfig {
        entity: EntityType::Bill,
        window_policy: WindowPolicy::FinancialYear,
        base_sequence: 1001,
        include_deleted_in_max: false,
        field_rules: Some(&BILL_RULES),
    },
];

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        Self::LicPolicy,
        Self::GicPolicy,
        Self::RtoWork,
        Self::BmdsEntry,
        Self::MfInvestment,
        Self::Bill,
    ];

    /// Stable string id used in the `records.entity_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LicPolicy => "lic",
            Self::GicPolicy => "gic",
            Self::RtoWork => "rto",
            Self::BmdsEntry => "bmds",
            Self::MfInvestment => "mf",
            Self::Bill => "bill",
        }
    }

    /// Parses a stored or user-provided entity id.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|entity| entity.as_str() == normalized)
    }

    /// Returns the static numbering configuration of this entity type.
    pub fn config(self) -> &'static EntityConfig {
        // ENTITY_CONFIGS is declared in `ALL` order.
        &ENTITY_CONFIGS[self as usize]
    }
}

impl Display for EntityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the full configuration table.
pub fn entity_configs() -> &'static [EntityConfig] {
    ENTITY_CONFIGS
}
