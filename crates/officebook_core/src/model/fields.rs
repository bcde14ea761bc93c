//! Discriminator-driven field retention for ledger records.
//!
//! # Responsibility
//! - Declare which ledger fields are meaningful for each discriminator value.
//! - Clear fields that do not apply to a record's category before persist.
//!
//! # Invariants
//! - `sanitize` is pure: same input, same output, no I/O.
//! - Cleared fields are kept as JSON `null`, never dropped.
//! - Common fields survive every category.

use super::entity::EntityConfig;
use super::record::Record;
use serde_json::Value;

/// Declarative mapping from discriminator value to retained field set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRules {
    /// Field name the category value is presented under (e.g. `policy_type`).
    pub discriminator: &'static str,
    /// Fields retained regardless of category.
    pub common: &'static [&'static str],
    /// `(category, retained fields)` pairs.
    pub variants: &'static [(&'static str, &'static [&'static str])],
}

impl FieldRules {
    /// Returns the category-specific retained fields, if `category` is known.
    pub fn allowed_fields(&self, category: &str) -> Option<&'static [&'static str]> {
        self.variants
            .iter()
            .find(|(value, _)| *value == category)
            .map(|(_, fields)| *fields)
    }

    /// Returns known category values in declaration order.
    pub fn categories(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.variants.iter().map(|(value, _)| *value)
    }

    fn retains(&self, category: &str, field: &str) -> bool {
        self.common.contains(&field)
            || self
                .allowed_fields(category)
                .is_some_and(|fields| fields.contains(&field))
    }
}

const COMMON_FIELDS: &[&str] = &["client_name", "amount", "remarks"];

pub(crate) const GIC_RULES: FieldRules = FieldRules {
    discriminator: "policy_type",
    common: COMMON_FIELDS,
    variants: &[
        ("motor", &["vehicle_number", "vehicle_class", "idv"]),
        ("health", &["sum_insured", "members_covered"]),
        ("fire", &["property_address", "sum_insured"]),
    ],
};

pub(crate) const RTO_RULES: FieldRules = FieldRules {
    discriminator: "work_type",
    common: COMMON_FIELDS,
    variants: &[
        ("transfer", &["vehicle_number", "seller_name", "buyer_name"]),
        ("renewal", &["vehicle_number", "valid_till"]),
        ("permit", &["vehicle_number", "permit_number", "route"]),
    ],
};

pub(crate) const BMDS_RULES: FieldRules = FieldRules {
    discriminator: "course",
    common: COMMON_FIELDS,
    variants: &[
        ("llr", &["llr_number", "test_date"]),
        ("dl", &["dl_number", "test_date", "vehicle_class"]),
        ("refresher", &["sessions"]),
    ],
};

pub(crate) const MF_RULES: FieldRules = FieldRules {
    discriminator: "investment_mode",
    common: COMMON_FIELDS,
    variants: &[
        ("sip", &["sip_amount", "sip_day"]),
        ("lumpsum", &["lumpsum_amount"]),
    ],
};

pub(crate) const BILL_RULES: FieldRules = FieldRules {
    discriminator: "payment_mode",
    common: COMMON_FIELDS,
    variants: &[
        ("cash", &[]),
        ("cheque", &["cheque_number", "bank_name", "cheque_date"]),
        ("online", &["transaction_id"]),
    ],
};

/// Returns `record` with every field outside its category's set nulled.
///
/// Records of entities without rules, or without a known category, are
/// returned unchanged; `Record::validate` reports the latter.
pub fn sanitize(config: &EntityConfig, record: &Record) -> Record {
    let mut sanitized = record.clone();
    let (Some(rules), Some(category)) = (config.field_rules, record.category.as_deref()) else {
        return sanitized;
    };
    if rules.allowed_fields(category).is_none() {
        return sanitized;
    }

    for (name, value) in sanitized.fields.iter_mut() {
        if !rules.retains(category, name) {
            *value = Value::Null;
        }
    }
    sanitized
}
