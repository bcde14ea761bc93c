//! Reset window computation for period-scoped sequence numbers.
//!
//! # Responsibility
//! - Map a record date to the window its sequence number restarts in.
//! - Produce a stable textual key per window for storage and indexing.
//!
//! # Invariants
//! - `start <= end`, both inclusive.
//! - Every date maps to exactly one window per policy.
//! - Financial years run April 1 through March 31.
//! - Windows lie within years 0..=9999, where ISO date text sorts by date.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;
use thiserror::Error;

/// Month (1-based) on which a financial year starts.
const FINANCIAL_YEAR_START_MONTH: u32 = 4;
/// Years whose `YYYY-MM-DD` text compares in calendar order.
const SUPPORTED_YEARS: RangeInclusive<i32> = 0..=9999;

/// Reset cadence for one ledger's numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowPolicy {
    /// Numbering restarts on the first day of every calendar month.
    Monthly,
    /// Numbering restarts every January 1.
    CalendarYear,
    /// Numbering restarts every April 1.
    FinancialYear,
}

impl WindowPolicy {
    /// Stable string id used in CLI output and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::CalendarYear => "calendar_year",
            Self::FinancialYear => "financial_year",
        }
    }
}

impl Display for WindowPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("date {0} has no representable reset window")]
    OutOfRange(NaiveDate),
}

/// Closed date interval in which sequence numbers are unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResetWindow {
    pub policy: WindowPolicy,
    /// First day of the window.
    pub start: NaiveDate,
    /// Last day of the window (inclusive).
    pub end: NaiveDate,
    /// `2025-03`, `2025` or `FY2024-25` depending on policy.
    pub key: String,
}

impl ResetWindow {
    /// Returns the window of `policy` that contains `date`.
    ///
    /// # Errors
    /// - `WindowError::OutOfRange` when a boundary falls outside years
    ///   0..=9999.
    pub fn containing(date: NaiveDate, policy: WindowPolicy) -> Result<Self, WindowError> {
        let out_of_range = || WindowError::OutOfRange(date);
        let year = date.year();

        let (start, end, key) = match policy {
            WindowPolicy::Monthly => {
                let start =
                    NaiveDate::from_ymd_opt(year, date.month(), 1).ok_or_else(out_of_range)?;
                let end = last_day_of_month(year, date.month()).ok_or_else(out_of_range)?;
                (start, end, format!("{year:04}-{:02}", date.month()))
            }
            WindowPolicy::CalendarYear => {
                let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(out_of_range)?;
                let end = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(out_of_range)?;
                (start, end, format!("{year:04}"))
            }
            WindowPolicy::FinancialYear => {
                let first_year = if date.month() >= FINANCIAL_YEAR_START_MONTH {
                    year
                } else {
                    year - 1
                };
                let start = NaiveDate::from_ymd_opt(first_year, FINANCIAL_YEAR_START_MONTH, 1)
                    .ok_or_else(out_of_range)?;
                let end =
                    NaiveDate::from_ymd_opt(first_year + 1, 3, 31).ok_or_else(out_of_range)?;
                let key = format!("FY{first_year:04}-{:02}", (first_year + 1).rem_euclid(100));
                (start, end, key)
            }
        };
        if !SUPPORTED_YEARS.contains(&start.year()) || !SUPPORTED_YEARS.contains(&end.year()) {
            return Err(out_of_range());
        }

        Ok(Self {
            policy,
            start,
            end,
            key,
        })
    }

    /// Returns whether `date` falls inside this window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}
