//! Typed records flowing between the pipeline stages. The upstream portal
//! data is loosely shaped; everything past the stage boundaries uses these
//! fixed-field types so missing columns fail at parse time, not mid-run.

use chrono::{Datelike, NaiveDate};
use std::fmt;

/// The (year, quarter) composite used as the time axis for aggregation.
///
/// Rows whose statement date could not be parsed carry the null period
/// `(0, 0)`; they stay in the dataset and simply bucket together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    pub year: i32,
    pub quarter: u8,
}

impl Period {
    pub fn new(year: i32, quarter: u8) -> Self {
        Self { year, quarter }
    }

    pub fn null() -> Self {
        Self { year: 0, quarter: 0 }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            quarter: ((date.month0() / 3) + 1) as u8,
        }
    }

    pub fn is_null(&self) -> bool {
        self.quarter == 0
    }
}

/// One consolidated claim-expense row, produced by the consolidation stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseRecord {
    pub registry_id: String,
    pub description: String,
    pub period: Period,
    pub expense_value: f64,
}

/// One active-operator row from the registry report (cadop), keyed by the
/// ANS registry id.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub registry_id: String,
    pub legal_name: String,
    pub national_id: String,
    pub category: String,
    pub region_code: String,
}

/// An expense row after the registry left join. Unmatched rows keep `None`
/// in every enrichment field; the join never drops or duplicates a row.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub registry_id: String,
    pub description: String,
    pub period: Period,
    pub expense_value: f64,
    pub legal_name: Option<String>,
    pub national_id: Option<String>,
    pub category: Option<String>,
    pub region_code: Option<String>,
    pub verdict: ValidationVerdict,
}

/// Join accounting for one enrichment run. `matched` counts rows that
/// carry a national id after the join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchReport {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
}

/// Business rules a record can violate, in the order they are checked and
/// reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    MissingIdentifier,
    InvalidIdentifier,
    EmptyLegalName,
    NegativeValue,
}

impl Violation {
    pub fn label(&self) -> &'static str {
        match self {
            Violation::MissingIdentifier => "Missing Identifier",
            Violation::InvalidIdentifier => "Invalid Identifier",
            Violation::EmptyLegalName => "Empty Legal Name",
            Violation::NegativeValue => "Negative Value",
        }
    }
}

/// Outcome of the per-record rule check. Records start clean and are
/// downgraded by rule evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ValidationVerdict {
    #[default]
    Valid,
    Invalid(Vec<Violation>),
}

impl ValidationVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationVerdict::Valid)
    }
}

impl fmt::Display for ValidationVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationVerdict::Valid => f.write_str("Valid"),
            ValidationVerdict::Invalid(violations) => {
                f.write_str("Invalid: ")?;
                for (index, violation) in violations.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(violation.label())?;
                }
                Ok(())
            }
        }
    }
}

/// Per-operator, per-region statistics over quarterly expense sums.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedStat {
    pub legal_name: String,
    pub region_code: String,
    pub total_expense: f64,
    pub quarterly_mean: f64,
    pub quarterly_deviation: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_derives_quarter_from_month() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date");
        assert_eq!(Period::from_date(date), Period::new(2025, 1));
        let date = NaiveDate::from_ymd_opt(2025, 6, 30).expect("valid date");
        assert_eq!(Period::from_date(date), Period::new(2025, 2));
        let date = NaiveDate::from_ymd_opt(2025, 12, 31).expect("valid date");
        assert_eq!(Period::from_date(date), Period::new(2025, 4));
    }

    #[test]
    fn periods_order_by_year_then_quarter() {
        assert!(Period::new(2024, 4) < Period::new(2025, 1));
        assert!(Period::new(2025, 1) < Period::new(2025, 2));
    }

    #[test]
    fn verdict_renders_violations_in_check_order() {
        assert_eq!(ValidationVerdict::Valid.to_string(), "Valid");
        let verdict = ValidationVerdict::Invalid(vec![
            Violation::InvalidIdentifier,
            Violation::EmptyLegalName,
            Violation::NegativeValue,
        ]);
        assert_eq!(
            verdict.to_string(),
            "Invalid: Invalid Identifier, Empty Legal Name, Negative Value"
        );
    }
}
