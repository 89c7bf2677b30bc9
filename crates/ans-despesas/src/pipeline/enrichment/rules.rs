//! Per-record business rules. Violations are reported in a fixed order so
//! the rendered verdict is deterministic: missing identifier, invalid
//! identifier, empty legal name, negative value.

use super::cnpj;
use crate::pipeline::domain::{EnrichedRecord, ValidationVerdict, Violation};

/// Evaluates one enriched record against the rule set. The checksum rule
/// only runs when an identifier is present at all, so a record never
/// reports both identifier violations.
pub fn evaluate(record: &EnrichedRecord) -> ValidationVerdict {
    let mut violations = Vec::new();

    match record.national_id.as_deref() {
        None | Some("") => violations.push(Violation::MissingIdentifier),
        Some(national_id) => {
            if !cnpj::validate(national_id) {
                violations.push(Violation::InvalidIdentifier);
            }
        }
    }

    let legal_name = record.legal_name.as_deref().unwrap_or("");
    if legal_name.trim().is_empty() {
        violations.push(Violation::EmptyLegalName);
    }

    if record.expense_value < 0.0 {
        violations.push(Violation::NegativeValue);
    }

    if violations.is_empty() {
        ValidationVerdict::Valid
    } else {
        ValidationVerdict::Invalid(violations)
    }
}
