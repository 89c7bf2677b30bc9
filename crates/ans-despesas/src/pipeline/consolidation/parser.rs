//! Parses one raw quarterly accounting-statement file into expense
//! records, keeping only the claim-expense account classes.

use crate::pipeline::domain::{ExpenseRecord, Period};
use crate::tabular::{self, parse_decimal_comma};
use chrono::NaiveDate;
use serde::Deserialize;

/// Account description markers for claim expenses.
const EXPENSE_CLASSES: [&str; 2] = ["EVENTOS", "SINISTROS"];

#[derive(Debug, Deserialize)]
struct StatementRow {
    #[serde(rename = "DATA")]
    date: String,
    #[serde(rename = "REG_ANS")]
    registry_id: String,
    #[serde(rename = "DESCRICAO")]
    description: String,
    #[serde(rename = "VL_SALDO_FINAL")]
    final_balance: String,
}

/// Parses a decoded statement file. Returns `None` when the file has no
/// `DESCRICAO` column, which marks it as something other than an
/// accounting statement (the scan tolerates unrelated CSVs in the same
/// directory).
pub(crate) fn parse_statement(text: &str) -> Result<Option<Vec<ExpenseRecord>>, csv::Error> {
    let mut reader = tabular::delimited_reader(text);
    if !reader.headers()?.iter().any(|header| header == "DESCRICAO") {
        return Ok(None);
    }

    let mut records = Vec::new();
    for row in reader.deserialize::<StatementRow>() {
        let row = row?;
        if !is_expense_class(&row.description) {
            continue;
        }

        records.push(ExpenseRecord {
            registry_id: row.registry_id.trim().to_string(),
            description: row.description,
            period: parse_period(&row.date),
            expense_value: parse_decimal_comma(&row.final_balance).unwrap_or(0.0),
        });
    }

    Ok(Some(records))
}

fn is_expense_class(description: &str) -> bool {
    let upper = description.to_uppercase();
    EXPENSE_CLASSES.iter().any(|class| upper.contains(class))
}

// Statement dates arrive as ISO dates; a few older files use the Brazilian
// day-first form. Unparseable dates coerce to the null period instead of
// dropping the row.
fn parse_period(raw: &str) -> Period {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .map(Period::from_date)
        .unwrap_or_else(|_| Period::null())
}
