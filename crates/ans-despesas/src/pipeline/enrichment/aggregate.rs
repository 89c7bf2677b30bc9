//! Grouped statistics over validated expense rows: quarterly sums per
//! operator and region, then total, mean and sample standard deviation
//! across the quarterly sums.

use crate::pipeline::domain::{AggregatedStat, EnrichedRecord, Period};
use std::collections::BTreeMap;

/// Aggregates records whose verdict is `Valid`; everything else is
/// excluded by policy, not as an error. Output is ordered descending by
/// total expense; ties keep ascending (legal name, region) order.
pub fn aggregate(records: &[EnrichedRecord]) -> Vec<AggregatedStat> {
    // Step 1: one sum per (operator, region, period). Periods combine year
    // and quarter so the same quarter of different years never merges.
    let mut quarterly: BTreeMap<(String, String, Period), f64> = BTreeMap::new();
    for record in records.iter().filter(|record| record.verdict.is_valid()) {
        let key = (
            record.legal_name.clone().unwrap_or_default(),
            record.region_code.clone().unwrap_or_default(),
            record.period,
        );
        *quarterly.entry(key).or_insert(0.0) += record.expense_value;
    }

    // Step 2: collapse the period axis per (operator, region).
    let mut grouped: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
    for ((legal_name, region_code, _), sum) in quarterly {
        grouped.entry((legal_name, region_code)).or_default().push(sum);
    }

    let mut stats: Vec<AggregatedStat> = grouped
        .into_iter()
        .map(|((legal_name, region_code), sums)| {
            let total: f64 = sums.iter().sum();
            let mean = total / sums.len() as f64;
            AggregatedStat {
                legal_name,
                region_code,
                total_expense: total,
                quarterly_mean: round2(mean),
                quarterly_deviation: round2(sample_deviation(&sums, mean)),
            }
        })
        .collect();

    // Stable sort: equal totals preserve the ascending key order above.
    stats.sort_by(|a, b| b.total_expense.total_cmp(&a.total_expense));
    stats
}

/// Sample standard deviation (N-1 denominator). Undefined for a single
/// period, recorded as 0 rather than null.
fn sample_deviation(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
