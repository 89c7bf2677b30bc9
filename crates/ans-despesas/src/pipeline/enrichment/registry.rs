//! Registry report (cadop) loading and the left join that enriches
//! consolidated expense rows with operator data.

use crate::pipeline::domain::{EnrichedRecord, ExpenseRecord, MatchReport, RegistryEntry};
use crate::pipeline::PipelineError;
use crate::tabular::{self, DecodePolicy};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RegistryRow {
    #[serde(rename = "REGISTRO_OPERADORA")]
    registry_id: String,
    #[serde(rename = "Razao_Social")]
    legal_name: String,
    #[serde(rename = "CNPJ")]
    national_id: String,
    #[serde(rename = "Modalidade")]
    category: String,
    #[serde(rename = "UF")]
    region_code: String,
}

/// Locates the registry report in the assets directory. When more than one
/// report is present the lexicographically first file name wins.
pub fn find_registry_report(assets_dir: &Path) -> Result<PathBuf, PipelineError> {
    let entries = std::fs::read_dir(assets_dir).map_err(|source| PipelineError::Io {
        path: assets_dir.to_path_buf(),
        source,
    })?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| {
                    name.contains("Relatorio_cadop") && name.ends_with(".csv")
                })
        })
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::MissingRegistry {
            dir: assets_dir.to_path_buf(),
        })
}

/// Reads and parses the registry report. Rows that fail to deserialize
/// (truncated or shifted lines are common in older reports) are skipped,
/// mirroring the tolerant read of the upstream publisher's files.
pub fn load(path: &Path, decode: &DecodePolicy) -> Result<Vec<RegistryEntry>, PipelineError> {
    let text = crate::pipeline::read_decoded(path, decode)?;
    let mut reader = tabular::delimited_reader(&text);

    let mut entries = Vec::new();
    let mut skipped = 0usize;
    for row in reader.deserialize::<RegistryRow>() {
        match row {
            Ok(row) => entries.push(RegistryEntry {
                registry_id: row.registry_id,
                legal_name: row.legal_name,
                national_id: row.national_id,
                category: row.category,
                region_code: row.region_code,
            }),
            Err(_) => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(skipped, path = %path.display(), "skipped malformed registry rows");
    }

    Ok(entries)
}

/// Deduplicates registry entries by registry id. The first occurrence under
/// source order wins; later collisions are dropped.
pub fn deduplicate(entries: Vec<RegistryEntry>) -> Vec<RegistryEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.registry_id.clone()))
        .collect()
}

/// Left-joins expense records onto the deduplicated registry. Every input
/// row yields exactly one output row; unmatched rows keep empty enrichment
/// fields and are counted in the report.
pub fn enrich(
    expenses: Vec<ExpenseRecord>,
    registry: &[RegistryEntry],
) -> (Vec<EnrichedRecord>, MatchReport) {
    let by_id: HashMap<&str, &RegistryEntry> = registry
        .iter()
        .map(|entry| (entry.registry_id.as_str(), entry))
        .collect();

    let mut report = MatchReport::default();
    let records: Vec<EnrichedRecord> = expenses
        .into_iter()
        .map(|expense| {
            let entry = by_id.get(expense.registry_id.as_str());
            let record = EnrichedRecord {
                registry_id: expense.registry_id,
                description: expense.description,
                period: expense.period,
                expense_value: expense.expense_value,
                legal_name: entry.map(|e| e.legal_name.clone()),
                national_id: entry.map(|e| e.national_id.clone()),
                category: entry.map(|e| e.category.clone()),
                region_code: entry.map(|e| e.region_code.clone()),
                verdict: Default::default(),
            };

            report.total += 1;
            if record.national_id.is_some() {
                report.matched += 1;
            } else {
                report.unmatched += 1;
            }
            record
        })
        .collect();

    (records, report)
}
