//! Consolidation stage: scans the statements directory, filters every raw
//! file down to claim-expense rows and writes the canonical consolidated
//! dataset consumed by enrichment.

mod parser;

use crate::config::DataConfig;
use crate::pipeline::domain::ExpenseRecord;
use crate::pipeline::PipelineError;
use crate::tabular::{self, format_decimal_comma};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const OUTPUT_FILE: &str = "consolidado_despesas.csv";

/// File names this pipeline generates itself; the scan must never re-ingest
/// them as raw statements.
const GENERATED_FILES: [&str; 3] = [
    OUTPUT_FILE,
    super::enrichment::ENRICHED_REPORT_FILE,
    super::enrichment::AGGREGATED_REPORT_FILE,
];

#[derive(Debug, Clone, Copy)]
pub struct ConsolidationSummary {
    pub files_read: usize,
    pub records: usize,
}

/// Runs the stage: every recognized statement file contributes rows, and
/// the consolidated dataset replaces any previous one. Having no statement
/// files at all is fatal; a statement file with no claim-expense rows is
/// not.
pub fn run(data: &DataConfig) -> Result<ConsolidationSummary, PipelineError> {
    std::fs::create_dir_all(&data.files_dir).map_err(|source| PipelineError::Io {
        path: data.files_dir.clone(),
        source,
    })?;

    let candidates = statement_candidates(&data.files_dir)?;
    if candidates.is_empty() {
        return Err(PipelineError::NoStatementFiles {
            dir: data.files_dir.clone(),
        });
    }

    let mut files_read = 0usize;
    let mut records: Vec<ExpenseRecord> = Vec::new();
    for path in candidates {
        let text = super::read_decoded(&path, &data.decode)?;
        match parser::parse_statement(&text).map_err(|source| PipelineError::Csv {
            path: path.clone(),
            source,
        })? {
            Some(rows) => {
                debug!(path = %path.display(), rows = rows.len(), "statement consolidated");
                files_read += 1;
                records.extend(rows);
            }
            None => debug!(path = %path.display(), "not an accounting statement, skipped"),
        }
    }

    if files_read == 0 {
        return Err(PipelineError::NoStatementFiles {
            dir: data.files_dir.clone(),
        });
    }

    write_consolidated(&data.consolidated_path(), &records)?;
    info!(files = files_read, rows = records.len(), "statements consolidated");

    Ok(ConsolidationSummary {
        files_read,
        records: records.len(),
    })
}

fn statement_candidates(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let entries = std::fs::read_dir(dir).map_err(|source| PipelineError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| {
                    name.ends_with(".csv") && !GENERATED_FILES.contains(&name)
                })
        })
        .collect();
    candidates.sort();
    Ok(candidates)
}

fn write_consolidated(path: &Path, records: &[ExpenseRecord]) -> Result<(), PipelineError> {
    let mut writer = tabular::delimited_writer(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let csv_err = |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };
    writer
        .write_record(["RegistroANS", "DESCRICAO", "Ano", "Trimestre", "ValorDespesas"])
        .map_err(csv_err)?;
    for record in records {
        let year = record.period.year.to_string();
        let quarter = record.period.quarter.to_string();
        let value = format_decimal_comma(record.expense_value, 2);
        writer
            .write_record([
                record.registry_id.as_str(),
                record.description.as_str(),
                year.as_str(),
                quarter.as_str(),
                value.as_str(),
            ])
            .map_err(csv_err)?;
    }

    writer.flush().map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}
