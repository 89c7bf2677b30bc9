//! Enrichment stage: joins consolidated expenses against the operator
//! registry, stamps a validation verdict on every row, aggregates the
//! valid rows, and serializes both reports.

pub mod aggregate;
pub mod cnpj;
pub mod registry;
pub mod rules;

use crate::config::DataConfig;
use crate::pipeline::domain::{
    AggregatedStat, EnrichedRecord, ExpenseRecord, MatchReport, Period, RegistryEntry,
};
use crate::pipeline::PipelineError;
use crate::tabular::{self, format_decimal_comma, parse_decimal_comma};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

pub const ENRICHED_REPORT_FILE: &str = "relatorio_final.csv";
pub const AGGREGATED_REPORT_FILE: &str = "despesas_agregadas.csv";

/// Counts reported after one enrichment run.
#[derive(Debug, Clone, Copy)]
pub struct EnrichmentSummary {
    pub match_report: MatchReport,
    pub valid: usize,
    pub invalid: usize,
    pub aggregated_groups: usize,
}

/// Everything the stage produced. The datasets are kept so the load stage
/// can persist them without re-parsing the generated reports.
#[derive(Debug)]
pub struct EnrichmentOutcome {
    pub summary: EnrichmentSummary,
    pub entries: Vec<RegistryEntry>,
    pub records: Vec<EnrichedRecord>,
    pub stats: Vec<AggregatedStat>,
}

#[derive(Debug, Deserialize)]
struct ConsolidatedRow {
    #[serde(rename = "RegistroANS")]
    registry_id: String,
    #[serde(rename = "DESCRICAO")]
    description: String,
    #[serde(rename = "Ano")]
    year: String,
    #[serde(rename = "Trimestre")]
    quarter: String,
    #[serde(rename = "ValorDespesas")]
    expense_value: String,
}

impl ConsolidatedRow {
    // Coercion boundary: the consolidated file is still text, and malformed
    // numerics become zero values rather than dropped rows.
    fn into_record(self) -> ExpenseRecord {
        ExpenseRecord {
            registry_id: self.registry_id,
            description: self.description,
            period: Period::new(
                self.year.trim().parse().unwrap_or(0),
                self.quarter.trim().parse().unwrap_or(0),
            ),
            expense_value: parse_decimal_comma(&self.expense_value).unwrap_or(0.0),
        }
    }
}

/// Runs the stage end to end. Missing inputs are fatal; every data-quality
/// condition past that point is absorbed into verdicts and counts.
pub fn run(data: &DataConfig) -> Result<EnrichmentOutcome, PipelineError> {
    let expenses = read_consolidated(&data.consolidated_path(), data)?;

    let registry_path = registry::find_registry_report(&data.assets_dir)?;
    let entries = registry::deduplicate(registry::load(&registry_path, &data.decode)?);

    let (mut records, match_report) = registry::enrich(expenses, &entries);
    for record in &mut records {
        record.verdict = rules::evaluate(record);
    }

    let valid = records.iter().filter(|r| r.verdict.is_valid()).count();
    let invalid = records.len() - valid;
    info!(
        total = match_report.total,
        matched = match_report.matched,
        unmatched = match_report.unmatched,
        valid,
        invalid,
        "consistency report"
    );

    let stats = aggregate::aggregate(&records);
    if stats.is_empty() {
        warn!("no valid records remained after filtering; aggregate report is empty");
    } else {
        info!(groups = stats.len(), "aggregated validated expenses");
    }

    write_enriched_report(&data.enriched_report_path(), &records)?;
    write_aggregated_report(&data.aggregated_report_path(), &stats)?;

    let summary = EnrichmentSummary {
        match_report,
        valid,
        invalid,
        aggregated_groups: stats.len(),
    };
    Ok(EnrichmentOutcome {
        summary,
        entries,
        records,
        stats,
    })
}

fn read_consolidated(path: &Path, data: &DataConfig) -> Result<Vec<ExpenseRecord>, PipelineError> {
    let text = crate::pipeline::read_decoded(path, &data.decode)?;
    let mut reader = tabular::delimited_reader(&text);

    let mut expenses = Vec::new();
    for row in reader.deserialize::<ConsolidatedRow>() {
        let row = row.map_err(|source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        expenses.push(row.into_record());
    }
    Ok(expenses)
}

fn write_enriched_report(path: &Path, records: &[EnrichedRecord]) -> Result<(), PipelineError> {
    let mut writer = tabular::delimited_writer(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let csv_err = |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };
    writer
        .write_record([
            "RegistroANS",
            "DESCRICAO",
            "Ano",
            "Trimestre",
            "ValorDespesas",
            "RazaoSocial",
            "CNPJ",
            "Modalidade",
            "UF",
            "Status_Validacao",
        ])
        .map_err(csv_err)?;
    for record in records {
        let year = record.period.year.to_string();
        let quarter = record.period.quarter.to_string();
        let value = format_decimal_comma(record.expense_value, 2);
        let verdict = record.verdict.to_string();
        writer
            .write_record([
                record.registry_id.as_str(),
                record.description.as_str(),
                year.as_str(),
                quarter.as_str(),
                value.as_str(),
                record.legal_name.as_deref().unwrap_or(""),
                record.national_id.as_deref().unwrap_or(""),
                record.category.as_deref().unwrap_or(""),
                record.region_code.as_deref().unwrap_or(""),
                verdict.as_str(),
            ])
            .map_err(csv_err)?;
    }

    writer.flush().map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_aggregated_report(path: &Path, stats: &[AggregatedStat]) -> Result<(), PipelineError> {
    let mut writer = tabular::delimited_writer(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let csv_err = |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };
    writer
        .write_record(["RazaoSocial", "UF", "TotalDespesas", "MediaTrimestral", "DesvioPadrao"])
        .map_err(csv_err)?;
    for stat in stats {
        let total = format_decimal_comma(stat.total_expense, 2);
        let mean = format_decimal_comma(stat.quarterly_mean, 2);
        let deviation = format_decimal_comma(stat.quarterly_deviation, 2);
        writer
            .write_record([
                stat.legal_name.as_str(),
                stat.region_code.as_str(),
                total.as_str(),
                mean.as_str(),
                deviation.as_str(),
            ])
            .map_err(csv_err)?;
    }

    writer.flush().map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}
