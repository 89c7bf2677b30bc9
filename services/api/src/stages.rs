use crate::cli::PipelineCommand;
use ans_despesas::config::AppConfig;
use ans_despesas::error::AppError;
use ans_despesas::pipeline::{self, consolidation, enrichment, store};
use ans_despesas::telemetry;
use tracing::info;

/// Executes one batch pipeline command. Stage progress is logged by the
/// stages themselves; this layer only sequences them and reports the
/// closing summary.
pub(crate) fn run(command: PipelineCommand) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match command {
        PipelineCommand::Run => {
            let mut conn = store::open(&config.data.database_path)?;
            let report = pipeline::run_all(&config.data, &mut conn)?;
            info!(
                statements = report.consolidation.files_read,
                rows = report.consolidation.records,
                valid = report.enrichment.valid,
                invalid = report.enrichment.invalid,
                operators = report.load.operators,
                aggregates = report.load.aggregates,
                "pipeline run complete"
            );
        }
        PipelineCommand::Consolidate => {
            let summary = consolidation::run(&config.data)?;
            info!(
                statements = summary.files_read,
                rows = summary.records,
                "consolidation complete"
            );
        }
        PipelineCommand::Enrich => {
            let outcome = enrichment::run(&config.data)?;
            info!(
                matched = outcome.summary.match_report.matched,
                unmatched = outcome.summary.match_report.unmatched,
                valid = outcome.summary.valid,
                invalid = outcome.summary.invalid,
                groups = outcome.summary.aggregated_groups,
                "enrichment complete"
            );
        }
        PipelineCommand::Load => {
            let outcome = enrichment::run(&config.data)?;
            let mut conn = store::open(&config.data.database_path)?;
            let summary =
                store::load_run(&mut conn, &outcome.entries, &outcome.records, &outcome.stats)?;
            info!(
                operators = summary.operators,
                expenses = summary.expenses,
                aggregates = summary.aggregates,
                "store load complete"
            );
        }
    }

    Ok(())
}
