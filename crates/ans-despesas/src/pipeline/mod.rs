//! Batch pipeline over the quarterly accounting statements: consolidation,
//! registry enrichment with per-record verdicts, statistical aggregation,
//! and the relational load serving the reporting API.

pub mod consolidation;
pub mod domain;
pub mod enrichment;
pub mod store;

use crate::config::DataConfig;
use crate::tabular::{self, DecodePolicy};
use rusqlite::Connection;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required input dataset is absent. Fatal for the run; no partial
    /// output is produced past the failing stage.
    #[error("input dataset not found: {path}")]
    MissingInput { path: PathBuf },
    #[error("no statement files to consolidate under {dir}")]
    NoStatementFiles { dir: PathBuf },
    #[error("no registry report (*Relatorio_cadop*.csv) under {dir}")]
    MissingRegistry { dir: PathBuf },
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: tabular::DecodeError,
    },
    #[error("malformed delimited data in {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Store(#[from] store::StoreError),
}

/// Stage summaries for one full pipeline run.
#[derive(Debug)]
pub struct RunReport {
    pub consolidation: consolidation::ConsolidationSummary,
    pub enrichment: enrichment::EnrichmentSummary,
    pub load: store::LoadSummary,
}

/// Runs every stage in order: consolidate raw statements, enrich and
/// aggregate, then replace the store contents with this run's datasets.
pub fn run_all(data: &DataConfig, conn: &mut Connection) -> Result<RunReport, PipelineError> {
    let consolidation = consolidation::run(data)?;
    let outcome = enrichment::run(data)?;
    let load = store::load_run(conn, &outcome.entries, &outcome.records, &outcome.stats)?;

    Ok(RunReport {
        consolidation,
        enrichment: outcome.summary,
        load,
    })
}

/// Reads and decodes one input file; a missing file surfaces as the fatal
/// `MissingInput` condition.
pub(crate) fn read_decoded(path: &Path, policy: &DecodePolicy) -> Result<String, PipelineError> {
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            PipelineError::MissingInput {
                path: path.to_path_buf(),
            }
        } else {
            PipelineError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    tabular::decode(&bytes, policy).map_err(|source| PipelineError::Decode {
        path: path.to_path_buf(),
        source,
    })
}
