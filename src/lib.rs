//! Portaria -- gate access-log auditor.
//!
//! Loads an access-control log, cleans and enriches it, flags anomalous gate
//! response times with an isolation forest, classifies every event into a
//! severity tier, prints alerts for Critical events, renders three charts and
//! stores the enriched table in SQLite.

pub mod alert;
pub mod charts;
pub mod config;
pub mod detect;
pub mod ingest;
pub mod storage;

use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::charts::ChartError;
use crate::config::AnalysisConfig;
use crate::detect::{Classification, DetectError};
use crate::ingest::clean::CleanError;
use crate::ingest::IngestError;

/// A failure that stops the run before the table is stored.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Clean(#[from] CleanError),

    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error("failed to write alerts: {0}")]
    Console(#[from] io::Error),

    #[error(transparent)]
    Chart(#[from] ChartError),
}

impl PipelineError {
    /// Console message for this failure.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Ingest(IngestError::NotFound { path }) => {
                format!("Error: file '{}' not found.", path.display())
            }
            other => format!("Unexpected error: {other}"),
        }
    }
}

/// Outcome of the storage step. A storage failure does not fail the run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StoreOutcome {
    Stored { rows: usize },
    Failed { error: String },
}

/// What a completed run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub input: PathBuf,
    pub database: PathBuf,
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub records: usize,
    pub outliers: usize,
    pub normal: usize,
    pub suspicious: usize,
    pub critical: usize,
    pub alerts: usize,
    pub charts: Vec<PathBuf>,
    pub store: StoreOutcome,
}

/// Run the whole pipeline once.
///
/// Console output (alerts, storage confirmation or storage error) goes to
/// `out`. Any error returned happened before the table was written.
pub fn run<W: Write>(config: &AnalysisConfig, out: &mut W) -> Result<RunSummary, PipelineError> {
    let paths = &config.paths;
    info!(input = %paths.input.display(), database = %paths.database.display(), "starting analysis");

    // 1. Load
    let table = ingest::load_table(&paths.input, config.input.delimiter)?;

    // 2. Clean and enrich
    let cleaned = ingest::clean::clean(&table)?;

    // 3. Score response times
    let values: Vec<f64> = cleaned
        .records
        .iter()
        .map(|r| f64::from(r.response_time.as_secs()))
        .collect();
    let flags = detect::forest::fit_predict(&values, &config.detector)?;

    // 4. Classify
    let records = detect::classify::enrich(cleaned.records, &flags);

    // 5. Alerts
    let alerts = alert::write_alerts(out, &records)?;

    // 6. Charts
    let charts = charts::render_all(&records, &paths.charts_dir)?;

    // 7. Store
    let store = match storage::persist(&paths.database, &records) {
        Ok(rows) => {
            writeln!(out, "\nData stored successfully in '{}'.", paths.database.display())?;
            StoreOutcome::Stored { rows }
        }
        Err(e) => {
            error!(database = %paths.database.display(), error = %e, "storage failed");
            writeln!(out, "Error storing data in SQLite: {e}")?;
            StoreOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    let count = |tier: Classification| records.iter().filter(|r| r.classification == tier).count();
    Ok(RunSummary {
        input: paths.input.clone(),
        database: paths.database.clone(),
        rows_read: table.len(),
        rows_dropped: cleaned.dropped.len(),
        records: records.len(),
        outliers: flags.iter().filter(|f| f.is_outlier()).count(),
        normal: count(Classification::Normal),
        suspicious: count(Classification::Suspicious),
        critical: count(Classification::Critical),
        alerts,
        charts,
        store,
    })
}
