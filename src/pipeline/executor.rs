//! Pipeline executor loading every configured source into the store

use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use super::config::{FailurePolicy, PipelineConfig};
use super::error::{LoadError, PipelineError, PipelineResult};
use crate::cleaning::{Cleaner, StageRecord};
use crate::export::export_dataset;
use crate::source::{SourceLocation, read_source};
use crate::store::AnalyticsStore;

/// Pipeline executor that reads, cleans and persists each source in turn
pub struct PipelineExecutor {
    config: PipelineConfig,
    run_id: String,
    processing_time: Option<NaiveDateTime>,
}

impl PipelineExecutor {
    /// Create a new pipeline executor
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::Config)?;
        Ok(Self {
            config,
            run_id: Uuid::new_v4().to_string(),
            processing_time: None,
        })
    }

    /// Fix the instant future dates are compared against, in UTC
    pub fn with_processing_time(mut self, now: NaiveDateTime) -> Self {
        self.processing_time = Some(now);
        self
    }

    /// Instant future dates are compared against; current UTC time unless fixed
    pub fn processing_time(&self) -> NaiveDateTime {
        self.processing_time
            .unwrap_or_else(|| chrono::Utc::now().naive_utc())
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline
    ///
    /// The store is checkpointed and closed on every exit path.
    pub fn run(&self) -> PipelineResult<PipelineReport> {
        let _span = info_span!("pipeline_run", run_id = %self.run_id).entered();

        let start = Instant::now();
        let now = self.processing_time();

        info!(
            run_id = %self.run_id,
            sources = self.config.sources.len(),
            database = %self.config.database.display(),
            policy = ?self.config.failure_policy,
            "Starting pipeline"
        );

        let mut store = AnalyticsStore::open(&self.config.database)?;
        let result = self.load_all(&mut store, now);
        let closed = store.close();

        let (datasets, failures) = match (result, closed) {
            (Ok(loaded), Ok(())) => loaded,
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    error!(error = %close_err, "Failed to close store after pipeline error");
                }
                return Err(e);
            }
            (Ok(_), Err(e)) => return Err(e.into()),
        };

        let report = PipelineReport {
            run_id: self.run_id.clone(),
            datasets,
            failed: failures
                .iter()
                .filter_map(|f| f.dataset_name().map(str::to_string))
                .collect(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            run_id = %report.run_id,
            duration_ms = report.duration_ms,
            loaded = report.datasets.len(),
            failed = report.failed.len(),
            "Pipeline completed"
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(PipelineError::Partial {
                report: Box::new(report),
                failures,
            })
        }
    }

    fn load_all(
        &self,
        store: &mut AnalyticsStore,
        now: NaiveDateTime,
    ) -> PipelineResult<(Vec<DatasetOutcome>, Vec<PipelineError>)> {
        let cleaner = Cleaner::standard(self.config.date_columns.clone(), now);
        let mut outcomes = Vec::new();
        let mut failures = Vec::new();

        for location in self.config.locations() {
            let dataset = location.dataset_name();
            let _dataset_span = info_span!("dataset", dataset = %dataset).entered();

            match self.load_one(store, &cleaner, &location) {
                Ok(outcome) => {
                    info!(
                        dataset = %outcome.dataset,
                        rows_read = outcome.rows_read,
                        rows_written = outcome.rows_written,
                        duration_ms = outcome.duration_ms,
                        "Dataset loaded"
                    );
                    outcomes.push(outcome);
                }
                Err(e) => {
                    error!(dataset = %dataset, source = %location, error = %e, "Dataset failed");
                    let err = PipelineError::dataset(dataset, e);
                    match self.config.failure_policy {
                        FailurePolicy::Abort => return Err(err),
                        FailurePolicy::Continue => failures.push(err),
                    }
                }
            }
        }

        if !failures.is_empty() {
            warn!(failed = failures.len(), "Continuing past failed datasets");
        }
        Ok((outcomes, failures))
    }

    fn load_one(
        &self,
        store: &mut AnalyticsStore,
        cleaner: &Cleaner,
        location: &SourceLocation,
    ) -> Result<DatasetOutcome, LoadError> {
        let start = Instant::now();

        let raw = read_source(location)?;
        let rows_read = raw.num_rows();

        let (cleaned, stages) = cleaner.clean(raw);

        let export_path = match &self.config.export {
            Some(export) => Some(export_dataset(&cleaned, export)?),
            None => None,
        };

        let rows_written = store.replace_table(&cleaned)?;

        Ok(DatasetOutcome {
            dataset: cleaned.name().to_string(),
            source: location.to_string(),
            rows_read,
            rows_written,
            stages,
            export_path,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Result of loading one dataset
#[derive(Debug, Clone, Serialize)]
pub struct DatasetOutcome {
    /// Table name
    pub dataset: String,
    pub source: String,
    pub rows_read: usize,
    pub rows_written: usize,
    /// Per-stage row counts, in execution order
    pub stages: Vec<StageRecord>,
    pub export_path: Option<PathBuf>,
    pub duration_ms: u64,
}

/// Report from a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Run ID
    pub run_id: String,
    /// Datasets loaded successfully
    pub datasets: Vec<DatasetOutcome>,
    /// Names of datasets that failed (continue policy only)
    pub failed: Vec<String>,
    /// Total duration in milliseconds
    pub duration_ms: u64,
}

impl PipelineReport {
    /// Check if every dataset loaded
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total_rows_written(&self) -> usize {
        self.datasets.iter().map(|d| d.rows_written).sum()
    }

    pub fn dataset(&self, name: &str) -> Option<&DatasetOutcome> {
        self.datasets.iter().find(|d| d.dataset == name)
    }

    /// Get formatted duration
    pub fn duration_formatted(&self) -> String {
        let secs = self.duration_ms / 1000;
        let mins = secs / 60;
        let remaining_secs = secs % 60;

        if mins > 0 {
            format!("{}m {}s", mins, remaining_secs)
        } else {
            format!("{}s", secs)
        }
    }

    /// Print summary to stderr
    pub fn print_summary(&self) {
        eprintln!();
        eprintln!("Pipeline {}", self.run_id);
        eprintln!("Duration: {}", self.duration_formatted());
        eprintln!("Datasets loaded: {}", self.datasets.len());

        for outcome in &self.datasets {
            eprintln!(
                "  - {}: {} -> {} rows ({}ms)",
                outcome.dataset, outcome.rows_read, outcome.rows_written, outcome.duration_ms
            );
            for stage in &outcome.stages {
                match &stage.skipped {
                    Some(reason) => eprintln!("      {}: skipped ({})", stage.stage, reason),
                    None if stage.rows_removed() > 0 || stage.values_nulled() > 0 => eprintln!(
                        "      {}: removed {} rows, nulled {} values",
                        stage.stage,
                        stage.rows_removed(),
                        stage.values_nulled()
                    ),
                    None => {}
                }
            }
            if let Some(path) = &outcome.export_path {
                eprintln!("      exported to {}", path.display());
            }
        }
        for name in &self.failed {
            eprintln!("  - {}: failed", name);
        }
    }
}
