//! CLI command for running the load pipeline

use std::path::PathBuf;

use tracing::{error, info};

use crate::error::CliError;
use blood_donation_pipeline::logging;
use blood_donation_pipeline::{
    ExportConfig, ExportFormat, FailurePolicy, PipelineConfig, PipelineError, PipelineExecutor,
};

/// Arguments for the `run` command
pub struct PipelineRunArgs {
    /// TOML configuration file; flags below override its values
    pub config: Option<PathBuf>,
    pub database: Option<PathBuf>,
    /// Replaces the configured source list when non-empty
    pub sources: Vec<String>,
    pub date_columns: Option<Vec<String>>,
    pub skip_date_validation: bool,
    pub failure_policy: Option<FailurePolicy>,
    pub export_dir: Option<PathBuf>,
    pub export_format: Option<ExportFormat>,
    pub compress: bool,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl PipelineRunArgs {
    /// Merge the config file (or defaults) with command line overrides
    pub fn build_config(&self) -> Result<PipelineConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)?,
            None => PipelineConfig::new(),
        };

        if let Some(database) = &self.database {
            config = config.with_database(database.clone());
        }
        if !self.sources.is_empty() {
            config = config.with_sources(self.sources.iter().cloned());
        }
        if self.skip_date_validation {
            if self.date_columns.is_some() {
                return Err(CliError::InvalidArgument(
                    "--date-columns cannot be combined with --skip-date-validation".to_string(),
                ));
            }
            config = config.with_date_columns(None);
        } else if let Some(columns) = &self.date_columns {
            config = config.with_date_columns(Some(columns.clone()));
        }
        if let Some(policy) = self.failure_policy {
            config = config.with_failure_policy(policy);
        }

        if let Some(dir) = &self.export_dir {
            let mut export = ExportConfig::new(dir.clone()).with_compress(self.compress);
            if let Some(format) = self.export_format {
                export = export.with_format(format);
            }
            config = config.with_export(export);
        } else if let Some(mut export) = config.export.take() {
            if let Some(format) = self.export_format {
                export.format = format;
            }
            export.compress |= self.compress;
            config = config.with_export(export);
        } else if self.export_format.is_some() || self.compress {
            return Err(CliError::InvalidArgument(
                "--export-format and --compress require --export-dir".to_string(),
            ));
        }

        let mut log = config.log.clone();
        if let Some(dir) = &self.log_dir {
            log.dir = dir.clone();
        }
        if let Some(level) = &self.log_level {
            log.level = level.clone();
        }
        Ok(config.with_log(log))
    }
}

/// Handle the `run` command
pub fn handle_pipeline_run(args: &PipelineRunArgs) -> Result<(), CliError> {
    let config = args.build_config()?;
    let _guard = logging::init(&config.log)?;

    let executor = PipelineExecutor::new(config)?;
    info!(run_id = %executor.run_id(), "Starting blood donation pipeline");

    match executor.run() {
        Ok(report) => {
            report.print_summary();
            println!(
                "Loaded {} dataset(s), {} rows into {}",
                report.datasets.len(),
                report.total_rows_written(),
                executor.config().database.display()
            );
            Ok(())
        }
        Err(PipelineError::Partial { report, failures }) => {
            report.print_summary();
            for failure in &failures {
                error!(error = %failure, "Dataset failed");
            }
            Err(PipelineError::Partial { report, failures }.into())
        }
        Err(e) => {
            error!(error = %e, "Pipeline failed");
            Err(e.into())
        }
    }
}
