//! Error types for pipeline operations
//!
//! Errors chain down to the failing source or store operation while
//! `user_message()` gives a short hint for CLI output.

use thiserror::Error;

use super::executor::PipelineReport;
use crate::export::ExportError;
use crate::source::SourceError;
use crate::store::StoreError;

/// Why a single dataset failed to load
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Errors that can occur during pipeline execution
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Pipeline configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store could not be opened or closed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// One dataset failed; datasets loaded before it are kept
    #[error("Dataset '{dataset}' failed: {source}")]
    Dataset {
        dataset: String,
        #[source]
        source: LoadError,
    },

    /// Some datasets failed under the continue policy
    #[error("{} dataset(s) failed: {}", .failures.len(), .failures.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Partial {
        report: Box<PipelineReport>,
        failures: Vec<PipelineError>,
    },
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

impl PipelineError {
    pub fn dataset(dataset: impl Into<String>, source: impl Into<LoadError>) -> Self {
        Self::Dataset {
            dataset: dataset.into(),
            source: source.into(),
        }
    }

    /// Name of the failed dataset, if this is a dataset error
    pub fn dataset_name(&self) -> Option<&str> {
        match self {
            PipelineError::Dataset { dataset, .. } => Some(dataset),
            _ => None,
        }
    }

    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Config(msg) => {
                format!(
                    "Configuration error: {msg}\n\nHint: Check your pipeline configuration file."
                )
            }
            PipelineError::Store(e) => e.user_message(),
            PipelineError::Dataset { dataset, source } => {
                let detail = match source {
                    LoadError::Source(e) => e.user_message(),
                    LoadError::Store(e) => e.user_message(),
                    LoadError::Export(e) => e.to_string(),
                };
                format!("Dataset '{dataset}' failed: {detail}")
            }
            PipelineError::Partial { failures, .. } => {
                let mut msg = format!("{} dataset(s) failed:\n", failures.len());
                for failure in failures {
                    msg.push_str(&format!("  - {failure}\n"));
                }
                msg.push_str("\nHint: The remaining datasets were loaded.");
                msg
            }
        }
    }
}
