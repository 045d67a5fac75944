//! CLI error type

use thiserror::Error;

use blood_donation_pipeline::logging::LogError;
use blood_donation_pipeline::{PipelineError, QueryError, StoreError};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Logging(#[from] LogError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CliError {
    /// Message with hints, for printing before exit
    pub fn user_message(&self) -> String {
        match self {
            CliError::Pipeline(e) => e.user_message(),
            CliError::Store(e) => e.user_message(),
            CliError::Query(e) => e.user_message(),
            _ => self.to_string(),
        }
    }
}
