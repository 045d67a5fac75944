//! Error types for analytical queries

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur while running analytical queries
#[derive(Error, Debug)]
pub enum QueryError {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Queried table does not exist
    #[error("Table not found: {0}")]
    MissingTable(String),

    /// Queried column does not exist
    #[error("Column '{column}' not found in table '{table}'")]
    MissingColumn { table: String, column: String },

    /// Date range with start after end
    #[error("Invalid date range: {0}")]
    InvalidRange(String),
}

impl QueryError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            QueryError::MissingTable(table) => format!(
                "Table not found: {table}\n\nHint: Run the pipeline to load the datasets first."
            ),
            QueryError::MissingColumn { table, .. } => format!(
                "{self}\n\nHint: Use 'blood-donation-cli preview {table}' to inspect its columns."
            ),
            _ => self.to_string(),
        }
    }
}

impl From<duckdb::Error> for QueryError {
    fn from(err: duckdb::Error) -> Self {
        QueryError::Database(err.to_string())
    }
}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownTable(table) => QueryError::MissingTable(table),
            other => QueryError::Database(other.to_string()),
        }
    }
}
