//! Error types for the analytics store

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing the store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Replacing a table failed; its previous contents are still in place
    #[error("Failed to persist table '{table}': {source}")]
    Persistence {
        table: String,
        #[source]
        source: duckdb::Error,
    },

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Table is not in the catalog
    #[error("Table not found: {0}")]
    UnknownTable(String),

    /// Dataset has no columns to create a table from
    #[error("Dataset '{0}' has no columns")]
    EmptySchema(String),

    /// Could not open the database file
    #[error("Cannot open database {path}: {message}")]
    Open { path: PathBuf, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            StoreError::UnknownTable(table) => format!(
                "Table not found: {table}\n\nHint: Run the pipeline first, or list tables with 'blood-donation-cli tables'."
            ),
            StoreError::Open { path, .. } => format!(
                "{self}\n\nHint: Check that {} exists and is not locked by a running pipeline.",
                path.display()
            ),
            _ => self.to_string(),
        }
    }
}

impl From<duckdb::Error> for StoreError {
    fn from(err: duckdb::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}
