//! Error types for source reading

use thiserror::Error;

/// Errors that can occur while fetching or decoding a source
#[derive(Error, Debug)]
pub enum SourceError {
    /// No reader could decode the fetched bytes
    #[error("Unsupported format for {location}: {last_error}")]
    UnsupportedFormat { location: String, last_error: String },

    /// Remote fetch failed
    #[error("Failed to fetch {location}: {message}")]
    Fetch { location: String, message: String },

    /// Local read failed
    #[error("IO error reading {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    /// A URL was given but remote support is compiled out
    #[error("Cannot fetch {0}: built without the 'remote' feature")]
    RemoteDisabled(String),
}

impl SourceError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            SourceError::UnsupportedFormat { location, .. } => format!(
                "{self}\n\nHint: {location} must be a CSV file or a Parquet file."
            ),
            SourceError::Fetch { .. } => {
                format!("{self}\n\nHint: Check the URL and your network connection.")
            }
            SourceError::RemoteDisabled(_) => format!(
                "{self}\n\nHint: Rebuild with --features remote or download the file first."
            ),
            SourceError::Io { .. } => self.to_string(),
        }
    }
}
