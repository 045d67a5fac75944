//! Pipeline configuration types

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{PipelineError, PipelineResult};
use crate::export::ExportConfig;
use crate::logging::LogConfig;
use crate::source::SourceLocation;

/// Public blood donation datasets loaded by default
pub const DEFAULT_SOURCES: [&str; 5] = [
    "https://raw.githubusercontent.com/MoH-Malaysia/data-darah-public/main/donations_facility.csv",
    "https://raw.githubusercontent.com/MoH-Malaysia/data-darah-public/main/donations_state.csv",
    "https://raw.githubusercontent.com/MoH-Malaysia/data-darah-public/main/newdonors_facility.csv",
    "https://raw.githubusercontent.com/MoH-Malaysia/data-darah-public/main/newdonors_state.csv",
    "https://dub.sh/ds-data-granular",
];

/// Columns parsed as dates unless configured otherwise
pub const DEFAULT_DATE_COLUMNS: [&str; 2] = ["date", "visit_date"];

pub const DEFAULT_DATABASE: &str = "duckdb/blood_donation_pipeline_v2.duckdb";

/// What to do when one dataset fails to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failed dataset
    #[default]
    Abort,
    /// Load the remaining datasets, then report every failure
    Continue,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "continue" => Ok(FailurePolicy::Continue),
            _ => Err(format!("Unknown failure policy: {s}. Use 'abort' or 'continue'")),
        }
    }
}

/// Main pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Analytics database path
    pub database: PathBuf,
    /// Source URLs or paths, loaded in order
    pub sources: Vec<String>,
    /// Columns parsed as dates; `None` skips date validation
    pub date_columns: Option<Vec<String>>,
    pub failure_policy: FailurePolicy,
    /// Also write each cleaned dataset to disk
    pub export: Option<ExportConfig>,
    pub log: LogConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
            date_columns: Some(DEFAULT_DATE_COLUMNS.iter().map(|s| s.to_string()).collect()),
            failure_policy: FailurePolicy::default(),
            export: None,
            log: LogConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline config
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file; missing keys take defaults
    pub fn from_toml_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Set the database path
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = path.into();
        self
    }

    /// Replace the source list
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Set the date columns (`None` skips date validation)
    pub fn with_date_columns(mut self, columns: Option<Vec<String>>) -> Self {
        self.date_columns = columns;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_export(mut self, export: ExportConfig) -> Self {
        self.export = Some(export);
        self
    }

    pub fn with_log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Parsed source locations, in load order
    pub fn locations(&self) -> Vec<SourceLocation> {
        self.sources.iter().map(|s| SourceLocation::parse(s)).collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.database.as_os_str().is_empty() {
            return Err("database path is empty".to_string());
        }
        if self.sources.is_empty() {
            return Err("no sources configured".to_string());
        }

        let mut names = HashSet::new();
        for location in self.locations() {
            let name = location.dataset_name();
            if name.is_empty() {
                return Err(format!("cannot derive a table name from source '{location}'"));
            }
            if !names.insert(name.clone()) {
                return Err(format!(
                    "sources map to the same table '{name}'; each source needs a distinct file name"
                ));
            }
        }
        Ok(())
    }
}
