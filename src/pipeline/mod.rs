//! Pipeline orchestration
//!
//! For each configured source, in order: read, clean (normalize columns,
//! validate integers and dates, deduplicate), optionally export, then
//! replace the table of the same name in the analytics store.

mod config;
mod error;
mod executor;

pub use config::{
    DEFAULT_DATABASE, DEFAULT_DATE_COLUMNS, DEFAULT_SOURCES, FailurePolicy, PipelineConfig,
};
pub use error::{LoadError, PipelineError, PipelineResult};
pub use executor::{DatasetOutcome, PipelineExecutor, PipelineReport};
