//! Blood Donation Pipeline - batch cleaning and cohort analytics for public
//! blood donation data
//!
//! Provides:
//! - Source reading from paths or URLs with CSV/Parquet detection
//! - Cleaning stages (column names, integer and date validation, dedupe)
//! - Persistence into an embedded DuckDB store, one table per dataset
//! - Cohort retention, churn and visit-frequency queries by age band
//! - Yearly roll-ups of the state and facility donation tables

pub mod analytics;
pub mod cleaning;
pub mod dataset;
pub mod export;
pub mod logging;
pub mod pipeline;
pub mod source;
pub mod store;

// Re-export commonly used types
pub use analytics::{
    AgeGroup, AgeGroupValue, DateRange, DonationActivity, DonorAnalytics, DonorSummary,
    QueryError, RetentionPoint, VisitTable, YearlyTotals,
};
pub use cleaning::{Cleaner, CleaningStage, StageRecord, normalize_column_name};
pub use dataset::{Column, ColumnData, ColumnType, Dataset, DatasetError};
pub use export::{ExportConfig, ExportError, ExportFormat};
pub use pipeline::{
    DatasetOutcome, FailurePolicy, PipelineConfig, PipelineError, PipelineExecutor,
    PipelineReport,
};
pub use source::{SourceError, SourceLocation, read_source};
pub use store::{AnalyticsStore, StoreError};
