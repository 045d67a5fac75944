//! CLI command handlers

pub mod pipeline;
pub mod query;

pub use pipeline::{PipelineRunArgs, handle_pipeline_run};
pub use query::{
    ActivityArgs, DonorsArgs, PreviewArgs, TablesArgs, handle_activity, handle_donors,
    handle_preview, handle_tables,
};
