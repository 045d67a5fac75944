//! Blood donation pipeline CLI
//!
//! # Usage
//!
//! ```bash
//! # Load the default public datasets into ./duckdb/
//! blood-donation-cli run
//!
//! # Load local files, keep going past failures, export cleaned CSVs
//! blood-donation-cli run --source data/a.csv --source data/b.parquet \
//!     --failure-policy continue --export-dir exports --compress
//!
//! # Query the store
//! blood-donation-cli tables
//! blood-donation-cli donors --age-group 20-29
//! blood-donation-cli activity donations_state --by state --entity Johor
//! ```

mod commands;
mod error;
mod output;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use blood_donation_pipeline::pipeline::DEFAULT_DATABASE;
use blood_donation_pipeline::{AgeGroup, ExportFormat, FailurePolicy, logging};
use commands::{
    ActivityArgs, DonorsArgs, PipelineRunArgs, PreviewArgs, TablesArgs, handle_activity,
    handle_donors, handle_pipeline_run, handle_preview, handle_tables,
};
use error::CliError;
use output::OutputFormat;

/// Load, clean and analyse public blood donation data
#[derive(Parser, Debug)]
#[command(name = "blood-donation-cli")]
#[command(about = "Load, clean and analyse public blood donation datasets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch, clean and persist every configured dataset
    Run {
        /// TOML configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Analytics database path
        #[arg(long)]
        database: Option<PathBuf>,

        /// Source URL or path (repeatable); replaces the configured list
        #[arg(long = "source", short)]
        sources: Vec<String>,

        /// Comma-separated columns to parse as dates
        #[arg(long, value_delimiter = ',')]
        date_columns: Option<Vec<String>>,

        /// Do not parse or filter date columns
        #[arg(long)]
        skip_date_validation: bool,

        /// abort or continue when a dataset fails
        #[arg(long)]
        failure_policy: Option<FailurePolicy>,

        /// Also write each cleaned dataset to this directory
        #[arg(long)]
        export_dir: Option<PathBuf>,

        /// csv or parquet
        #[arg(long)]
        export_format: Option<ExportFormat>,

        /// Gzip exported CSV files
        #[arg(long)]
        compress: bool,

        /// Root directory for dated log files
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Log filter used when RUST_LOG is unset
        #[arg(long)]
        log_level: Option<String>,
    },

    /// List tables and row counts
    Tables {
        #[arg(long, default_value = DEFAULT_DATABASE)]
        database: PathBuf,

        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the first rows of a table
    Preview {
        table: String,

        #[arg(long, default_value = DEFAULT_DATABASE)]
        database: PathBuf,

        #[arg(long, short = 'n', default_value_t = 5)]
        limit: usize,

        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Retention, churn and visit frequency by age group
    Donors {
        /// One of 20-29, 30-39, 40-49, 50-59, 60-69, 70-79, 80+
        #[arg(long)]
        age_group: Option<AgeGroup>,

        /// Granular visit table
        #[arg(long, default_value = "ds_data_granular")]
        table: String,

        #[arg(long, default_value = DEFAULT_DATABASE)]
        database: PathBuf,

        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Yearly totals for one state or facility
    Activity {
        /// Table to roll up, e.g. donations_state
        table: String,

        /// Entity column, e.g. state or hospital
        #[arg(long)]
        by: String,

        /// Entity value; omit to list the available entities
        #[arg(long)]
        entity: Option<String>,

        /// First day of the range (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day of the range (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        #[arg(long, default_value = DEFAULT_DATABASE)]
        database: PathBuf,

        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
}

fn dispatch(command: Commands) -> Result<(), CliError> {
    // `run` installs its own file logger from the pipeline config
    if !matches!(command, Commands::Run { .. }) {
        logging::init_console("warn")?;
    }

    match command {
        Commands::Run {
            config,
            database,
            sources,
            date_columns,
            skip_date_validation,
            failure_policy,
            export_dir,
            export_format,
            compress,
            log_dir,
            log_level,
        } => handle_pipeline_run(&PipelineRunArgs {
            config,
            database,
            sources,
            date_columns,
            skip_date_validation,
            failure_policy,
            export_dir,
            export_format,
            compress,
            log_dir,
            log_level,
        }),
        Commands::Tables { database, format } => handle_tables(&TablesArgs { database, format }),
        Commands::Preview {
            table,
            database,
            limit,
            format,
        } => handle_preview(&PreviewArgs {
            database,
            table,
            limit,
            format,
        }),
        Commands::Donors {
            age_group,
            table,
            database,
            format,
        } => handle_donors(&DonorsArgs {
            database,
            table,
            age_group,
            format,
        }),
        Commands::Activity {
            table,
            by,
            entity,
            from,
            to,
            database,
            format,
        } => handle_activity(&ActivityArgs {
            database,
            table,
            by,
            entity,
            from,
            to,
            format,
        }),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dispatch(cli.command).map_err(|e| anyhow::anyhow!(e.user_message()))
}
