//! Embedded analytical store
//!
//! Cleaned datasets are persisted into a single DuckDB file, one table per
//! dataset. The pipeline is the only writer; query consumers open the file
//! read-only.

mod db;
mod error;

pub use db::{AnalyticsStore, quote_ident};
pub use error::StoreError;
