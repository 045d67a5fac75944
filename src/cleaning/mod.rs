//! Cleaning stages applied to every dataset before it is persisted
//!
//! Stages run in a fixed order through [`Cleaner`]:
//! column-name normalization, integer validation, date validation, and
//! finally deduplication so that values nulled by validation take part in
//! the duplicate comparison.

mod columns;
mod dates;
mod dedupe;
mod integers;

pub use columns::{NormalizeColumns, normalize_column_name};
pub use dates::{ParsedDate, ValidateDates, parse_date_text};
pub use dedupe::Deduplicate;
pub use integers::ValidateIntegers;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::Dataset;

/// A single transformation over a dataset
pub trait CleaningStage {
    /// Stable stage name used in reports and logs
    fn name(&self) -> &'static str;

    /// Reason the stage will not run, if any
    fn skip_reason(&self) -> Option<String> {
        None
    }

    fn apply(&self, dataset: Dataset) -> Dataset;
}

/// What one stage did to one dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: String,
    pub rows_in: usize,
    pub rows_out: usize,
    /// Null cells before and after the stage
    pub nulls_in: usize,
    pub nulls_out: usize,
    /// Set when the stage did not run
    pub skipped: Option<String>,
}

impl StageRecord {
    pub fn rows_removed(&self) -> usize {
        self.rows_in.saturating_sub(self.rows_out)
    }

    /// Net number of values the stage turned into nulls
    pub fn values_nulled(&self) -> usize {
        self.nulls_out.saturating_sub(self.nulls_in)
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

/// Ordered list of cleaning stages
pub struct Cleaner {
    stages: Vec<Box<dyn CleaningStage>>,
}

impl Cleaner {
    /// Empty cleaner; add stages with [`Cleaner::with_stage`]
    pub fn empty() -> Self {
        Self { stages: Vec::new() }
    }

    /// The standard stage order
    ///
    /// `date_columns: None` keeps the date stage in the list but marks it
    /// skipped in the report.
    pub fn standard(date_columns: Option<Vec<String>>, now: NaiveDateTime) -> Self {
        Self::empty()
            .with_stage(NormalizeColumns)
            .with_stage(ValidateIntegers)
            .with_stage(ValidateDates::new(date_columns, now))
            .with_stage(Deduplicate)
    }

    pub fn with_stage(mut self, stage: impl CleaningStage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order
    pub fn clean(&self, mut dataset: Dataset) -> (Dataset, Vec<StageRecord>) {
        let mut records = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let rows_in = dataset.num_rows();
            let nulls_in = dataset.null_count();

            if let Some(reason) = stage.skip_reason() {
                debug!(dataset = dataset.name(), stage = stage.name(), reason = %reason, "Skipping stage");
                records.push(StageRecord {
                    stage: stage.name().to_string(),
                    rows_in,
                    rows_out: rows_in,
                    nulls_in,
                    nulls_out: nulls_in,
                    skipped: Some(reason),
                });
                continue;
            }

            dataset = stage.apply(dataset);
            let rows_out = dataset.num_rows();
            let nulls_out = dataset.null_count();
            debug!(
                dataset = dataset.name(),
                stage = stage.name(),
                rows_in,
                rows_out,
                nulls_out,
                "Stage applied"
            );
            records.push(StageRecord {
                stage: stage.name().to_string(),
                rows_in,
                rows_out,
                nulls_in,
                nulls_out,
                skipped: None,
            });
        }

        info!(
            dataset = dataset.name(),
            rows = dataset.num_rows(),
            stages = records.len(),
            "Cleaning finished"
        );
        (dataset, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Column, ColumnData};

    struct DropAll;

    impl CleaningStage for DropAll {
        fn name(&self) -> &'static str {
            "drop_all"
        }

        fn apply(&self, mut dataset: Dataset) -> Dataset {
            let mask = vec![false; dataset.num_rows()];
            dataset.retain_rows(&mask);
            dataset
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-06-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_standard_stage_order() {
        let cleaner = Cleaner::standard(Some(vec!["date".into()]), now());
        assert_eq!(
            cleaner.stage_names(),
            vec![
                "normalize_columns",
                "validate_integers",
                "validate_dates",
                "deduplicate"
            ]
        );
    }

    #[test]
    fn test_skipped_date_stage_is_reported() {
        let ds = Dataset::new(
            "t",
            vec![Column::new("A", ColumnData::Int(vec![Some(1), Some(1)]))],
        )
        .unwrap();
        let (ds, records) = Cleaner::standard(None, now()).clean(ds);

        assert_eq!(ds.num_rows(), 1);
        let dates = records.iter().find(|r| r.stage == "validate_dates").unwrap();
        assert!(dates.is_skipped());
        assert!(!records[0].is_skipped());
        assert_eq!(records[3].rows_removed(), 1);
    }

    #[test]
    fn test_records_count_nulled_values() {
        let ds = Dataset::new(
            "t",
            vec![Column::new("n", ColumnData::Int(vec![Some(-1), Some(2), None]))],
        )
        .unwrap();
        let (_, records) = Cleaner::standard(None, now()).clean(ds);

        let integers = records.iter().find(|r| r.stage == "validate_integers").unwrap();
        assert_eq!(integers.nulls_in, 1);
        assert_eq!(integers.nulls_out, 2);
        assert_eq!(integers.values_nulled(), 1);
        assert_eq!(records[0].values_nulled(), 0);
    }

    #[test]
    fn test_custom_stage() {
        let ds = Dataset::new("t", vec![Column::new("a", ColumnData::Int(vec![Some(1)]))])
            .unwrap();
        let (ds, records) = Cleaner::empty().with_stage(DropAll).clean(ds);
        assert_eq!(ds.num_rows(), 0);
        assert_eq!(records[0].rows_removed(), 1);
    }
}
