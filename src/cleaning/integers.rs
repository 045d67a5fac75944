//! Integer sanity checks

use tracing::debug;

use super::CleaningStage;
use crate::dataset::{ColumnData, Dataset};

/// Replace negative values in integer columns with null
///
/// Counts and identifiers in the donation data are never negative. Rows are
/// kept; only the offending cell is masked.
pub struct ValidateIntegers;

impl CleaningStage for ValidateIntegers {
    fn name(&self) -> &'static str {
        "validate_integers"
    }

    fn apply(&self, mut dataset: Dataset) -> Dataset {
        for column in dataset.columns_mut() {
            if let ColumnData::Int(values) = &mut column.data {
                let mut masked = 0usize;
                for value in values.iter_mut() {
                    if value.is_some_and(|v| v < 0) {
                        *value = None;
                        masked += 1;
                    }
                }
                if masked > 0 {
                    debug!(column = %column.name, masked, "Masked negative integers");
                }
            }
        }
        dataset
    }
}
