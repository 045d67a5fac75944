//! Exact-duplicate row removal

use tracing::debug;

use super::CleaningStage;
use crate::dataset::Dataset;

/// Drop rows identical to an earlier row across every column
///
/// Nulls compare equal to nulls, so rows nulled the same way by the
/// validators collapse into one.
pub struct Deduplicate;

impl CleaningStage for Deduplicate {
    fn name(&self) -> &'static str {
        "deduplicate"
    }

    fn apply(&self, mut dataset: Dataset) -> Dataset {
        let mask = dataset.first_occurrence_mask();
        let removed = dataset.retain_rows(&mask);
        if removed > 0 {
            debug!(dataset = dataset.name(), removed, "Dropped duplicate rows");
        }
        dataset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Column, ColumnData};

    #[test]
    fn test_keeps_first_occurrence_in_order() {
        let ds = Dataset::new(
            "t",
            vec![
                Column::new("a", ColumnData::Int(vec![Some(2), None, Some(2), None, Some(1)])),
                Column::new(
                    "b",
                    ColumnData::Text(vec![
                        Some("x".into()),
                        None,
                        Some("x".into()),
                        None,
                        Some("x".into()),
                    ]),
                ),
            ],
        )
        .unwrap();

        let ds = Deduplicate.apply(ds);
        assert_eq!(
            ds.column("a").unwrap().data,
            ColumnData::Int(vec![Some(2), None, Some(1)])
        );
    }
}
