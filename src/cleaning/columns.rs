//! Column-name normalization

use tracing::debug;

use super::CleaningStage;
use crate::dataset::Dataset;

/// Rewrite a mixed-case identifier into lower-case underscore form
///
/// An underscore goes in front of every run of upper-case letters that is
/// not at the start of the name, so acronyms stay together:
/// `vendorID` becomes `vendor_id`, not `vendor_i_d`.
pub fn normalize_column_name(name: &str) -> String {
    let trimmed = name.trim();
    let mut out = String::with_capacity(trimmed.len() + 4);
    let mut prev: Option<char> = None;

    for ch in trimmed.chars() {
        if ch.is_ascii_uppercase() {
            let starts_run = prev.is_some_and(|p| !p.is_ascii_uppercase());
            if starts_run && !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
            out.push(ch);
        } else {
            out.push('_');
        }
        prev = Some(ch);
    }
    out
}

/// Stage renaming every column with [`normalize_column_name`]
pub struct NormalizeColumns;

impl CleaningStage for NormalizeColumns {
    fn name(&self) -> &'static str {
        "normalize_columns"
    }

    fn apply(&self, mut dataset: Dataset) -> Dataset {
        for column in dataset.columns_mut() {
            let normalized = normalize_column_name(&column.name);
            if normalized != column.name {
                debug!(from = %column.name, to = %normalized, "Renamed column");
                column.name = normalized;
            }
        }
        dataset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acronym_runs() {
        assert_eq!(normalize_column_name("VendorID"), "vendor_id");
        assert_eq!(normalize_column_name("vendorID"), "vendor_id");
        assert_eq!(
            normalize_column_name("TypeApheresisPlatelet"),
            "type_apheresis_platelet"
        );
        assert_eq!(normalize_column_name("SomeDateColumn"), "some_date_column");
        assert_eq!(normalize_column_name("ID"), "id");
    }

    #[test]
    fn test_separators_and_whitespace() {
        assert_eq!(normalize_column_name("  Visit_Date "), "visit_date");
        assert_eq!(normalize_column_name("17-24"), "17_24");
        assert_eq!(normalize_column_name("blood a"), "blood_a");
        assert_eq!(normalize_column_name("Age-Group"), "age_group");
    }

    #[test]
    fn test_idempotent() {
        for name in ["VendorID", "donations_new", "SomeDateColumn", "x9Y", "a-B c"] {
            let once = normalize_column_name(name);
            assert_eq!(normalize_column_name(&once), once, "{name}");
        }
    }
}
