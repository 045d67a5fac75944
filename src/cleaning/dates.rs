//! Date parsing and future-date filtering

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::CleaningStage;
use crate::dataset::{ColumnData, Dataset};

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Every accepted format starts with a year, month and day
static DATE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}[-/]\d{1,2}[-/]\d{1,2}").expect("valid date prefix regex"));

/// A successfully parsed date cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedDate {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl ParsedDate {
    fn as_datetime(self) -> NaiveDateTime {
        match self {
            ParsedDate::Date(d) => d.and_time(NaiveTime::MIN),
            ParsedDate::DateTime(t) => t,
        }
    }
}

/// Parse a date or date-time written as text
///
/// RFC 3339 values with an offset are converted to UTC; values without an
/// offset are taken to be UTC already.
pub fn parse_date_text(text: &str) -> Option<ParsedDate> {
    let text = text.trim();
    if !DATE_PREFIX.is_match(text) {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, format) {
            return Some(ParsedDate::Date(d));
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ParsedDate::DateTime(t));
        }
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|t| ParsedDate::DateTime(t.naive_utc()))
}

/// Parse configured date columns and drop rows dated after `now`
///
/// Unparseable cells become null and their rows are kept. A row with any
/// configured date strictly later than `now` is removed entirely. `now` is a
/// UTC wall-clock time, matching how parsed values are normalized.
pub struct ValidateDates {
    columns: Option<Vec<String>>,
    now: NaiveDateTime,
}

impl ValidateDates {
    pub fn new(columns: Option<Vec<String>>, now: NaiveDateTime) -> Self {
        Self { columns, now }
    }

    fn parse_column(&self, name: &str, data: &ColumnData) -> ColumnData {
        let parsed: Vec<Option<ParsedDate>> = match data {
            ColumnData::Date(values) => values.iter().map(|v| v.map(ParsedDate::Date)).collect(),
            ColumnData::Timestamp(values) => {
                values.iter().map(|v| v.map(ParsedDate::DateTime)).collect()
            }
            ColumnData::Text(values) => {
                let parsed: Vec<Option<ParsedDate>> = values
                    .iter()
                    .map(|v| v.as_deref().and_then(parse_date_text))
                    .collect();
                let unparseable = values
                    .iter()
                    .zip(&parsed)
                    .filter(|(raw, p)| raw.is_some() && p.is_none())
                    .count();
                if unparseable > 0 {
                    debug!(column = name, unparseable, "Nulled unparseable dates");
                }
                parsed
            }
            other => {
                warn!(
                    column = name,
                    column_type = %other.column_type(),
                    "Date column holds non-date values, nulling it"
                );
                vec![None; other.len()]
            }
        };

        let has_time = parsed
            .iter()
            .any(|p| matches!(p, Some(ParsedDate::DateTime(_))));
        if has_time {
            ColumnData::Timestamp(parsed.into_iter().map(|p| p.map(ParsedDate::as_datetime)).collect())
        } else {
            ColumnData::Date(
                parsed
                    .into_iter()
                    .map(|p| match p {
                        Some(ParsedDate::Date(d)) => Some(d),
                        _ => None,
                    })
                    .collect(),
            )
        }
    }
}

impl CleaningStage for ValidateDates {
    fn name(&self) -> &'static str {
        "validate_dates"
    }

    fn skip_reason(&self) -> Option<String> {
        match &self.columns {
            None => Some("no date columns configured".to_string()),
            Some(_) => None,
        }
    }

    fn apply(&self, mut dataset: Dataset) -> Dataset {
        let Some(names) = &self.columns else {
            return dataset;
        };

        let mut keep = vec![true; dataset.num_rows()];
        let today = self.now.date();

        for name in names {
            let Some(column) = dataset.column_mut(name) else {
                continue;
            };
            column.data = self.parse_column(name, &column.data);

            match &column.data {
                ColumnData::Date(values) => {
                    for (k, v) in keep.iter_mut().zip(values) {
                        if v.is_some_and(|d| d > today) {
                            *k = false;
                        }
                    }
                }
                ColumnData::Timestamp(values) => {
                    for (k, v) in keep.iter_mut().zip(values) {
                        if v.is_some_and(|t| t > self.now) {
                            *k = false;
                        }
                    }
                }
                _ => {}
            }
        }

        let removed = dataset.retain_rows(&keep);
        if removed > 0 {
            debug!(dataset = dataset.name(), removed, "Dropped future-dated rows");
        }
        dataset
    }
}
