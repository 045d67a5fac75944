//! Cleaning tests over datasets decoded from raw CSV

use blood_donation_pipeline::dataset::Cell;
use blood_donation_pipeline::source::decode_bytes;
use blood_donation_pipeline::{Cleaner, ColumnData, ColumnType, Dataset};
use bytes::Bytes;
use chrono::{NaiveDate, NaiveDateTime};

const VENDOR_CSV: &str = "\
VendorID,SomeDateColumn,DuplicateColumn
1,2021-01-01,1
2,not a date,1
3,2021-03-01,2
-1,2021-04-01,3
-2,2021-05-01,3
";

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn decode(csv: &str) -> Dataset {
    let (_, dataset) = decode_bytes("test.csv", Bytes::from(csv.to_string())).unwrap();
    dataset
}

fn cleaner() -> Cleaner {
    Cleaner::standard(Some(vec!["some_date_column".to_string()]), now())
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn test_vendor_scenario() {
    let (cleaned, records) = cleaner().clean(decode(VENDOR_CSV));

    assert_eq!(
        cleaned.column_names(),
        vec!["vendor_id", "some_date_column", "duplicate_column"]
    );
    assert_eq!(cleaned.num_rows(), 5);
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.rows_removed() == 0));
    assert_eq!(cleaner_stage(&records, "validate_integers").values_nulled(), 2);
    assert_eq!(cleaner_stage(&records, "validate_dates").values_nulled(), 1);

    assert_eq!(
        cleaned.column("vendor_id").unwrap().data,
        ColumnData::Int(vec![Some(1), Some(2), Some(3), None, None])
    );
    assert_eq!(
        cleaned.column("some_date_column").unwrap().data,
        ColumnData::Date(vec![
            Some(date("2021-01-01")),
            None,
            Some(date("2021-03-01")),
            Some(date("2021-04-01")),
            Some(date("2021-05-01")),
        ])
    );
    assert_eq!(
        cleaned.column("duplicate_column").unwrap().data,
        ColumnData::Int(vec![Some(1), Some(1), Some(2), Some(3), Some(3)])
    );
}

#[test]
fn test_duplicate_row_is_removed() {
    let with_duplicate = format!("{VENDOR_CSV}1,2021-01-01,1\n");
    let (cleaned, records) = cleaner().clean(decode(&with_duplicate));

    assert_eq!(cleaned.num_rows(), 5);
    let dedupe = records.iter().find(|r| r.stage == "deduplicate").unwrap();
    assert_eq!(dedupe.rows_in, 6);
    assert_eq!(dedupe.rows_removed(), 1);
}

#[test]
fn test_rows_equal_after_nulling_are_deduplicated() {
    // -1 and -2 both become null, leaving two identical rows
    let csv = "id,date\n-1,2020-01-01\n-2,2020-01-01\n";
    let cleaner = Cleaner::standard(Some(vec!["date".to_string()]), now());
    let (cleaned, _) = cleaner.clean(decode(csv));
    assert_eq!(cleaned.num_rows(), 1);
    assert_eq!(cleaned.row(0)[0], Cell::Null);
}

#[test]
fn test_cleaning_is_idempotent() {
    let (once, _) = cleaner().clean(decode(VENDOR_CSV));
    let (twice, records) = cleaner().clean(once.clone());

    assert_eq!(once, twice);
    assert!(records.iter().all(|r| r.rows_removed() == 0));
}

#[test]
fn test_no_negative_integers_or_future_dates_survive() {
    let csv = "\
donor_id,visit_date,Units
a,2023-12-31,-4
b,2024-01-02,2
c,2023-06-01 09:30:00,1
d,2030-01-01,-1
";
    let cleaner = Cleaner::standard(Some(vec!["visit_date".to_string()]), now());
    let (cleaned, records) = cleaner.clean(decode(csv));

    assert_eq!(cleaned.num_rows(), 2);
    let dates = cleaner_stage(&records, "validate_dates");
    assert_eq!(dates.rows_removed(), 2);

    let visit = cleaned.column("visit_date").unwrap();
    assert_eq!(visit.data.column_type(), ColumnType::Timestamp);
    match &visit.data {
        ColumnData::Timestamp(values) => {
            assert!(values.iter().flatten().all(|t| *t <= now()));
        }
        other => panic!("unexpected column data {other:?}"),
    }

    match &cleaned.column("units").unwrap().data {
        ColumnData::Int(values) => {
            assert_eq!(values, &vec![None, Some(1)]);
        }
        other => panic!("unexpected column data {other:?}"),
    }
}

#[test]
fn test_skipped_date_validation_keeps_text() {
    let cleaner = Cleaner::standard(None, now());
    let (cleaned, records) = cleaner.clean(decode(VENDOR_CSV));

    let dates = cleaner_stage(&records, "validate_dates");
    assert!(dates.is_skipped());
    assert_eq!(
        cleaned.column("some_date_column").unwrap().data.column_type(),
        ColumnType::Text
    );
}

fn cleaner_stage<'a>(
    records: &'a [blood_donation_pipeline::StageRecord],
    name: &str,
) -> &'a blood_donation_pipeline::StageRecord {
    records
        .iter()
        .find(|r| r.stage == name)
        .unwrap_or_else(|| panic!("missing stage {name}"))
}
