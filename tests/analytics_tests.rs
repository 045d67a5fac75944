//! Donor cohort and yearly activity queries over an in-memory store

use blood_donation_pipeline::{
    AgeGroup, AnalyticsStore, Column, ColumnData, Dataset, DateRange, DonationActivity,
    DonorAnalytics, QueryError, RetentionPoint, VisitTable,
};
use chrono::NaiveDate;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Visits as (donor, birth year, visit date)
fn granular_store() -> AnalyticsStore {
    let visits: &[(&str, i64, &str)] = &[
        // churns: next visit lands after the end of 2012
        ("churner", 1990, "2010-01-01"),
        ("churner", 1990, "2013-01-01"),
        // 2018 cohort of four, three return in 2019
        ("c1", 1990, "2018-03-01"),
        ("c1", 1990, "2019-03-01"),
        ("c2", 1990, "2018-03-01"),
        ("c2", 1990, "2019-03-01"),
        ("c3", 1990, "2018-03-01"),
        ("c3", 1990, "2019-03-01"),
        ("c4", 1990, "2018-03-01"),
        // 90 days between visits
        ("quarterly", 1985, "2020-01-01"),
        ("quarterly", 1985, "2020-03-31"),
        // below the youngest band
        ("teen", 2005, "2020-01-01"),
        // exactly 80
        ("elder", 1940, "2020-06-01"),
    ];

    let dataset = Dataset::new(
        "ds_data_granular",
        vec![
            Column::new(
                "donor_id",
                ColumnData::Text(visits.iter().map(|v| Some(v.0.to_string())).collect()),
            ),
            Column::new(
                "visit_date",
                ColumnData::Date(visits.iter().map(|v| Some(date(v.2))).collect()),
            ),
            Column::new(
                "birth_date",
                ColumnData::Int(visits.iter().map(|v| Some(v.1)).collect()),
            ),
        ],
    )
    .unwrap();

    let mut store = AnalyticsStore::memory().unwrap();
    store.replace_table(&dataset).unwrap();
    store
}

fn state_store() -> AnalyticsStore {
    let rows: &[(&str, &str, i64, i64)] = &[
        ("2020-01-01", "Johor", 10, 4),
        ("2020-06-01", "Johor", 5, 1),
        ("2021-01-01", "Johor", 7, 2),
        ("2020-01-01", "Selangor", 3, 3),
    ];
    let dataset = Dataset::new(
        "donations_state",
        vec![
            Column::new(
                "date",
                ColumnData::Date(rows.iter().map(|r| Some(date(r.0))).collect()),
            ),
            Column::new(
                "state",
                ColumnData::Text(rows.iter().map(|r| Some(r.1.to_string())).collect()),
            ),
            Column::new(
                "daily",
                ColumnData::Int(rows.iter().map(|r| Some(r.2)).collect()),
            ),
            Column::new(
                "blood_a",
                ColumnData::Int(rows.iter().map(|r| Some(r.3)).collect()),
            ),
        ],
    )
    .unwrap();

    let mut store = AnalyticsStore::memory().unwrap();
    store.replace_table(&dataset).unwrap();
    store
}

fn point(age_group: AgeGroup, nth_year: i64, rate: f64) -> RetentionPoint {
    RetentionPoint {
        age_group,
        nth_year,
        average_retention_rate: rate,
    }
}

#[test]
fn test_months_between_visits() {
    let store = granular_store();
    let analytics = DonorAnalytics::new(&store).unwrap();

    // (1096 + 3 * 365) / 4 days
    assert_eq!(
        analytics.average_months_between_visits(AgeGroup::Twenties).unwrap(),
        Some(18.0)
    );
    assert_eq!(
        analytics.average_months_between_visits(AgeGroup::Thirties).unwrap(),
        Some(3.0)
    );
    assert_eq!(
        analytics.average_months_between_visits(AgeGroup::EightyPlus).unwrap(),
        None
    );

    let groups: Vec<AgeGroup> = analytics
        .average_months_between_visits_by_group()
        .unwrap()
        .iter()
        .map(|v| v.age_group)
        .collect();
    assert_eq!(groups, vec![AgeGroup::Twenties, AgeGroup::Thirties]);
}

#[test]
fn test_months_to_churn() {
    let store = granular_store();
    let analytics = DonorAnalytics::new(&store).unwrap();

    assert_eq!(
        analytics.average_months_to_churn(AgeGroup::Twenties).unwrap(),
        Some(36.0)
    );
    // a 90-day gap never churns
    assert_eq!(
        analytics.average_months_to_churn(AgeGroup::Thirties).unwrap(),
        None
    );
    assert_eq!(analytics.average_months_to_churn_by_group().unwrap().len(), 1);
}

#[test]
fn test_donations_per_donor() {
    let store = granular_store();
    let analytics = DonorAnalytics::new(&store).unwrap();

    assert_eq!(
        analytics.average_donations_per_donor(AgeGroup::Twenties).unwrap(),
        Some(1.8)
    );
    assert_eq!(
        analytics.average_donations_per_donor(AgeGroup::Thirties).unwrap(),
        Some(2.0)
    );
    assert_eq!(
        analytics.average_donations_per_donor(AgeGroup::EightyPlus).unwrap(),
        Some(1.0)
    );
    assert_eq!(
        analytics.average_donations_per_donor(AgeGroup::Fifties).unwrap(),
        None
    );
}

#[test]
fn test_retention_by_nth_year() {
    let store = granular_store();
    let analytics = DonorAnalytics::new(&store).unwrap();

    assert_eq!(
        analytics.retention_by_nth_year(AgeGroup::Twenties).unwrap(),
        vec![
            point(AgeGroup::Twenties, 1, 100.0),
            point(AgeGroup::Twenties, 2, 75.0),
            point(AgeGroup::Twenties, 4, 100.0),
        ]
    );

    let all = analytics.retention_all().unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(all[3], point(AgeGroup::Thirties, 1, 100.0));
    assert_eq!(all[4], point(AgeGroup::EightyPlus, 1, 100.0));
}

#[test]
fn test_summary_collects_every_metric() {
    let store = granular_store();
    let analytics = DonorAnalytics::new(&store).unwrap();

    let summary = analytics.summary(AgeGroup::Thirties).unwrap();
    assert_eq!(summary.average_months_between_visits, Some(3.0));
    assert_eq!(summary.average_months_to_churn, None);
    assert_eq!(summary.average_donations_per_donor, Some(2.0));
    assert_eq!(summary.retention, vec![point(AgeGroup::Thirties, 1, 100.0)]);
}

#[test]
fn test_missing_table_and_column() {
    let store = AnalyticsStore::memory().unwrap();
    assert!(matches!(
        DonorAnalytics::new(&store),
        Err(QueryError::MissingTable(_))
    ));

    let store = granular_store();
    let visits = VisitTable {
        donor_id: "donor".to_string(),
        ..VisitTable::default()
    };
    match DonorAnalytics::with_table(&store, visits) {
        Err(QueryError::MissingColumn { column, .. }) => assert_eq!(column, "donor"),
        _ => panic!("expected missing column"),
    }
}

#[test]
fn test_yearly_totals() {
    let store = state_store();
    let activity = DonationActivity::new(&store);

    assert_eq!(
        activity.entities("donations_state", "state").unwrap(),
        vec!["Johor".to_string(), "Selangor".to_string()]
    );
    assert_eq!(
        activity.numeric_columns("donations_state").unwrap(),
        vec!["daily".to_string(), "blood_a".to_string()]
    );

    let years = activity
        .yearly_totals("donations_state", "state", "Johor", None)
        .unwrap();
    assert_eq!(years.len(), 2);
    assert_eq!(years[0].year, 2020);
    assert_eq!(years[0].total("daily"), Some(15.0));
    assert_eq!(years[0].total("blood_a"), Some(5.0));
    assert_eq!(years[1].year, 2021);
    assert_eq!(years[1].total("daily"), Some(7.0));
}

#[test]
fn test_yearly_totals_with_range() {
    let store = state_store();
    let activity = DonationActivity::new(&store);
    let range = DateRange::new(date("2020-03-01"), date("2021-12-31")).unwrap();

    let years = activity
        .yearly_totals("donations_state", "state", "Johor", Some(range))
        .unwrap();
    assert_eq!(years.len(), 2);
    assert_eq!(years[0].total("daily"), Some(5.0));
    assert_eq!(years[1].total("blood_a"), Some(2.0));

    assert!(matches!(
        DateRange::new(date("2021-01-01"), date("2020-01-01")),
        Err(QueryError::InvalidRange(_))
    ));
}

#[test]
fn test_unknown_entity_column() {
    let store = state_store();
    let activity = DonationActivity::new(&store);
    assert!(matches!(
        activity.entities("donations_state", "hospital"),
        Err(QueryError::MissingColumn { .. })
    ));
    assert!(matches!(
        activity.entities("donations_facility", "hospital"),
        Err(QueryError::MissingTable(_))
    ));
}
