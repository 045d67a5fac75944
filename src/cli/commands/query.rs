//! CLI commands that read the analytics store

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::CliError;
use crate::output::{OutputFormat, format_table, json_cell, optional_number, print_json};
use blood_donation_pipeline::{
    AgeGroup, AgeGroupValue, AnalyticsStore, DateRange, DonationActivity, DonorAnalytics,
    RetentionPoint, VisitTable, YearlyTotals,
};

/// Arguments for the `tables` command
pub struct TablesArgs {
    pub database: PathBuf,
    pub format: OutputFormat,
}

/// Arguments for the `preview` command
pub struct PreviewArgs {
    pub database: PathBuf,
    pub table: String,
    pub limit: usize,
    pub format: OutputFormat,
}

/// Arguments for the `donors` command
pub struct DonorsArgs {
    pub database: PathBuf,
    /// Granular visit table name
    pub table: String,
    /// Restrict to one band; all bands when `None`
    pub age_group: Option<AgeGroup>,
    pub format: OutputFormat,
}

/// Arguments for the `activity` command
pub struct ActivityArgs {
    pub database: PathBuf,
    pub table: String,
    /// Entity column, e.g. `state` or `hospital`
    pub by: String,
    /// Entity to roll up; lists entities when `None`
    pub entity: Option<String>,
    pub from: Option<chrono::NaiveDate>,
    pub to: Option<chrono::NaiveDate>,
    pub format: OutputFormat,
}

#[derive(Serialize)]
struct TableInfo {
    name: String,
    rows: i64,
}

/// Handle the `tables` command
pub fn handle_tables(args: &TablesArgs) -> Result<(), CliError> {
    let store = AnalyticsStore::open_read_only(&args.database)?;

    let mut tables = Vec::new();
    for name in store.table_names()? {
        let rows = store.row_count(&name)?;
        tables.push(TableInfo { name, rows });
    }

    match args.format {
        OutputFormat::Json => print_json(&tables)?,
        OutputFormat::Table => {
            if tables.is_empty() {
                println!("No tables in {}", args.database.display());
                return Ok(());
            }
            let rows: Vec<Vec<String>> = tables
                .iter()
                .map(|t| vec![t.name.clone(), t.rows.to_string()])
                .collect();
            print!("{}", format_table(&["table", "rows"], &rows));
        }
    }
    Ok(())
}

/// Handle the `preview` command
pub fn handle_preview(args: &PreviewArgs) -> Result<(), CliError> {
    let store = AnalyticsStore::open_read_only(&args.database)?;
    let rows = store.preview(&args.table, args.limit)?;

    match args.format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Table => {
            let columns = store.column_names(&args.table)?;
            let headers: Vec<&str> = columns.iter().map(String::as_str).collect();
            let cells: Vec<Vec<String>> = rows
                .iter()
                .map(|row| {
                    columns
                        .iter()
                        .map(|c| row.get(c).map(json_cell).unwrap_or_default())
                        .collect()
                })
                .collect();
            print!("{}", format_table(&headers, &cells));
        }
    }
    Ok(())
}

/// Per-band metrics for the `donors` command
#[derive(Serialize)]
struct DonorReport {
    average_months_between_visits: Vec<AgeGroupValue>,
    average_months_to_churn: Vec<AgeGroupValue>,
    average_donations_per_donor: Vec<AgeGroupValue>,
    retention: Vec<RetentionPoint>,
}

/// Handle the `donors` command
pub fn handle_donors(args: &DonorsArgs) -> Result<(), CliError> {
    let store = AnalyticsStore::open_read_only(&args.database)?;
    let visits = VisitTable {
        table: args.table.clone(),
        ..VisitTable::default()
    };
    let analytics = DonorAnalytics::with_table(&store, visits)?;

    if let Some(group) = args.age_group {
        let summary = analytics.summary(group)?;
        match args.format {
            OutputFormat::Json => print_json(&summary)?,
            OutputFormat::Table => {
                println!("Age group: {}", summary.age_group);
                println!(
                    "Average months between visits: {}",
                    optional_number(summary.average_months_between_visits)
                );
                println!(
                    "Average months to churn:       {}",
                    optional_number(summary.average_months_to_churn)
                );
                println!(
                    "Average donations per donor:   {}",
                    optional_number(summary.average_donations_per_donor)
                );
                println!();
                print!("{}", retention_table(&summary.retention));
            }
        }
        return Ok(());
    }

    let report = DonorReport {
        average_months_between_visits: analytics.average_months_between_visits_by_group()?,
        average_months_to_churn: analytics.average_months_to_churn_by_group()?,
        average_donations_per_donor: analytics.average_donations_per_donor_by_group()?,
        retention: analytics.retention_all()?,
    };

    match args.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = AgeGroup::ALL
                .iter()
                .map(|&group| {
                    vec![
                        group.to_string(),
                        band_value(&report.average_months_between_visits, group),
                        band_value(&report.average_months_to_churn, group),
                        band_value(&report.average_donations_per_donor, group),
                    ]
                })
                .collect();
            print!(
                "{}",
                format_table(
                    &[
                        "age_group",
                        "months_between_visits",
                        "months_to_churn",
                        "donations_per_donor"
                    ],
                    &rows
                )
            );
            println!();
            print!("{}", retention_table(&report.retention));
        }
    }
    Ok(())
}

fn band_value(values: &[AgeGroupValue], group: AgeGroup) -> String {
    optional_number(values.iter().find(|v| v.age_group == group).map(|v| v.value))
}

fn retention_table(points: &[RetentionPoint]) -> String {
    let rows: Vec<Vec<String>> = points
        .iter()
        .map(|p| {
            vec![
                p.age_group.to_string(),
                p.nth_year.to_string(),
                format!("{}", p.average_retention_rate),
            ]
        })
        .collect();
    format_table(&["age_group", "nth_year", "retention_rate"], &rows)
}

/// Handle the `activity` command
pub fn handle_activity(args: &ActivityArgs) -> Result<(), CliError> {
    let store = AnalyticsStore::open_read_only(&args.database)?;
    let activity = DonationActivity::new(&store);

    let Some(entity) = &args.entity else {
        let entities = activity.entities(&args.table, &args.by)?;
        match args.format {
            OutputFormat::Json => print_json(&entities)?,
            OutputFormat::Table => {
                for entity in entities {
                    println!("{entity}");
                }
            }
        }
        return Ok(());
    };

    let range = match (args.from, args.to) {
        (Some(start), Some(end)) => Some(DateRange::new(start, end)?),
        (None, None) => None,
        _ => {
            return Err(CliError::InvalidArgument(
                "--from and --to must be given together".to_string(),
            ));
        }
    };

    let years = activity.yearly_totals(&args.table, &args.by, entity, range)?;
    match args.format {
        OutputFormat::Json => {
            let flat: Vec<BTreeMap<String, f64>> = years.iter().map(flatten_year).collect();
            print_json(&flat)?;
        }
        OutputFormat::Table => {
            let Some(first) = years.first() else {
                println!("No rows for {} = '{}'", args.by, entity);
                return Ok(());
            };
            let mut headers = vec!["year"];
            headers.extend(first.totals.iter().map(|t| t.column.as_str()));
            let rows: Vec<Vec<String>> = years
                .iter()
                .map(|y| {
                    let mut row = vec![y.year.to_string()];
                    row.extend(y.totals.iter().map(|t| format!("{}", t.total)));
                    row
                })
                .collect();
            print!("{}", format_table(&headers, &rows));
        }
    }
    Ok(())
}

fn flatten_year(year: &YearlyTotals) -> BTreeMap<String, f64> {
    let mut map: BTreeMap<String, f64> = year
        .totals
        .iter()
        .map(|t| (t.column.clone(), t.total))
        .collect();
    map.insert("year".to_string(), year.year as f64);
    map
}
