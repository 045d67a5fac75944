//! Yearly totals over the pre-aggregated donation tables
//!
//! The state and facility tables carry one row per entity per day with a
//! count in every numeric column (blood types, donor categories, age
//! ranges). These queries roll them up to calendar years.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::error::QueryError;
use crate::store::{AnalyticsStore, quote_ident};

const NUMERIC_TYPES: [&str; 10] = [
    "TINYINT", "SMALLINT", "INTEGER", "BIGINT", "HUGEINT", "UTINYINT", "USMALLINT", "UINTEGER",
    "UBIGINT", "DOUBLE",
];

/// Inclusive date range filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, QueryError> {
        if start > end {
            return Err(QueryError::InvalidRange(format!("{start} is after {end}")));
        }
        Ok(Self { start, end })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnTotal {
    pub column: String,
    pub total: f64,
}

/// Sums of every numeric column for one calendar year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyTotals {
    pub year: i64,
    pub totals: Vec<ColumnTotal>,
}

impl YearlyTotals {
    pub fn total(&self, column: &str) -> Option<f64> {
        self.totals
            .iter()
            .find(|t| t.column == column)
            .map(|t| t.total)
    }
}

/// Yearly roll-ups of state and facility donation tables
pub struct DonationActivity<'a> {
    store: &'a AnalyticsStore,
    date_column: String,
}

impl<'a> DonationActivity<'a> {
    pub fn new(store: &'a AnalyticsStore) -> Self {
        Self {
            store,
            date_column: "date".to_string(),
        }
    }

    pub fn with_date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = column.into();
        self
    }

    fn require_column(&self, table: &str, column: &str) -> Result<(), QueryError> {
        let columns = self.store.column_names(table)?;
        if columns.iter().any(|c| c == column) {
            Ok(())
        } else {
            Err(QueryError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            })
        }
    }

    /// Distinct non-null values of `column` (states, hospitals), sorted
    pub fn entities(&self, table: &str, column: &str) -> Result<Vec<String>, QueryError> {
        self.require_column(table, column)?;
        let col = quote_ident(column);
        let sql = format!(
            "SELECT DISTINCT CAST({col} AS VARCHAR) FROM {} WHERE {col} IS NOT NULL ORDER BY 1",
            quote_ident(table)
        );
        let mut stmt = self.store.connection().prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut entities = Vec::new();
        for row in rows {
            entities.push(row?);
        }
        Ok(entities)
    }

    /// Numeric columns of a table, in table order
    pub fn numeric_columns(&self, table: &str) -> Result<Vec<String>, QueryError> {
        if !self.store.has_table(table)? {
            return Err(QueryError::MissingTable(table.to_string()));
        }
        let type_list: Vec<String> = NUMERIC_TYPES.iter().map(|t| format!("'{t}'")).collect();
        let sql = format!(
            "SELECT column_name FROM information_schema.columns
             WHERE table_schema = 'main' AND table_name = ?1
               AND (data_type IN ({}) OR data_type LIKE 'DECIMAL%')
             ORDER BY ordinal_position",
            type_list.join(", ")
        );
        let mut stmt = self.store.connection().prepare(&sql)?;
        let rows = stmt.query_map([table], |row| row.get::<_, String>(0))?;
        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }
        Ok(columns)
    }

    /// Per-year sums of every numeric column for one entity
    pub fn yearly_totals(
        &self,
        table: &str,
        entity_column: &str,
        entity: &str,
        range: Option<DateRange>,
    ) -> Result<Vec<YearlyTotals>, QueryError> {
        self.require_column(table, entity_column)?;
        self.require_column(table, &self.date_column)?;

        let columns = self.numeric_columns(table)?;
        if columns.is_empty() {
            return Ok(Vec::new());
        }

        let date = quote_ident(&self.date_column);
        let sums: Vec<String> = columns
            .iter()
            .map(|c| format!("CAST(COALESCE(SUM({}), 0) AS DOUBLE)", quote_ident(c)))
            .collect();

        let mut sql = format!(
            "SELECT year(CAST({date} AS DATE)) AS year, {}
             FROM {}
             WHERE CAST({} AS VARCHAR) = ?1 AND {date} IS NOT NULL",
            sums.join(", "),
            quote_ident(table),
            quote_ident(entity_column),
        );
        let mut params: Vec<String> = vec![entity.to_string()];
        if let Some(range) = range {
            sql.push_str(&format!(
                " AND CAST({date} AS DATE) BETWEEN CAST(?2 AS DATE) AND CAST(?3 AS DATE)"
            ));
            params.push(range.start.format("%Y-%m-%d").to_string());
            params.push(range.end.format("%Y-%m-%d").to_string());
        }
        sql.push_str(" GROUP BY 1 ORDER BY 1");

        debug!(table, entity_column, entity, "Running yearly totals query");
        let mut stmt = self.store.connection().prepare(&sql)?;
        let rows = stmt.query_map(duckdb::params_from_iter(params.iter()), |row| {
            let year: i64 = row.get(0)?;
            let mut totals = Vec::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                totals.push(ColumnTotal {
                    column: column.clone(),
                    total: row.get(i + 1)?,
                });
            }
            Ok(YearlyTotals { year, totals })
        })?;

        let mut years = Vec::new();
        for row in rows {
            years.push(row?);
        }
        Ok(years)
    }
}
