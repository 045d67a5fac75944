//! Donor visit analytics over the granular visit table
//!
//! Every query shares one base: visits with a donor id, birth year and visit
//! date, each tagged with the donor's age band at that visit. Window
//! functions (next visit, rolling gap totals) always run over a donor's full
//! history; bands are applied afterwards, so a visit at 19 still provides the
//! "previous visit" for one at 20.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::age_group::AgeGroup;
use super::error::QueryError;
use crate::store::{AnalyticsStore, quote_ident};

/// Location of the donor visit table and its columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisitTable {
    pub table: String,
    pub donor_id: String,
    /// Birth year as an integer
    pub birth_year: String,
    pub visit_date: String,
}

impl Default for VisitTable {
    fn default() -> Self {
        Self {
            table: "ds_data_granular".to_string(),
            donor_id: "donor_id".to_string(),
            birth_year: "birth_date".to_string(),
            visit_date: "visit_date".to_string(),
        }
    }
}

/// One value per age band
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeGroupValue {
    pub age_group: AgeGroup,
    pub value: f64,
}

/// Average retention of cohorts in their n-th year (1 = first donation year)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionPoint {
    pub age_group: AgeGroup,
    pub nth_year: i64,
    pub average_retention_rate: f64,
}

/// All donor metrics for one age band
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonorSummary {
    pub age_group: AgeGroup,
    pub average_months_between_visits: Option<f64>,
    pub average_months_to_churn: Option<f64>,
    pub average_donations_per_donor: Option<f64>,
    pub retention: Vec<RetentionPoint>,
}

/// Cohort, churn and frequency queries over donor visits
pub struct DonorAnalytics<'a> {
    store: &'a AnalyticsStore,
    visits: VisitTable,
}

impl<'a> DonorAnalytics<'a> {
    /// Use the default granular visit table
    pub fn new(store: &'a AnalyticsStore) -> Result<Self, QueryError> {
        Self::with_table(store, VisitTable::default())
    }

    /// Use a custom visit table, checking that it has the expected columns
    pub fn with_table(store: &'a AnalyticsStore, visits: VisitTable) -> Result<Self, QueryError> {
        let columns = store.column_names(&visits.table)?;
        for column in [&visits.donor_id, &visits.birth_year, &visits.visit_date] {
            if !columns.contains(column) {
                return Err(QueryError::MissingColumn {
                    table: visits.table.clone(),
                    column: column.clone(),
                });
            }
        }
        Ok(Self { store, visits })
    }

    pub fn visit_table(&self) -> &VisitTable {
        &self.visits
    }

    /// Shared CTEs: `visits` (clean rows) and `aged` (with age band)
    fn base_ctes(&self) -> String {
        let donor = quote_ident(&self.visits.donor_id);
        let birth = quote_ident(&self.visits.birth_year);
        let visit = quote_ident(&self.visits.visit_date);
        let table = quote_ident(&self.visits.table);

        format!(
            "visits AS (
                SELECT
                    {donor} AS donor_id,
                    CAST({birth} AS BIGINT) AS birth_year,
                    CAST({visit} AS DATE) AS visit_date
                FROM {table}
                WHERE {donor} IS NOT NULL AND {birth} IS NOT NULL AND {visit} IS NOT NULL
            ),
            aged AS (
                SELECT
                    *,
                    year(visit_date) - birth_year AS age,
                    {label} AS age_group,
                    {order} AS age_group_order
                FROM visits
            )",
            label = AgeGroup::sql_label_case("(year(visit_date) - birth_year)"),
            order = AgeGroup::sql_order_case("(year(visit_date) - birth_year)"),
        )
    }

    fn months_between_sql(&self) -> String {
        format!(
            "WITH {base},
            gaps AS (
                SELECT
                    age_group,
                    age_group_order,
                    date_diff('day', visit_date,
                        LEAD(visit_date) OVER (PARTITION BY donor_id ORDER BY visit_date)
                    ) AS days_between
                FROM aged
            )
            SELECT age_group, ABS(FLOOR(AVG(days_between) / 30)) AS value
            FROM gaps
            WHERE age_group IS NOT NULL AND days_between IS NOT NULL
            GROUP BY age_group, age_group_order
            ORDER BY age_group_order",
            base = self.base_ctes()
        )
    }

    fn months_to_churn_sql(&self) -> String {
        format!(
            "WITH {base},
            gaps AS (
                SELECT
                    donor_id,
                    visit_date,
                    age_group,
                    age_group_order,
                    LEAD(visit_date) OVER w AS next_visit_date,
                    date_diff('day', visit_date, LEAD(visit_date) OVER w) AS days_between
                FROM aged
                WINDOW w AS (PARTITION BY donor_id ORDER BY visit_date)
            ),
            rolling AS (
                SELECT
                    *,
                    CAST(SUM(days_between) OVER (
                        PARTITION BY donor_id ORDER BY visit_date
                        ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW
                    ) AS DOUBLE) AS rolling_days
                FROM gaps
            ),
            churns AS (
                SELECT *
                FROM rolling
                WHERE next_visit_date IS NOT NULL
                  AND next_visit_date > make_date(year(visit_date) + 2, 12, 31)
            )
            SELECT age_group, FLOOR(AVG(rolling_days / 30)) AS value
            FROM churns
            WHERE age_group IS NOT NULL
            GROUP BY age_group, age_group_order
            ORDER BY age_group_order",
            base = self.base_ctes()
        )
    }

    fn donations_per_donor_sql(&self) -> String {
        format!(
            "WITH {base},
            per_donor AS (
                SELECT donor_id, age_group, age_group_order, COUNT(*) AS n_donations
                FROM aged
                WHERE age_group IS NOT NULL
                GROUP BY donor_id, age_group, age_group_order
            )
            SELECT age_group, ROUND(AVG(n_donations), 2) AS value
            FROM per_donor
            GROUP BY age_group, age_group_order
            ORDER BY age_group_order",
            base = self.base_ctes()
        )
    }

    fn retention_sql(&self) -> String {
        format!(
            "WITH {base},
            firsts AS (
                SELECT
                    donor_id,
                    year(MIN(visit_date)) AS first_year,
                    year(MIN(visit_date)) - MIN(birth_year) AS first_age
                FROM visits
                GROUP BY donor_id
            ),
            assigned AS (
                SELECT
                    donor_id,
                    first_year,
                    {label} AS age_group,
                    {order} AS age_group_order
                FROM firsts
            ),
            cohort_sizes AS (
                SELECT first_year, age_group, COUNT(*) AS initial_donors
                FROM assigned
                WHERE age_group IS NOT NULL
                GROUP BY first_year, age_group
            ),
            active AS (
                SELECT
                    a.first_year,
                    a.age_group,
                    a.age_group_order,
                    year(v.visit_date) AS donation_year,
                    COUNT(DISTINCT v.donor_id) AS n_donors
                FROM visits v
                JOIN assigned a ON v.donor_id = a.donor_id
                WHERE a.age_group IS NOT NULL
                GROUP BY a.first_year, a.age_group, a.age_group_order, year(v.visit_date)
            ),
            retention AS (
                SELECT
                    ac.age_group,
                    ac.age_group_order,
                    ac.donation_year - ac.first_year + 1 AS nth_year,
                    ROUND(CAST(ac.n_donors AS DOUBLE) / cs.initial_donors * 100, 2) AS rate
                FROM active ac
                JOIN cohort_sizes cs
                  ON ac.first_year = cs.first_year AND ac.age_group = cs.age_group
            )
            SELECT age_group, nth_year, ROUND(AVG(rate), 2) AS average_retention_rate
            FROM retention
            WHERE nth_year BETWEEN 1 AND 10
            GROUP BY age_group, age_group_order, nth_year
            ORDER BY age_group_order, nth_year",
            base = self.base_ctes(),
            label = AgeGroup::sql_label_case("first_age"),
            order = AgeGroup::sql_order_case("first_age"),
        )
    }

    fn series(&self, name: &str, sql: &str) -> Result<Vec<AgeGroupValue>, QueryError> {
        debug!(query = name, "Running bucketed query");
        let mut stmt = self.store.connection().prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<f64>>(1)?))
        })?;

        let mut values = Vec::new();
        for row in rows {
            let (label, value) = row?;
            if let (Some(age_group), Some(value)) = (AgeGroup::from_label(&label), value) {
                values.push(AgeGroupValue { age_group, value });
            }
        }
        Ok(values)
    }

    fn single(&self, name: &str, sql: &str, group: AgeGroup) -> Result<Option<f64>, QueryError> {
        debug!(query = name, age_group = %group, "Running bucketed query");
        let wrapped = format!("SELECT value FROM ({sql}) WHERE age_group = ?1");
        let mut stmt = self.store.connection().prepare(&wrapped)?;
        let mut rows = stmt.query_map([group.label()], |row| row.get::<_, Option<f64>>(0))?;
        match rows.next() {
            Some(row) => Ok(row?),
            None => Ok(None),
        }
    }

    /// Average gap between consecutive visits in whole months (30-day)
    ///
    /// A gap belongs to the band of the earlier visit; a donor's last visit
    /// has no gap and does not count.
    pub fn average_months_between_visits(&self, group: AgeGroup) -> Result<Option<f64>, QueryError> {
        self.single("months_between_visits", &self.months_between_sql(), group)
    }

    pub fn average_months_between_visits_by_group(&self) -> Result<Vec<AgeGroupValue>, QueryError> {
        self.series("months_between_visits", &self.months_between_sql())
    }

    /// Average months a donor kept giving before churning
    ///
    /// A visit is a churn event when the next visit comes after 31 December
    /// two calendar years later. The months counted are the donor's running
    /// total of visit gaps up to and including that event. A final visit
    /// with no later visit is never a churn event.
    pub fn average_months_to_churn(&self, group: AgeGroup) -> Result<Option<f64>, QueryError> {
        self.single("months_to_churn", &self.months_to_churn_sql(), group)
    }

    pub fn average_months_to_churn_by_group(&self) -> Result<Vec<AgeGroupValue>, QueryError> {
        self.series("months_to_churn", &self.months_to_churn_sql())
    }

    /// Mean number of visits per donor within the band, 2 decimals
    pub fn average_donations_per_donor(&self, group: AgeGroup) -> Result<Option<f64>, QueryError> {
        self.single("donations_per_donor", &self.donations_per_donor_sql(), group)
    }

    pub fn average_donations_per_donor_by_group(&self) -> Result<Vec<AgeGroupValue>, QueryError> {
        self.series("donations_per_donor", &self.donations_per_donor_sql())
    }

    /// Cohort retention by year since first donation, years 1 to 10
    ///
    /// Cohorts are donors sharing a first-donation year and the age band at
    /// that first donation. Each cohort's yearly rate is the share of its
    /// donors active that year; rates are averaged across cohorts.
    pub fn retention_by_nth_year(&self, group: AgeGroup) -> Result<Vec<RetentionPoint>, QueryError> {
        let sql = format!(
            "SELECT age_group, nth_year, average_retention_rate
             FROM ({}) WHERE age_group = ?1 ORDER BY nth_year",
            self.retention_sql()
        );
        self.retention_points(&sql, &[&group.label()])
    }

    /// Retention curves for every band, ordered by band then year
    pub fn retention_all(&self) -> Result<Vec<RetentionPoint>, QueryError> {
        self.retention_points(&self.retention_sql(), &[])
    }

    fn retention_points(
        &self,
        sql: &str,
        params: &[&dyn duckdb::ToSql],
    ) -> Result<Vec<RetentionPoint>, QueryError> {
        debug!(query = "retention", "Running cohort query");
        let mut stmt = self.store.connection().prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;

        let mut points = Vec::new();
        for row in rows {
            let (label, nth_year, average_retention_rate) = row?;
            if let Some(age_group) = AgeGroup::from_label(&label) {
                points.push(RetentionPoint {
                    age_group,
                    nth_year,
                    average_retention_rate,
                });
            }
        }
        Ok(points)
    }

    /// Every metric for one band
    pub fn summary(&self, group: AgeGroup) -> Result<DonorSummary, QueryError> {
        Ok(DonorSummary {
            age_group: group,
            average_months_between_visits: self.average_months_between_visits(group)?,
            average_months_to_churn: self.average_months_to_churn(group)?,
            average_donations_per_donor: self.average_donations_per_donor(group)?,
            retention: self.retention_by_nth_year(group)?,
        })
    }
}
