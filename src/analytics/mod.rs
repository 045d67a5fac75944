//! Read-side analytics over the persisted tables
//!
//! [`DonorAnalytics`] answers cohort, churn and visit-frequency questions
//! over the granular donor visit table. [`DonationActivity`] rolls the
//! pre-aggregated state and facility tables up to calendar years. Both
//! borrow an [`AnalyticsStore`](crate::store::AnalyticsStore), normally
//! opened read-only.

mod activity;
mod age_group;
mod donors;
mod error;

pub use activity::{ColumnTotal, DateRange, DonationActivity, YearlyTotals};
pub use age_group::AgeGroup;
pub use donors::{AgeGroupValue, DonorAnalytics, DonorSummary, RetentionPoint, VisitTable};
pub use error::QueryError;
