//! Age bands used by every bucketed aggregate

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Age band of a donor at a visit (visit year minus birth year)
///
/// Ages under 20 fall in no band and are left out of bucketed results.
/// Variant order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "20-29")]
    Twenties,
    #[serde(rename = "30-39")]
    Thirties,
    #[serde(rename = "40-49")]
    Forties,
    #[serde(rename = "50-59")]
    Fifties,
    #[serde(rename = "60-69")]
    Sixties,
    #[serde(rename = "70-79")]
    Seventies,
    #[serde(rename = "80+")]
    EightyPlus,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 7] = [
        AgeGroup::Twenties,
        AgeGroup::Thirties,
        AgeGroup::Forties,
        AgeGroup::Fifties,
        AgeGroup::Sixties,
        AgeGroup::Seventies,
        AgeGroup::EightyPlus,
    ];

    /// Inclusive lower bound and inclusive upper bound (open for 80+)
    pub fn bounds(&self) -> (i64, Option<i64>) {
        match self {
            AgeGroup::Twenties => (20, Some(29)),
            AgeGroup::Thirties => (30, Some(39)),
            AgeGroup::Forties => (40, Some(49)),
            AgeGroup::Fifties => (50, Some(59)),
            AgeGroup::Sixties => (60, Some(69)),
            AgeGroup::Seventies => (70, Some(79)),
            AgeGroup::EightyPlus => (80, None),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgeGroup::Twenties => "20-29",
            AgeGroup::Thirties => "30-39",
            AgeGroup::Forties => "40-49",
            AgeGroup::Fifties => "50-59",
            AgeGroup::Sixties => "60-69",
            AgeGroup::Seventies => "70-79",
            AgeGroup::EightyPlus => "80+",
        }
    }

    /// 1-based sort key
    pub fn order(&self) -> i64 {
        Self::ALL
            .iter()
            .position(|g| g == self)
            .map_or(0, |i| i as i64 + 1)
    }

    pub fn contains(&self, age: i64) -> bool {
        let (low, high) = self.bounds();
        age >= low && high.is_none_or(|h| age <= h)
    }

    pub fn for_age(age: i64) -> Option<AgeGroup> {
        Self::ALL.into_iter().find(|g| g.contains(age))
    }

    pub fn from_label(label: &str) -> Option<AgeGroup> {
        Self::ALL.into_iter().find(|g| g.label() == label)
    }

    fn sql_condition(&self, expr: &str) -> String {
        match self.bounds() {
            (low, Some(high)) => format!("{expr} BETWEEN {low} AND {high}"),
            (low, None) => format!("{expr} >= {low}"),
        }
    }

    /// SQL `CASE` mapping an age expression to its band label (NULL if none)
    pub fn sql_label_case(expr: &str) -> String {
        let arms: Vec<String> = Self::ALL
            .iter()
            .map(|g| format!("WHEN {} THEN '{}'", g.sql_condition(expr), g.label()))
            .collect();
        format!("CASE {} END", arms.join(" "))
    }

    /// SQL `CASE` mapping an age expression to its band order (NULL if none)
    pub fn sql_order_case(expr: &str) -> String {
        let arms: Vec<String> = Self::ALL
            .iter()
            .map(|g| format!("WHEN {} THEN {}", g.sql_condition(expr), g.order()))
            .collect();
        format!("CASE {} END", arms.join(" "))
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AgeGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s.trim()).ok_or_else(|| {
            let labels: Vec<&str> = Self::ALL.iter().map(|g| g.label()).collect();
            format!("Unknown age group '{s}'. Expected one of: {}", labels.join(", "))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_age_boundaries() {
        assert_eq!(AgeGroup::for_age(19), None);
        assert_eq!(AgeGroup::for_age(20), Some(AgeGroup::Twenties));
        assert_eq!(AgeGroup::for_age(29), Some(AgeGroup::Twenties));
        assert_eq!(AgeGroup::for_age(79), Some(AgeGroup::Seventies));
        assert_eq!(AgeGroup::for_age(80), Some(AgeGroup::EightyPlus));
        assert_eq!(AgeGroup::for_age(104), Some(AgeGroup::EightyPlus));
    }

    #[test]
    fn test_order_and_labels() {
        let orders: Vec<i64> = AgeGroup::ALL.iter().map(|g| g.order()).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6, 7]);
        for group in AgeGroup::ALL {
            assert_eq!(group.label().parse::<AgeGroup>().unwrap(), group);
        }
        assert!("<20".parse::<AgeGroup>().is_err());
    }

    #[test]
    fn test_sql_case_uses_same_bounds() {
        let case = AgeGroup::sql_label_case("age");
        assert!(case.starts_with("CASE WHEN age BETWEEN 20 AND 29 THEN '20-29'"));
        assert!(case.ends_with("WHEN age >= 80 THEN '80+' END"));
        assert!(AgeGroup::sql_order_case("age").contains("WHEN age >= 80 THEN 7"));
    }

    #[test]
    fn test_serializes_as_label() {
        assert_eq!(
            serde_json::to_string(&AgeGroup::EightyPlus).unwrap(),
            "\"80+\""
        );
    }
}
