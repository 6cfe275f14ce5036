//! Calendar-month buckets.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DashboardError;

/// A year-month bucket. Two timestamps in the same calendar month map to the
/// same value regardless of day or time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Build a bucket, returning `None` when `month` is outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Truncate a timestamp to its month.
    pub fn from_datetime(ts: &NaiveDateTime) -> Self {
        Self {
            year: ts.year(),
            month: ts.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following calendar month.
    pub fn succ(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Every month from `start` to `end`, both inclusive. Empty when
    /// `start > end`.
    pub fn range_inclusive(start: YearMonth, end: YearMonth) -> Vec<YearMonth> {
        let mut months = Vec::new();
        let mut current = start;
        while current <= end {
            months.push(current);
            current = current.succ();
        }
        months
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = DashboardError;

    /// Accepts `YYYY-MM` (and the `YYYY-M` short form).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DashboardError::InvalidMonth(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        YearMonth::new(year, month).ok_or_else(invalid)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ym(s: &str) -> YearMonth {
        s.parse().unwrap()
    }

    #[test]
    fn test_same_month_same_bucket() {
        let a = NaiveDate::from_ymd_opt(2020, 1, 15)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let b = NaiveDate::from_ymd_opt(2020, 1, 31)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        assert_eq!(YearMonth::from_datetime(&a), YearMonth::from_datetime(&b));
        assert_eq!(YearMonth::from_datetime(&a).to_string(), "2020-01");
    }

    #[test]
    fn test_succ_wraps_year() {
        assert_eq!(ym("2019-12").succ(), ym("2020-01"));
        assert_eq!(ym("2020-06").succ(), ym("2020-07"));
    }

    #[test]
    fn test_range_inclusive_spans_year_boundary() {
        let months = YearMonth::range_inclusive(ym("2019-11"), ym("2020-02"));
        let keys: Vec<String> = months.iter().map(|m| m.to_string()).collect();
        assert_eq!(keys, vec!["2019-11", "2019-12", "2020-01", "2020-02"]);
    }

    #[test]
    fn test_range_inclusive_single_and_empty() {
        assert_eq!(
            YearMonth::range_inclusive(ym("2020-05"), ym("2020-05")).len(),
            1
        );
        assert!(YearMonth::range_inclusive(ym("2020-05"), ym("2020-04")).is_empty());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("2020-13".parse::<YearMonth>().is_err());
        assert!("2020-00".parse::<YearMonth>().is_err());
        assert!("20-01".parse::<YearMonth>().is_err());
        assert!("January".parse::<YearMonth>().is_err());
        assert_eq!(ym("2020-3").to_string(), "2020-03");
    }

    #[test]
    fn test_ordering() {
        assert!(ym("2019-12") < ym("2020-01"));
        assert!(ym("2020-02") > ym("2020-01"));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&ym("2021-04")).unwrap();
        assert_eq!(json, "\"2021-04\"");
        let back: YearMonth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ym("2021-04"));
    }
}
