//! Parameters of the aggregation pipeline.
//!
//! The dashboard runs one configurable pipeline; the cutoff month, the set of
//! enabled views and the geography dimension are explicit parameters here.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DashboardError;
use crate::models::{GroupDimension, Record};
use crate::period::YearMonth;

/// Default status selection.
pub const DEFAULT_STATUS: &str = "ACTIVE";

/// Default truncation for geography views.
pub const DEFAULT_TOP_N: usize = 20;

/// Default centred rolling-mean window, in months.
pub const DEFAULT_SMOOTHING_WINDOW: usize = 3;

// ── View ──────────────────────────────────────────────────────────────────────

/// One aggregate view the presentation layer can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    /// Distinct accounts per state.
    State,
    /// Distinct accounts per city.
    City,
    /// Distinct accounts per month.
    Overall,
    /// Distinct accounts per month and subscription type.
    ByType,
    /// City counts with coordinates attached.
    CityMap,
}

impl View {
    pub const ALL: [View; 5] = [
        View::State,
        View::City,
        View::Overall,
        View::ByType,
        View::CityMap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            View::State => "state",
            View::City => "city",
            View::Overall => "overall",
            View::ByType => "by-type",
            View::CityMap => "city-map",
        }
    }

    /// Geography dimension for cross-sectional views.
    pub fn dimension(&self) -> Option<GroupDimension> {
        match self {
            View::State => Some(GroupDimension::State),
            View::City | View::CityMap => Some(GroupDimension::City),
            View::Overall | View::ByType => None,
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        View::ALL
            .into_iter()
            .find(|v| v.as_str() == lowered)
            .ok_or_else(|| DashboardError::UnknownView(s.to_string()))
    }
}

// ── StatusFilter ──────────────────────────────────────────────────────────────

/// Set of selected status values, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFilter {
    selected: BTreeSet<String>,
}

impl StatusFilter {
    pub fn new<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            selected: statuses
                .into_iter()
                .map(|s| s.as_ref().trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// `true` when the record's upper-cased status is selected. Records
    /// without a status never match.
    pub fn matches(&self, record: &Record) -> bool {
        record
            .status_key()
            .map(|s| self.selected.contains(&s))
            .unwrap_or(false)
    }

    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }
}

impl Default for StatusFilter {
    fn default() -> Self {
        Self::new([DEFAULT_STATUS])
    }
}

// ── PipelineConfig ────────────────────────────────────────────────────────────

/// Everything the aggregation pipeline reads besides the dataset itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub statuses: StatusFilter,
    /// Time series keep only buckets at or after this month.
    pub start_month: Option<YearMonth>,
    pub views: BTreeSet<View>,
    pub top_n: usize,
    /// Centred rolling-mean window; `None` disables smoothing.
    pub smoothing_window: Option<usize>,
    /// Apply the status filter to the time series as well as to the
    /// geography views.
    pub filter_time_series: bool,
}

impl PipelineConfig {
    pub fn includes(&self, view: View) -> bool {
        self.views.contains(&view)
    }

    /// Reject parameter combinations the aggregator cannot honour.
    pub fn validate(&self) -> Result<(), DashboardError> {
        if self.top_n == 0 {
            return Err(DashboardError::Config("top-N must be at least 1".into()));
        }
        if let Some(window) = self.smoothing_window {
            if window == 0 || window % 2 == 0 {
                return Err(DashboardError::Config(format!(
                    "smoothing window must be a positive odd number, got {}",
                    window
                )));
            }
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            statuses: StatusFilter::default(),
            start_month: None,
            views: View::ALL.into_iter().filter(|v| *v != View::CityMap).collect(),
            top_n: DEFAULT_TOP_N,
            smoothing_window: Some(DEFAULT_SMOOTHING_WINDOW),
            filter_time_series: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_status(status: Option<&str>) -> Record {
        let mut r = Record::new("1");
        r.status = status.map(str::to_string);
        r
    }

    #[test]
    fn test_status_filter_default_is_active() {
        let filter = StatusFilter::default();
        assert_eq!(filter.selected().collect::<Vec<_>>(), vec!["ACTIVE"]);
    }

    #[test]
    fn test_status_filter_case_insensitive() {
        let filter = StatusFilter::new(["active"]);
        assert!(filter.matches(&record_with_status(Some("Active"))));
        assert!(filter.matches(&record_with_status(Some("ACTIVE"))));
        assert!(!filter.matches(&record_with_status(Some("Cancelled"))));
        assert!(!filter.matches(&record_with_status(None)));
    }

    #[test]
    fn test_status_filter_does_not_mutate_record() {
        let record = record_with_status(Some("active"));
        StatusFilter::default().matches(&record);
        assert_eq!(record.status.as_deref(), Some("active"));
    }

    #[test]
    fn test_view_parse() {
        assert_eq!("state".parse::<View>().unwrap(), View::State);
        assert_eq!("By-Type".parse::<View>().unwrap(), View::ByType);
        assert_eq!("city-map".parse::<View>().unwrap(), View::CityMap);
        assert!("pie".parse::<View>().is_err());
    }

    #[test]
    fn test_view_dimension() {
        assert_eq!(View::State.dimension(), Some(GroupDimension::State));
        assert_eq!(View::CityMap.dimension(), Some(GroupDimension::City));
        assert_eq!(View::Overall.dimension(), None);
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.top_n, 20);
        assert_eq!(config.smoothing_window, Some(3));
        assert!(config.start_month.is_none());
        assert!(config.includes(View::State));
        assert!(config.includes(View::ByType));
        assert!(!config.includes(View::CityMap));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_even_window_and_zero_top() {
        let config = PipelineConfig {
            smoothing_window: Some(4),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            top_n: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
