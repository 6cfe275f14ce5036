use clap::Parser;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::config::{PipelineConfig, StatusFilter, View};
use crate::error::{DashboardError, Result};
use crate::period::YearMonth;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Subscription analytics over CSV and spreadsheet exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "subs-dashboard",
    about = "Subscription analytics over CSV and spreadsheet exports",
    version
)]
pub struct Settings {
    /// Export files or directories to load (CSV, XLSX, XLS, ODS)
    pub inputs: Vec<PathBuf>,

    /// Status values to include (case-insensitive, comma separated)
    #[arg(long = "status", value_delimiter = ',', default_value = "ACTIVE")]
    pub statuses: Vec<String>,

    /// Earliest month kept in time series (YYYY-MM)
    #[arg(long)]
    pub start_month: Option<String>,

    /// Views to compute
    #[arg(
        long,
        value_delimiter = ',',
        default_values = ["state", "city", "overall", "by-type"],
        value_parser = ["state", "city", "overall", "by-type", "city-map"]
    )]
    pub views: Vec<String>,

    /// Number of groups kept in geography views
    #[arg(long, default_value = "20", value_parser = clap::value_parser!(u32).range(1..))]
    pub top: u32,

    /// Centred rolling-mean window in months (odd)
    #[arg(long, default_value = "3")]
    pub smoothing_window: usize,

    /// Disable the smoothed series
    #[arg(long)]
    pub no_smoothing: bool,

    /// Apply the status filter to the time series too
    #[arg(long)]
    pub filter_time_series: bool,

    /// Worksheet to read from spreadsheet inputs (first sheet when omitted)
    #[arg(long)]
    pub sheet: Option<String>,

    /// CSV of city,latitude,longitude used by the city-map view
    #[arg(long)]
    pub city_coordinates: Option<PathBuf>,

    /// Minimum delay between geocoding calls in milliseconds
    #[arg(long, default_value = "0")]
    pub geocode_interval_ms: u64,

    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,

    /// Logging level
    #[arg(long, default_value = "WARNING", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments and apply derived overrides.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os().collect())
    }

    /// Same as [`Settings::load`] but with an explicit argument list.
    pub fn load_from_args(args: Vec<std::ffi::OsString>) -> Self {
        Self::resolve(Settings::parse_from(args))
    }

    /// Apply the `--debug` flag.
    fn resolve(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// `true` when no input has been supplied yet.
    pub fn awaiting_input(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Build the pipeline parameters described by these settings.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let start_month = self
            .start_month
            .as_deref()
            .map(str::parse::<YearMonth>)
            .transpose()?;

        let views = self
            .views
            .iter()
            .map(|v| v.parse::<View>())
            .collect::<Result<BTreeSet<View>>>()?;

        let smoothing_window = if self.no_smoothing {
            None
        } else {
            Some(self.smoothing_window)
        };

        let config = PipelineConfig {
            statuses: StatusFilter::new(&self.statuses),
            start_month,
            views,
            top_n: self.top as usize,
            smoothing_window,
            filter_time_series: self.filter_time_series,
        };
        config.validate()?;

        if config.includes(View::CityMap) && self.city_coordinates.is_none() {
            return Err(DashboardError::Config(
                "the city-map view needs --city-coordinates".to_string(),
            ));
        }

        Ok(config)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Settings {
        let mut full = vec!["subs-dashboard"];
        full.extend_from_slice(args);
        Settings::load_from_args(full.into_iter().map(Into::into).collect())
    }

    #[test]
    fn test_settings_default_values() {
        let settings = parse(&[]);

        assert!(settings.inputs.is_empty());
        assert!(settings.awaiting_input());
        assert_eq!(settings.statuses, vec!["ACTIVE"]);
        assert!(settings.start_month.is_none());
        assert_eq!(settings.views, vec!["state", "city", "overall", "by-type"]);
        assert_eq!(settings.top, 20);
        assert_eq!(settings.smoothing_window, 3);
        assert!(!settings.no_smoothing);
        assert!(!settings.filter_time_series);
        assert_eq!(settings.geocode_interval_ms, 0);
        assert_eq!(settings.format, "table");
        assert_eq!(settings.log_level, "WARNING");
        assert!(!settings.debug);
    }

    #[test]
    fn test_settings_inputs_and_statuses() {
        let settings = parse(&["a.csv", "data/", "--status", "active,suspended"]);
        assert_eq!(
            settings.inputs,
            vec![PathBuf::from("a.csv"), PathBuf::from("data/")]
        );
        assert_eq!(settings.statuses, vec!["active", "suspended"]);
    }

    #[test]
    fn test_settings_debug_overrides_log_level() {
        let settings = parse(&["--debug"]);
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_pipeline_config_defaults() {
        let config = parse(&["a.csv"]).pipeline_config().unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_pipeline_config_explicit_values() {
        let config = parse(&[
            "a.csv",
            "--start-month",
            "2019-01",
            "--views",
            "overall,by-type",
            "--top",
            "5",
            "--smoothing-window",
            "5",
            "--filter-time-series",
        ])
        .pipeline_config()
        .unwrap();

        assert_eq!(config.start_month, Some("2019-01".parse().unwrap()));
        assert!(config.includes(View::Overall));
        assert!(config.includes(View::ByType));
        assert!(!config.includes(View::State));
        assert_eq!(config.top_n, 5);
        assert_eq!(config.smoothing_window, Some(5));
        assert!(config.filter_time_series);
    }

    #[test]
    fn test_pipeline_config_no_smoothing() {
        let config = parse(&["a.csv", "--no-smoothing"]).pipeline_config().unwrap();
        assert!(config.smoothing_window.is_none());
    }

    #[test]
    fn test_pipeline_config_bad_month() {
        let err = parse(&["a.csv", "--start-month", "2019"])
            .pipeline_config()
            .unwrap_err();
        assert!(matches!(err, DashboardError::InvalidMonth(_)));
    }

    #[test]
    fn test_pipeline_config_city_map_needs_coordinates() {
        let settings = parse(&["a.csv", "--views", "city-map"]);
        assert!(matches!(
            settings.pipeline_config(),
            Err(DashboardError::Config(_))
        ));

        let settings = parse(&[
            "a.csv",
            "--views",
            "city-map",
            "--city-coordinates",
            "coords.csv",
        ]);
        assert!(settings.pipeline_config().is_ok());
    }

    #[test]
    fn test_settings_rejects_unknown_view() {
        let result = Settings::try_parse_from(["subs-dashboard", "--views", "pie"]);
        assert!(result.is_err());
    }
}
