use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors produced by the subscription dashboard.
///
/// Row- and field-level problems never surface here: they are recovered
/// locally (see [`FieldParseError`] and [`LookupFailure`]).
#[derive(Error, Debug)]
pub enum DashboardError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source could not be parsed as tabular data.
    #[error("Failed to parse {source_name} as tabular data: {reason}")]
    MalformedSource { source_name: String, reason: String },

    /// A column needed downstream is absent from every loaded source.
    #[error("Required column '{0}' not found in any source")]
    MissingColumn(String),

    /// The load was attempted with an empty set of sources.
    #[error("No input sources supplied")]
    NoSources,

    /// The file extension does not map to a supported tabular format.
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(PathBuf),

    /// A month string did not match `YYYY-MM`.
    #[error("Invalid month '{0}': expected YYYY-MM")]
    InvalidMonth(String),

    /// A view name is not one of the recognised dashboard views.
    #[error("Unknown view: {0}")]
    UnknownView(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A report could not be serialised.
    #[error("Failed to serialise JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl DashboardError {
    /// `true` for the structural failures that abort a load attempt.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            DashboardError::FileRead { .. }
                | DashboardError::MalformedSource { .. }
                | DashboardError::MissingColumn(_)
                | DashboardError::NoSources
                | DashboardError::UnsupportedFormat(_)
        )
    }
}

/// Convenience alias used throughout the dashboard crates.
pub type Result<T> = std::result::Result<T, DashboardError>;

/// A single field value that could not be parsed.
///
/// Recovered by the normaliser, which substitutes the missing marker for
/// that field on that record only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot parse {field} value '{value}'")]
pub struct FieldParseError {
    pub field: &'static str,
    pub value: String,
}

/// A geocoding call that errored or timed out.
///
/// Recovered by the geocode cache, which reports an absent coordinate for
/// that one city.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Geocoding lookup failed for '{city}': {reason}")]
pub struct LookupFailure {
    pub city: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = DashboardError::FileRead {
            path: PathBuf::from("/data/subs.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/data/subs.csv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_malformed_source() {
        let err = DashboardError::MalformedSource {
            source_name: "january.csv".to_string(),
            reason: "found record with 3 fields, but the previous record has 5".to_string(),
        };
        assert!(err
            .to_string()
            .starts_with("Failed to parse january.csv as tabular data"));
    }

    #[test]
    fn test_error_display_missing_column() {
        let err = DashboardError::MissingColumn("AccoutID".to_string());
        assert_eq!(
            err.to_string(),
            "Required column 'AccoutID' not found in any source"
        );
    }

    #[test]
    fn test_error_display_invalid_month() {
        let err = DashboardError::InvalidMonth("2020/13".to_string());
        assert_eq!(err.to_string(), "Invalid month '2020/13': expected YYYY-MM");
    }

    #[test]
    fn test_is_load_error() {
        assert!(DashboardError::NoSources.is_load_error());
        assert!(DashboardError::MissingColumn("City".into()).is_load_error());
        assert!(!DashboardError::InvalidMonth("x".into()).is_load_error());
        assert!(!DashboardError::Config("bad".into()).is_load_error());
    }

    #[test]
    fn test_field_parse_error_display() {
        let err = FieldParseError {
            field: "LastStartDate",
            value: "not a date".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot parse LastStartDate value 'not a date'");
    }

    #[test]
    fn test_lookup_failure_display() {
        let err = LookupFailure {
            city: "Portland".to_string(),
            reason: "timed out".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Geocoding lookup failed for 'Portland': timed out"
        );
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: DashboardError = json_err.into();
        assert!(err.to_string().starts_with("Failed to serialise JSON"));
        assert!(!err.is_load_error());
    }
}
