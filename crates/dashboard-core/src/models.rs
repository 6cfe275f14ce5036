use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::period::YearMonth;

// ── Column ────────────────────────────────────────────────────────────────────

/// The canonical fields of a subscription export.
///
/// Exports spell their headers inconsistently, so every canonical field
/// accepts a list of aliases, compared after trimming, lowercasing and
/// dropping spaces, underscores and hyphens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    AccountId,
    Status,
    State,
    City,
    BillMethod,
    RateCode,
    LastStartDate,
    OriginalStartDate,
    LegacyAccountId,
}

impl Column {
    /// Columns a load must supply from at least one source.
    pub const REQUIRED: [Column; 6] = [
        Column::AccountId,
        Column::Status,
        Column::State,
        Column::City,
        Column::BillMethod,
        Column::RateCode,
    ];

    /// Date-bearing columns parsed by the normaliser.
    pub const DATES: [Column; 2] = [Column::LastStartDate, Column::OriginalStartDate];

    /// The header written when a column has to be synthesised.
    pub fn header(&self) -> &'static str {
        match self {
            Column::AccountId => "AccoutID",
            Column::Status => "Status",
            Column::State => "State",
            Column::City => "City",
            Column::BillMethod => "Bill Method",
            Column::RateCode => "Rate Code",
            Column::LastStartDate => "LastStartDate",
            Column::OriginalStartDate => "OriginalStartDate",
            Column::LegacyAccountId => "Legacy Acct ID",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Column::AccountId => &["accoutid", "accountid", "acctid", "accountnumber"],
            Column::Status => &["status", "accountstatus"],
            Column::State => &["state"],
            Column::City => &["city"],
            Column::BillMethod => &["billmethod", "billingmethod"],
            Column::RateCode => &["ratecode"],
            Column::LastStartDate => &["laststartdate"],
            Column::OriginalStartDate => &["originalstartdate", "origstartdate"],
            Column::LegacyAccountId => &["legacyacctid", "legacyaccountid"],
        }
    }

    /// `true` when `header` names this column.
    pub fn matches(&self, header: &str) -> bool {
        let key: String = header
            .trim()
            .chars()
            .filter(|c| !matches!(*c, ' ' | '_' | '-'))
            .flat_map(char::to_lowercase)
            .collect();
        self.aliases().contains(&key.as_str())
    }
}

// ── RawDataset ────────────────────────────────────────────────────────────────

/// One parsed source before schema reconciliation.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// File name or upload label, used in log and error messages.
    pub source_name: String,
    /// Header names, whitespace-trimmed.
    pub columns: Vec<String>,
    /// Cell values; `None` is the missing marker.
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// `true` when any header names `column`.
    pub fn has_column(&self, column: Column) -> bool {
        self.columns.iter().any(|c| column.matches(c))
    }
}

/// The concatenation of every loaded source under one uniform schema.
///
/// `columns` is the union of all source headers in first-seen order; every
/// row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default)]
pub struct RawDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    /// Names of the sources that were concatenated, in order.
    pub sources: Vec<String>,
}

impl RawDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Indices of every header that names `column`, in schema order.
    pub fn column_indices(&self, column: Column) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| column.matches(c))
            .map(|(i, _)| i)
            .collect()
    }

    /// First non-missing value among the columns naming `column`.
    pub fn value<'a>(&'a self, row: usize, indices: &[usize]) -> Option<&'a str> {
        let cells = self.rows.get(row)?;
        indices
            .iter()
            .filter_map(|&i| cells.get(i).and_then(|c| c.as_deref()))
            .next()
    }
}

// ── SubscriptionType ──────────────────────────────────────────────────────────

/// Categorical subscription type derived from billing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SubscriptionType {
    Digital,
    Print,
    Bundle,
    Other,
}

impl SubscriptionType {
    pub const ALL: [SubscriptionType; 4] = [
        SubscriptionType::Digital,
        SubscriptionType::Print,
        SubscriptionType::Bundle,
        SubscriptionType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionType::Digital => "Digital",
            SubscriptionType::Print => "Print",
            SubscriptionType::Bundle => "Bundle",
            SubscriptionType::Other => "Other",
        }
    }
}

impl fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Record / Dataset ──────────────────────────────────────────────────────────

/// One subscription-account entry after normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Grouping and uniqueness key. Never empty.
    pub account_id: String,
    /// Free-text status as found in the source (not case-folded).
    pub status: Option<String>,
    pub state: Option<String>,
    /// Trimmed and title-cased.
    pub city: Option<String>,
    pub bill_method: Option<String>,
    pub rate_code: Option<String>,
    pub last_start_date: Option<NaiveDateTime>,
    pub original_start_date: Option<NaiveDateTime>,
    pub legacy_account_id: Option<String>,
}

impl Record {
    /// A record with only the identifier set; handy for tests and fixtures.
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            status: None,
            state: None,
            city: None,
            bill_method: None,
            rate_code: None,
            last_start_date: None,
            original_start_date: None,
            legacy_account_id: None,
        }
    }

    /// Month bucket of the last start date, when it parsed.
    pub fn year_month(&self) -> Option<YearMonth> {
        self.last_start_date.as_ref().map(YearMonth::from_datetime)
    }

    /// Upper-cased status used for filter comparisons.
    pub fn status_key(&self) -> Option<String> {
        self.status.as_ref().map(|s| s.to_uppercase())
    }
}

/// Normalised records in load order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct upper-cased status values, sorted, for a filter selector.
    pub fn status_options(&self) -> Vec<String> {
        distinct_status_keys(self.records.iter())
    }
}

fn distinct_status_keys<'a>(records: impl Iterator<Item = &'a Record>) -> Vec<String> {
    records
        .filter_map(Record::status_key)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// A record paired with its derived subscription type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRecord {
    pub record: Record,
    pub subscription_type: SubscriptionType,
}

/// The classifier's output: the normalised dataset plus derived types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedDataset {
    pub records: Vec<ClassifiedRecord>,
}

impl ClassifiedDataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Same as [`Dataset::status_options`], over the classified records.
    pub fn status_options(&self) -> Vec<String> {
        distinct_status_keys(self.records.iter().map(|r| &r.record))
    }
}

// ── Coordinates ───────────────────────────────────────────────────────────────

/// A geocoded point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn as_pair(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

// ── GroupDimension ────────────────────────────────────────────────────────────

/// Geography column used for cross-sectional counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupDimension {
    State,
    City,
}

impl GroupDimension {
    pub fn key<'a>(&self, record: &'a Record) -> Option<&'a str> {
        match self {
            GroupDimension::State => record.state.as_deref(),
            GroupDimension::City => record.city.as_deref(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GroupDimension::State => "State",
            GroupDimension::City => "City",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_column_matches_aliases() {
        assert!(Column::AccountId.matches("AccoutID"));
        assert!(Column::AccountId.matches(" Account ID "));
        assert!(Column::AccountId.matches("account_id"));
        assert!(Column::BillMethod.matches("Bill Method"));
        assert!(Column::BillMethod.matches("BILL_METHOD"));
        assert!(Column::LegacyAccountId.matches("Legacy Acct ID"));
        assert!(Column::LastStartDate.matches("Last-Start-Date"));
        assert!(!Column::State.matches("Status"));
        assert!(!Column::City.matches("Capacity"));
    }

    #[test]
    fn test_synthesised_headers_match_themselves() {
        let all = [
            Column::AccountId,
            Column::Status,
            Column::State,
            Column::City,
            Column::BillMethod,
            Column::RateCode,
            Column::LastStartDate,
            Column::OriginalStartDate,
            Column::LegacyAccountId,
        ];
        for column in all {
            assert!(column.matches(column.header()), "{:?}", column);
        }
    }

    #[test]
    fn test_raw_dataset_value_coalesces_aliases() {
        let raw = RawDataset {
            columns: vec!["AccoutID".into(), "Account ID".into()],
            rows: vec![
                vec![Some("1".into()), None],
                vec![None, Some("2".into())],
                vec![None, None],
            ],
            sources: vec!["a".into(), "b".into()],
        };
        let idx = raw.column_indices(Column::AccountId);
        assert_eq!(idx, vec![0, 1]);
        assert_eq!(raw.value(0, &idx), Some("1"));
        assert_eq!(raw.value(1, &idx), Some("2"));
        assert_eq!(raw.value(2, &idx), None);
        assert_eq!(raw.value(9, &idx), None);
    }

    #[test]
    fn test_record_year_month() {
        let mut record = Record::new("42");
        assert!(record.year_month().is_none());
        record.last_start_date = NaiveDate::from_ymd_opt(2021, 3, 9)
            .unwrap()
            .and_hms_opt(0, 0, 0);
        assert_eq!(record.year_month().unwrap().to_string(), "2021-03");
    }

    #[test]
    fn test_status_options_distinct_upper_sorted() {
        let mut a = Record::new("1");
        a.status = Some("Active".into());
        let mut b = Record::new("2");
        b.status = Some("ACTIVE".into());
        let mut c = Record::new("3");
        c.status = Some("cancelled".into());
        let d = Record::new("4");
        let dataset = Dataset::new(vec![a, b, c, d]);
        assert_eq!(dataset.status_options(), vec!["ACTIVE", "CANCELLED"]);
    }

    #[test]
    fn test_classified_status_options_match_dataset() {
        let mut a = Record::new("1");
        a.status = Some("suspended".into());
        let mut b = Record::new("2");
        b.status = Some("Active".into());
        let mut c = Record::new("3");
        c.status = Some("SUSPENDED".into());
        let dataset = Dataset::new(vec![a, b, c]);
        let classified = ClassifiedDataset {
            records: dataset
                .records
                .iter()
                .cloned()
                .map(|record| ClassifiedRecord {
                    record,
                    subscription_type: SubscriptionType::Other,
                })
                .collect(),
        };
        assert_eq!(classified.status_options(), vec!["ACTIVE", "SUSPENDED"]);
        assert_eq!(classified.status_options(), dataset.status_options());
        assert!(ClassifiedDataset::default().status_options().is_empty());
    }

    #[test]
    fn test_subscription_type_display_and_order() {
        assert_eq!(SubscriptionType::Digital.to_string(), "Digital");
        assert!(SubscriptionType::Digital < SubscriptionType::Print);
        assert!(SubscriptionType::Bundle < SubscriptionType::Other);
    }

    #[test]
    fn test_group_dimension_key() {
        let mut record = Record::new("1");
        record.state = Some("OR".into());
        assert_eq!(GroupDimension::State.key(&record), Some("OR"));
        assert_eq!(GroupDimension::City.key(&record), None);
    }
}
