//! Field cleaning and typing.
//!
//! Turns the loaded [`RawDataset`] into typed [`Record`]s: dates are parsed,
//! city names collapse onto one spelling, and rows without an account
//! identifier are dropped. A bad value never aborts the pass.

use dashboard_core::data_processors::{non_blank, title_case, DateParser};
use dashboard_core::models::{Column, Dataset, RawDataset, Record};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Counters gathered while normalising.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub rows_in: usize,
    pub records_out: usize,
    /// Rows skipped because the account identifier was blank.
    pub dropped_missing_id: usize,
    /// Date values replaced by the missing marker.
    pub date_parse_failures: usize,
}

/// Resolved column positions for each canonical field.
struct ColumnIndices {
    account_id: Vec<usize>,
    status: Vec<usize>,
    state: Vec<usize>,
    city: Vec<usize>,
    bill_method: Vec<usize>,
    rate_code: Vec<usize>,
    last_start_date: Vec<usize>,
    original_start_date: Vec<usize>,
    legacy_account_id: Vec<usize>,
}

impl ColumnIndices {
    fn resolve(raw: &RawDataset) -> Self {
        Self {
            account_id: raw.column_indices(Column::AccountId),
            status: raw.column_indices(Column::Status),
            state: raw.column_indices(Column::State),
            city: raw.column_indices(Column::City),
            bill_method: raw.column_indices(Column::BillMethod),
            rate_code: raw.column_indices(Column::RateCode),
            last_start_date: raw.column_indices(Column::LastStartDate),
            original_start_date: raw.column_indices(Column::OriginalStartDate),
            legacy_account_id: raw.column_indices(Column::LegacyAccountId),
        }
    }
}

/// Normalise every row of `raw` into a new [`Dataset`].
pub fn normalize(raw: &RawDataset) -> (Dataset, NormalizeReport) {
    let idx = ColumnIndices::resolve(raw);
    let mut report = NormalizeReport {
        rows_in: raw.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(raw.len());

    for row in 0..raw.len() {
        let text = |indices: &[usize]| non_blank(raw.value(row, indices)).map(str::to_string);

        let Some(account_id) = non_blank(raw.value(row, &idx.account_id)).map(|s| s.trim()) else {
            report.dropped_missing_id += 1;
            debug!("Row {}: no account identifier, skipped", row);
            continue;
        };

        let mut date = |field: Column, indices: &[usize]| {
            let value = raw.value(row, indices)?;
            match DateParser::parse(field.header(), value) {
                Ok(ts) => Some(ts),
                Err(e) => {
                    report.date_parse_failures += 1;
                    debug!("Row {}: {}", row, e);
                    None
                }
            }
        };

        let last_start_date = date(Column::LastStartDate, &idx.last_start_date);
        let original_start_date = date(Column::OriginalStartDate, &idx.original_start_date);

        records.push(Record {
            account_id: account_id.to_string(),
            status: text(&idx.status),
            state: text(&idx.state),
            city: normalize_city(raw.value(row, &idx.city)),
            bill_method: text(&idx.bill_method),
            rate_code: text(&idx.rate_code),
            last_start_date,
            original_start_date,
            legacy_account_id: text(&idx.legacy_account_id),
        });
    }

    report.records_out = records.len();

    if report.dropped_missing_id > 0 {
        warn!(
            "Skipped {} rows without an account identifier",
            report.dropped_missing_id
        );
    }
    if report.date_parse_failures > 0 {
        warn!(
            "{} date values could not be parsed and were treated as missing",
            report.date_parse_failures
        );
    }
    info!(
        "Normalised {} of {} rows",
        report.records_out, report.rows_in
    );

    (Dataset::new(records), report)
}

/// Trim and title-case a city so differently cased spellings share one
/// grouping key. Blank values are missing.
pub fn normalize_city(value: Option<&str>) -> Option<String> {
    non_blank(value).map(|v| title_case(v.trim()))
}
