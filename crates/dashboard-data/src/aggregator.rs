//! Grouped and month-bucketed distinct-account counts.
//!
//! Every count here is a distinct count of account identifiers, never a row
//! count. Time series are reindexed onto a contiguous monthly range and may
//! carry a centred rolling mean alongside the raw counts.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use dashboard_core::models::{ClassifiedRecord, GroupDimension, Record, SubscriptionType};
use dashboard_core::period::YearMonth;
use serde::{Deserialize, Serialize};

// ── Output types ──────────────────────────────────────────────────────────────

/// Distinct accounts in one geography group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCount {
    pub key: String,
    pub count: u64,
}

/// One month of a time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPoint {
    pub month: YearMonth,
    pub count: u64,
    /// Centred rolling mean; `None` where the window does not fit.
    pub smoothed: Option<f64>,
}

/// Distinct accounts per month over a gap-free range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlySeries {
    pub points: Vec<MonthlyPoint>,
}

impl MonthlySeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_month(&self) -> Option<YearMonth> {
        self.points.first().map(|p| p.month)
    }

    pub fn last_month(&self) -> Option<YearMonth> {
        self.points.last().map(|p| p.month)
    }

    pub fn count_for(&self, month: YearMonth) -> Option<u64> {
        self.points.iter().find(|p| p.month == month).map(|p| p.count)
    }
}

/// One subscription type's column of a pivoted series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeColumn {
    pub subscription_type: SubscriptionType,
    /// Aligned with [`TypeSeries::months`].
    pub counts: Vec<u64>,
    pub smoothed: Vec<Option<f64>>,
}

/// Distinct accounts per month, pivoted to one column per subscription type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeSeries {
    pub months: Vec<YearMonth>,
    pub columns: Vec<TypeColumn>,
}

impl TypeSeries {
    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn column(&self, subscription_type: SubscriptionType) -> Option<&TypeColumn> {
        self.columns
            .iter()
            .find(|c| c.subscription_type == subscription_type)
    }
}

// ── SubscriptionAggregator ────────────────────────────────────────────────────

/// Stateless helper computing the dashboard's aggregate views.
pub struct SubscriptionAggregator;

impl SubscriptionAggregator {
    /// Distinct accounts per state or city, sorted by count (descending,
    /// ties by key) and truncated to `top_n` groups when given.
    ///
    /// Records without a value for the dimension are not grouped.
    pub fn geography_counts<'a>(
        records: impl IntoIterator<Item = &'a Record>,
        dimension: GroupDimension,
        top_n: Option<usize>,
    ) -> Vec<GroupCount> {
        let mut groups: HashMap<&str, HashSet<&str>> = HashMap::new();
        for record in records {
            if let Some(key) = dimension.key(record) {
                groups
                    .entry(key)
                    .or_default()
                    .insert(record.account_id.as_str());
            }
        }

        let mut counts: Vec<GroupCount> = groups
            .into_iter()
            .map(|(key, ids)| GroupCount {
                key: key.to_string(),
                count: ids.len() as u64,
            })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));

        if let Some(n) = top_n {
            counts.truncate(n);
        }
        counts
    }

    /// Distinct accounts per month of last start date.
    ///
    /// Records without a parsed date are skipped; buckets before
    /// `start_month` are dropped before the range is computed.
    pub fn monthly_unique<'a>(
        records: impl IntoIterator<Item = &'a Record>,
        start_month: Option<YearMonth>,
        smoothing_window: Option<usize>,
    ) -> MonthlySeries {
        let mut buckets: BTreeMap<YearMonth, HashSet<&str>> = BTreeMap::new();
        for record in records {
            if let Some(month) = bucket_for(record, start_month) {
                buckets
                    .entry(month)
                    .or_default()
                    .insert(record.account_id.as_str());
            }
        }

        let counts: BTreeMap<YearMonth, u64> = buckets
            .into_iter()
            .map(|(month, ids)| (month, ids.len() as u64))
            .collect();
        let filled = fill_month_gaps(&counts);
        let values: Vec<u64> = filled.iter().map(|(_, c)| *c).collect();
        let smoothed = smooth(&values, smoothing_window);

        MonthlySeries {
            points: filled
                .into_iter()
                .zip(smoothed)
                .map(|((month, count), smoothed)| MonthlyPoint {
                    month,
                    count,
                    smoothed,
                })
                .collect(),
        }
    }

    /// Distinct accounts per month and subscription type, pivoted to one
    /// column per observed type (in type order) over one shared range.
    pub fn monthly_unique_by_type<'a>(
        records: impl IntoIterator<Item = &'a ClassifiedRecord>,
        start_month: Option<YearMonth>,
        smoothing_window: Option<usize>,
    ) -> TypeSeries {
        let mut buckets: BTreeMap<(YearMonth, SubscriptionType), HashSet<&str>> = BTreeMap::new();
        for classified in records {
            let record = &classified.record;
            if let Some(month) = bucket_for(record, start_month) {
                buckets
                    .entry((month, classified.subscription_type))
                    .or_default()
                    .insert(record.account_id.as_str());
            }
        }

        let (Some(first), Some(last)) = (
            buckets.keys().map(|(m, _)| *m).min(),
            buckets.keys().map(|(m, _)| *m).max(),
        ) else {
            return TypeSeries::default();
        };
        let months = YearMonth::range_inclusive(first, last);

        let observed: BTreeSet<SubscriptionType> = buckets.keys().map(|(_, t)| *t).collect();
        let columns = observed
            .into_iter()
            .map(|subscription_type| {
                let counts: Vec<u64> = months
                    .iter()
                    .map(|m| {
                        buckets
                            .get(&(*m, subscription_type))
                            .map(|ids| ids.len() as u64)
                            .unwrap_or(0)
                    })
                    .collect();
                let smoothed = smooth(&counts, smoothing_window);
                TypeColumn {
                    subscription_type,
                    counts,
                    smoothed,
                }
            })
            .collect();

        TypeSeries { months, columns }
    }
}

// ── Series helpers ────────────────────────────────────────────────────────────

/// Reindex `counts` onto every month from its first to its last key, both
/// inclusive, with zero for months that had no entry.
pub fn fill_month_gaps(counts: &BTreeMap<YearMonth, u64>) -> Vec<(YearMonth, u64)> {
    let (Some(first), Some(last)) = (counts.keys().next(), counts.keys().next_back()) else {
        return Vec::new();
    };
    YearMonth::range_inclusive(*first, *last)
        .into_iter()
        .map(|m| (m, counts.get(&m).copied().unwrap_or(0)))
        .collect()
}

/// Centred rolling mean over an odd `window`. Positions where the window
/// would run past either end are `None`.
///
/// An even or zero window has no centre, so every position is `None`.
pub fn centered_rolling_mean(values: &[u64], window: usize) -> Vec<Option<f64>> {
    if window % 2 == 0 {
        return vec![None; values.len()];
    }
    let half = window / 2;
    (0..values.len())
        .map(|i| {
            if i < half || i + half >= values.len() {
                return None;
            }
            let slice = &values[i - half..=i + half];
            Some(slice.iter().sum::<u64>() as f64 / slice.len() as f64)
        })
        .collect()
}

fn smooth(values: &[u64], window: Option<usize>) -> Vec<Option<f64>> {
    match window {
        Some(w) => centered_rolling_mean(values, w),
        None => vec![None; values.len()],
    }
}

fn bucket_for(record: &Record, start_month: Option<YearMonth>) -> Option<YearMonth> {
    let month = record.year_month()?;
    match start_month {
        Some(cutoff) if month < cutoff => None,
        _ => Some(month),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
