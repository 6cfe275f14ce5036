//! Plain-text rendering of a [`DashboardReport`].

use dashboard_core::formatting::{format_coordinates, format_count, format_number, format_smoothed};
use dashboard_core::models::GroupDimension;
use dashboard_data::aggregator::{GroupCount, MonthlySeries, TypeSeries};
use dashboard_data::analysis::{CityLocation, DashboardReport, ReportMetadata};
use unicode_width::UnicodeWidthStr;

// ── TextTable ─────────────────────────────────────────────────────────────────

/// Column-aligned table. The first column is left-aligned, the rest right.
struct TextTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.width()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.width());
                }
            }
        }
        widths
    }

    fn render(&self) -> String {
        let widths = self.widths();
        let mut out = String::new();
        out.push_str(&format_row(&self.headers, &widths));
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&format_row(&rule, &widths));
        for row in &self.rows {
            out.push_str(&format_row(row, &widths));
        }
        out
    }
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    let line = cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, width))| {
            let pad = " ".repeat(width.saturating_sub(cell.width()));
            if i == 0 {
                format!("{}{}", cell, pad)
            } else {
                format!("{}{}", pad, cell)
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    format!("{}\n", line.trim_end())
}

fn section(title: &str, body: String) -> String {
    format!("{}\n{}\n{}\n", title, "=".repeat(title.width()), body)
}

// ── Views ─────────────────────────────────────────────────────────────────────

pub fn render_groups(dimension: GroupDimension, groups: &[GroupCount]) -> String {
    if groups.is_empty() {
        return "No matching accounts.\n".to_string();
    }
    let mut table = TextTable::new([dimension.label(), "Accounts"]);
    for g in groups {
        table.push(vec![g.key.clone(), format_count(g.count)]);
    }
    table.render()
}

pub fn render_series(series: &MonthlySeries) -> String {
    if series.is_empty() {
        return "No dated accounts.\n".to_string();
    }
    let mut table = TextTable::new(["Month", "Accounts", "Smoothed"]);
    for p in &series.points {
        table.push(vec![
            p.month.to_string(),
            format_count(p.count),
            format_smoothed(p.smoothed),
        ]);
    }
    table.render()
}

pub fn render_type_series(series: &TypeSeries) -> String {
    if series.is_empty() {
        return "No dated accounts.\n".to_string();
    }
    let mut headers = vec!["Month".to_string()];
    for column in &series.columns {
        headers.push(column.subscription_type.to_string());
        headers.push(format!("{} avg", column.subscription_type));
    }
    let mut table = TextTable::new(headers);
    for (i, month) in series.months.iter().enumerate() {
        let mut row = vec![month.to_string()];
        for column in &series.columns {
            row.push(format_count(column.counts[i]));
            row.push(format_smoothed(column.smoothed[i]));
        }
        table.push(row);
    }
    table.render()
}

pub fn render_city_map(locations: &[CityLocation]) -> String {
    if locations.is_empty() {
        return "No matching accounts.\n".to_string();
    }
    let mut table = TextTable::new(["City", "Accounts", "Coordinates"]);
    for l in locations {
        table.push(vec![
            l.city.clone(),
            format_count(l.count),
            format_coordinates(l.coordinates.map(|c| c.as_pair())),
        ]);
    }
    table.render()
}

fn render_metadata(meta: &ReportMetadata) -> String {
    format!(
        "{} rows from {} source(s), {} records analysed, {} matching the status filter ({}s)\n",
        format_count(meta.rows_loaded as u64),
        meta.sources.len(),
        format_count(meta.records_analyzed as u64),
        format_count(meta.filtered_records as u64),
        format_number(meta.load_time_seconds + meta.transform_time_seconds, 3),
    )
}

/// Every view present in `report`, one titled section each.
pub fn render_report(report: &DashboardReport) -> String {
    let mut out = String::new();
    if let Some(groups) = &report.by_state {
        out.push_str(&section(
            "Active accounts by state",
            render_groups(GroupDimension::State, groups),
        ));
    }
    if let Some(groups) = &report.by_city {
        out.push_str(&section(
            "Active accounts by city",
            render_groups(GroupDimension::City, groups),
        ));
    }
    if let Some(locations) = &report.city_map {
        out.push_str(&section("City map", render_city_map(locations)));
    }
    if let Some(series) = &report.overall {
        out.push_str(&section("Accounts by start month", render_series(series)));
    }
    if let Some(series) = &report.by_type {
        out.push_str(&section(
            "Accounts by start month and subscription type",
            render_type_series(series),
        ));
    }
    out.push_str(&render_metadata(&report.metadata));
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
