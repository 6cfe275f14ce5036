mod bootstrap;
mod render;

use std::time::Duration;

use anyhow::Result;
use dashboard_core::settings::Settings;
use dashboard_data::analysis::DashboardReport;
use dashboard_data::reader::expand_inputs;
use dashboard_runtime::geocode::{GeocodeCache, TableLookup};
use dashboard_runtime::session::{DashboardSession, DashboardView, AWAITING_UPLOAD_PROMPT};

fn main() -> Result<()> {
    let settings = Settings::load();

    let _log_guard = bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("Subscription dashboard v{} starting", env!("CARGO_PKG_VERSION"));

    let config = settings.pipeline_config()?;
    tracing::info!(
        "Statuses: {:?}, views: {:?}, top {}",
        config.statuses.selected().collect::<Vec<_>>(),
        config.views,
        config.top_n
    );

    let mut session = DashboardSession::new();
    if !settings.awaiting_input() {
        let sources = expand_inputs(&settings.inputs, settings.sheet.as_deref())?;
        session.upload(&sources)?;
    }

    let mut report = match session.view(&config)? {
        DashboardView::AwaitingUpload => {
            print_prompt(&settings.format)?;
            return Ok(());
        }
        DashboardView::Ready(report) => report,
    };

    if let Some(path) = &settings.city_coordinates {
        attach_coordinates(&mut report, path, settings.geocode_interval_ms)?;
    }

    match settings.format.as_str() {
        "json" => println!("{}", report.to_json_pretty()?),
        _ => print!("{}", render::render_report(&report)),
    }

    Ok(())
}

fn print_prompt(format: &str) -> Result<()> {
    if format == "json" {
        let prompt = serde_json::json!({
            "awaiting_upload": true,
            "message": AWAITING_UPLOAD_PROMPT,
        });
        println!("{}", serde_json::to_string_pretty(&prompt)?);
    } else {
        println!("{}", AWAITING_UPLOAD_PROMPT);
    }
    Ok(())
}

fn attach_coordinates(
    report: &mut DashboardReport,
    table_path: &std::path::Path,
    interval_ms: u64,
) -> Result<()> {
    if report.city_map.is_none() {
        return Ok(());
    }
    let lookup = TableLookup::from_path(table_path)?;
    let mut cache = GeocodeCache::new(lookup).min_interval(Duration::from_millis(interval_ms));
    cache.attach_to_report(report);
    Ok(())
}
