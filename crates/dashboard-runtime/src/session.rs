//! Upload-scoped session context.
//!
//! A [`DashboardSession`] is the single owner of the dataset a user uploaded.
//! Every filter change recomputes the views from that dataset; a new upload
//! replaces it, and a failed upload leaves the previous one untouched.

use std::time::{Duration, Instant};

use dashboard_core::config::PipelineConfig;
use dashboard_core::Result;
use dashboard_data::analysis::{prepare_sources, run_pipeline, DashboardReport, PreparedDataset};
use dashboard_data::reader::InputSource;

/// Message shown while no dataset is loaded.
pub const AWAITING_UPLOAD_PROMPT: &str = "Upload a CSV or spreadsheet to begin.";

// ── DashboardView ─────────────────────────────────────────────────────────────

/// What the presentation layer should show.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardView {
    /// Nothing uploaded yet; show the prompt, not an error.
    AwaitingUpload,
    Ready(Box<DashboardReport>),
}

impl DashboardView {
    pub fn report(&self) -> Option<&DashboardReport> {
        match self {
            DashboardView::AwaitingUpload => None,
            DashboardView::Ready(report) => Some(report),
        }
    }
}

// ── DashboardSession ──────────────────────────────────────────────────────────

/// Holds the current upload and recomputes views on demand.
///
/// # Example
/// ```no_run
/// use dashboard_core::config::PipelineConfig;
/// use dashboard_data::reader::InputSource;
/// use dashboard_runtime::session::DashboardSession;
///
/// let mut session = DashboardSession::new();
/// let source = InputSource::from_path(std::path::Path::new("export.csv")).unwrap();
/// session.upload(&[source]).unwrap();
/// let view = session.view(&PipelineConfig::default()).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct DashboardSession {
    loaded: Option<PreparedDataset>,
    /// When the current dataset was uploaded.
    loaded_at: Option<Instant>,
    /// Description of the last failed upload, cleared on success.
    last_error: Option<String>,
}

impl DashboardSession {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Load `sources` and make them the session's dataset.
    ///
    /// On failure the error is returned and the previous dataset, if any,
    /// stays in place.
    pub fn upload(&mut self, sources: &[InputSource]) -> Result<&PreparedDataset> {
        match prepare_sources(sources) {
            Ok(prepared) => {
                tracing::debug!(
                    records = prepared.dataset.len(),
                    sources = prepared.sources.len(),
                    "session dataset replaced"
                );
                self.loaded_at = Some(Instant::now());
                self.last_error = None;
                Ok(self.loaded.insert(prepared))
            }
            Err(e) => {
                tracing::warn!(error = %e, "upload failed; keeping previous dataset");
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Discard the current dataset.
    pub fn clear(&mut self) {
        self.loaded = None;
        self.loaded_at = None;
        tracing::debug!("session dataset cleared");
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn dataset(&self) -> Option<&PreparedDataset> {
        self.loaded.as_ref()
    }

    /// Distinct upper-cased status values of the current dataset, sorted.
    /// Empty while awaiting an upload.
    pub fn status_options(&self) -> Vec<String> {
        self.loaded
            .as_ref()
            .map(|prepared| prepared.dataset.status_options())
            .unwrap_or_default()
    }

    /// Recompute the views for `config` from the current dataset.
    pub fn view(&self, config: &PipelineConfig) -> Result<DashboardView> {
        config.validate()?;
        Ok(match &self.loaded {
            None => DashboardView::AwaitingUpload,
            Some(prepared) => DashboardView::Ready(Box::new(run_pipeline(prepared, config))),
        })
    }

    /// Age of the current dataset, or `None` when nothing is loaded.
    pub fn dataset_age(&self) -> Option<Duration> {
        self.loaded_at.map(|ts| ts.elapsed())
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
