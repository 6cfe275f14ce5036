//! Shared types for the subscription dashboard.
//!
//! Records and datasets, the error taxonomy, month buckets, pipeline
//! configuration, CLI settings and the small parsing and formatting helpers
//! every other crate leans on.

pub mod config;
pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod period;
pub mod settings;

pub use error::{DashboardError, Result};
