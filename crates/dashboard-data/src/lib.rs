//! Data pipeline for the subscription dashboard.
//!
//! Reads CSV and spreadsheet exports into one table, normalises and
//! classifies the records, and computes the grouped and monthly views.

pub mod aggregator;
pub mod analysis;
pub mod classifier;
pub mod normalizer;
pub mod reader;

pub use dashboard_core as core;
