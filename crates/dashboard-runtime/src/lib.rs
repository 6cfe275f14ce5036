//! Runtime layer for the subscription dashboard.
//!
//! Owns the uploaded dataset for the length of a session and resolves city
//! coordinates through a memoizing, rate-limited cache.

pub mod geocode;
pub mod session;

pub use dashboard_core as core;
pub use dashboard_data as data;
