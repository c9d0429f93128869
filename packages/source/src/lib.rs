#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Data acquisition for the Weston Brief.
//!
//! Two fetchers feed the weekly digest:
//!
//! * [`arcgis`] pages through the Toronto Police major crime indicator
//!   feature service, filtered server-side by neighbourhood and date.
//! * [`csv_download`] reads a bounded prefix of the active building permits
//!   CSV and reduces it to permit counts per type of work.
//!
//! Neither fetcher writes anything to disk. A failing request fails the whole
//! call; callers decide whether to fall back to the last snapshot.

pub mod arcgis;
pub mod csv_download;
pub mod parsing;
pub mod progress;

use chrono::NaiveDate;

/// Errors that can occur while fetching source data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed, timed out, or returned a non-success status.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The service answered with an error envelope instead of data.
    #[error("Service error {code}: {message}")]
    Api {
        /// Error code reported by the service.
        code: i64,
        /// Error message reported by the service.
        message: String,
    },

    /// The response was well-formed but not in the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Bounds for a single fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Only fetch records occurring on or after this date.
    pub since: NaiveDate,
    /// Maximum number of records to return.
    pub limit: u64,
}
