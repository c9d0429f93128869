#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Shared record types for the Weston Brief pipeline.
//!
//! Raw records produced by the acquisition step ([`CrimeEvent`],
//! [`PermitRow`]), their reduced forms ([`PermitSummaryEntry`],
//! [`CrimeSummary`]), and the [`ReportBundle`] handed to the renderer.
//!
//! Serde field names match the column names of the upstream datasets so the
//! same types serialize directly into the on-disk snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Days of crime data fetched, and covered by the report when there are no
/// events to derive a range from.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Number of permit work types listed in the report.
pub const DEFAULT_TOP_N: usize = 5;

/// Records requested per page from the crime feature service.
pub const DEFAULT_PAGE_SIZE: u64 = 2000;

/// A single major-crime-indicator occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrimeEvent {
    /// When the offence occurred, in the report's local timezone.
    #[serde(rename = "OCC_DATE")]
    pub occurred_at: DateTime<FixedOffset>,
    /// Offence description (e.g., `"Assault With Weapon"`).
    #[serde(rename = "OFFENCE")]
    pub offence: String,
    /// MCI category (e.g., `"Assault"`, `"Auto Theft"`).
    #[serde(rename = "MCI_CATEGORY")]
    pub category: String,
    /// Neighbourhood label (e.g., `"Weston (113)"`).
    #[serde(rename = "NEIGHBOURHOOD_158")]
    pub neighbourhood: String,
    /// Local calendar date of [`Self::occurred_at`], used for week bucketing.
    #[serde(rename = "DATE")]
    pub local_date: NaiveDate,
}

/// One row of the building permits dataset, reduced to the columns the
/// digest needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitRow {
    /// Type of work (e.g., `"Interior Alterations"`).
    #[serde(rename = "WORK", default)]
    pub work: String,
    /// Postal code of the permit address.
    #[serde(rename = "POSTAL", default)]
    pub postal: String,
}

/// Number of permits for one type of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitSummaryEntry {
    /// Type of work.
    #[serde(rename = "WORK")]
    pub work: String,
    /// Number of permits of this type.
    #[serde(rename = "COUNT")]
    pub count: u64,
}

impl PermitSummaryEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(work: impl Into<String>, count: u64) -> Self {
        Self {
            work: work.into(),
            count,
        }
    }
}

/// Crime counts keyed by MCI category. Categories with no occurrences are
/// absent rather than zero.
pub type CrimeSummary = BTreeMap<String, u64>;

/// Fully aggregated input for the report renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportBundle {
    /// First day covered by the report.
    pub start_date: NaiveDate,
    /// Last day covered by the report.
    pub end_date: NaiveDate,
    /// Number of crime events in the period.
    pub total_crimes: u64,
    /// Crime counts by category.
    pub crime_counts: CrimeSummary,
    /// Sum of permit counts across every work type, not just the top-N.
    pub permits_total: u64,
    /// Highest-count permit work types, at most `top_n` entries.
    pub top_permits: Vec<PermitSummaryEntry>,
    /// Free-text council update.
    pub council_note: String,
}

/// The datasets persisted between the acquisition and report steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Dataset {
    /// Crime events fetched from the feature-query service.
    Crimes,
    /// Permit counts by work type.
    Permits,
}

impl Dataset {
    /// File name of this dataset's snapshot.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Crimes => "crimes.csv",
            Self::Permits => "permit_summary.csv",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_display_names() {
        assert_eq!(Dataset::Crimes.to_string(), "crimes");
        assert_eq!(Dataset::Permits.to_string(), "permits");
    }

    #[test]
    fn dataset_file_names() {
        assert_eq!(Dataset::Crimes.file_name(), "crimes.csv");
        assert_eq!(Dataset::Permits.file_name(), "permit_summary.csv");
    }

    #[test]
    fn permit_entry_serializes_with_dataset_columns() {
        let json = serde_json::to_value(PermitSummaryEntry::new("Deck", 3)).unwrap();
        assert_eq!(json, serde_json::json!({ "WORK": "Deck", "COUNT": 3 }));
    }
}
