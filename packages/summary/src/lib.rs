#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation of crime events and permit counts into a [`ReportBundle`].
//!
//! Every function here is pure: the same snapshot always produces the same
//! report. "Today" is passed in rather than read from the clock.

use chrono::{Days, NaiveDate};
use weston_brief_models::{
    CrimeEvent, CrimeSummary, DEFAULT_WINDOW_DAYS, PermitSummaryEntry, ReportBundle,
};

/// Counts events per category. Categories with no events are absent.
#[must_use]
pub fn summarize_crimes(events: &[CrimeEvent]) -> CrimeSummary {
    let mut counts = CrimeSummary::new();
    for event in events {
        *counts.entry(event.category.clone()).or_insert(0) += 1;
    }
    counts
}

/// Returns the `top_n` entries with the highest count, highest first.
///
/// The sort is stable, so entries with equal counts keep their input order.
#[must_use]
pub fn summarize_permits(entries: &[PermitSummaryEntry], top_n: usize) -> Vec<PermitSummaryEntry> {
    let mut ranked = entries.to_vec();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(top_n);
    ranked
}

/// Sums the counts of every entry.
#[must_use]
pub fn totals(entries: &[PermitSummaryEntry]) -> u64 {
    entries.iter().map(|e| e.count).sum()
}

/// Returns the earliest and latest local dates among `events`, or the week
/// ending `today` when there are none.
#[must_use]
pub fn report_date_range(events: &[CrimeEvent], today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = events.iter().map(|e| e.local_date).min();
    let end = events.iter().map(|e| e.local_date).max();

    if let (Some(start), Some(end)) = (start, end) {
        (start, end)
    } else {
        let start = today
            .checked_sub_days(Days::new(u64::from(DEFAULT_WINDOW_DAYS)))
            .unwrap_or(today);
        (start, today)
    }
}

/// Aggregates the snapshots into everything the report needs.
///
/// `permits_total` is computed over every permit entry before the list is
/// cut down to `top_n`.
#[must_use]
pub fn build_bundle(
    events: &[CrimeEvent],
    permits: &[PermitSummaryEntry],
    top_n: usize,
    council_note: &str,
    today: NaiveDate,
) -> ReportBundle {
    let (start_date, end_date) = report_date_range(events, today);
    let crime_counts = summarize_crimes(events);
    let permits_total = totals(permits);
    let top_permits = summarize_permits(permits, top_n);

    log::debug!(
        "Report {start_date}..={end_date}: {} crimes in {} categories, {permits_total} permits",
        events.len(),
        crime_counts.len()
    );

    ReportBundle {
        start_date,
        end_date,
        total_crimes: events.len() as u64,
        crime_counts,
        permits_total,
        top_permits,
        council_note: council_note.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use weston_brief_models::DEFAULT_TOP_N;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(category: &str, day: u32) -> CrimeEvent {
        let offset = FixedOffset::west_opt(4 * 3600).unwrap();
        let occurred_at = offset.with_ymd_and_hms(2025, 5, day, 12, 0, 0).unwrap();
        CrimeEvent {
            occurred_at,
            offence: "Offence".to_string(),
            category: category.to_string(),
            neighbourhood: "Weston (113)".to_string(),
            local_date: occurred_at.date_naive(),
        }
    }

    fn entries(pairs: &[(&str, u64)]) -> Vec<PermitSummaryEntry> {
        pairs
            .iter()
            .map(|(work, count)| PermitSummaryEntry::new(*work, *count))
            .collect()
    }

    #[test]
    fn counts_crimes_by_category() {
        let events = vec![
            event("Assault", 3),
            event("Auto Theft", 2),
            event("Assault", 1),
        ];
        let summary = summarize_crimes(&events);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary["Assault"], 2);
        assert_eq!(summary["Auto Theft"], 1);
        assert!(!summary.contains_key("Robbery"));
    }

    #[test]
    fn no_events_gives_empty_summary() {
        assert!(summarize_crimes(&[]).is_empty());
    }

    #[test]
    fn top_permits_sorted_and_stable() {
        let input = entries(&[("Porch", 2), ("Deck", 5), ("Fence", 2), ("Roof", 5), ("Shed", 1)]);
        assert_eq!(
            summarize_permits(&input, 4),
            entries(&[("Deck", 5), ("Roof", 5), ("Porch", 2), ("Fence", 2)])
        );
    }

    #[test]
    fn totals_ignore_top_n() {
        let input = entries(&[("Deck", 10), ("Fence", 7), ("Roof", 3)]);
        assert_eq!(summarize_permits(&input, 1), entries(&[("Deck", 10)]));
        assert_eq!(totals(&input), 20);
    }

    #[test]
    fn empty_permits_give_empty_ranking() {
        assert!(summarize_permits(&[], DEFAULT_TOP_N).is_empty());
        assert_eq!(totals(&[]), 0);
    }

    #[test]
    fn date_range_spans_events() {
        let events = vec![event("Assault", 6), event("Robbery", 2), event("Assault", 4)];
        assert_eq!(
            report_date_range(&events, date(2025, 5, 10)),
            (date(2025, 5, 2), date(2025, 5, 6))
        );
    }

    #[test]
    fn date_range_defaults_to_last_week() {
        assert_eq!(
            report_date_range(&[], date(2025, 5, 10)),
            (date(2025, 5, 3), date(2025, 5, 10))
        );
    }

    #[test]
    fn bundle_from_empty_snapshots() {
        let today = date(2025, 3, 4);
        let bundle = build_bundle(&[], &[], DEFAULT_TOP_N, "note", today);
        assert_eq!(bundle.start_date, date(2025, 2, 25));
        assert_eq!(bundle.end_date, today);
        assert_eq!(bundle.total_crimes, 0);
        assert!(bundle.crime_counts.is_empty());
        assert_eq!(bundle.permits_total, 0);
        assert!(bundle.top_permits.is_empty());
        assert_eq!(bundle.council_note, "note");
    }

    #[test]
    fn bundle_totals_all_permits() {
        let events = vec![event("Assault", 1), event("Break and Enter", 2)];
        let permits = entries(&[("Deck", 10), ("Fence", 7), ("Roof", 3)]);
        let bundle = build_bundle(&events, &permits, 2, "note", date(2025, 5, 10));
        assert_eq!(bundle.total_crimes, 2);
        assert_eq!(bundle.permits_total, 20);
        assert_eq!(bundle.top_permits, entries(&[("Deck", 10), ("Fence", 7)]));
        assert!(bundle.start_date <= bundle.end_date);
    }
}
