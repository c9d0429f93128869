//! Bounded CSV download for the building permits dataset.
//!
//! The permits CSV is large (~87 MB), so only the first `row_cap` data rows
//! are read. The response body is streamed and the download stops as soon as
//! enough complete rows have arrived. Results are best-effort: matching rows
//! beyond the cap are never seen.

use std::collections::BTreeMap;

use weston_brief_models::{PermitRow, PermitSummaryEntry};

use crate::SourceError;

/// Column holding the postal code.
pub const POSTAL_COLUMN: &str = "POSTAL";
/// Column holding the type of work.
pub const WORK_COLUMN: &str = "WORK";

/// Configuration for the permit CSV download.
pub struct CsvDownloadConfig<'a> {
    /// URL of the CSV file.
    pub url: &'a str,
    /// Human-readable label for log messages.
    pub label: &'a str,
}

/// Downloads the first `row_cap` rows of the permits CSV and counts permits
/// per type of work for postal codes starting with `postal_prefix`.
///
/// # Errors
///
/// Returns [`SourceError`] if the download fails, returns a non-success
/// status, or the CSV cannot be parsed.
pub async fn fetch_permit_summary(
    config: &CsvDownloadConfig<'_>,
    postal_prefix: &str,
    row_cap: u64,
) -> Result<Vec<PermitSummaryEntry>, SourceError> {
    log::info!(
        "[{}] Downloading first {row_cap} rows: {}",
        config.label,
        config.url
    );

    let bytes = download_prefix(config.url, row_cap).await?;
    log::debug!("[{}] Downloaded {} bytes", config.label, bytes.len());

    let summary = summarize_permit_csv(&bytes, postal_prefix, row_cap)?;
    log::info!(
        "[{}] {} work types for postal prefix {postal_prefix}",
        config.label,
        summary.len()
    );
    Ok(summary)
}

/// Streams `url` until the header plus `row_cap` complete rows have been
/// received, or the body ends.
async fn download_prefix(url: &str, row_cap: u64) -> Result<Vec<u8>, SourceError> {
    let client = reqwest::Client::new();
    let mut response = client.get(url).send().await?.error_for_status()?;

    let mut scanner = RowScanner::default();
    let mut bytes = Vec::new();
    let wanted = row_cap.saturating_add(1);

    while let Some(chunk) = response.chunk().await? {
        scanner.feed(&chunk);
        bytes.extend_from_slice(&chunk);
        if scanner.rows() >= wanted {
            log::debug!("Reached {row_cap} rows, closing download");
            break;
        }
    }

    Ok(bytes)
}

/// Parses a permits CSV, keeping at most `row_cap` data rows, and counts
/// permits per type of work among rows whose postal code starts with
/// `postal_prefix`.
///
/// Rows with an empty work type are not counted. The result is sorted by
/// count descending; ties keep the order in which the work type first
/// appeared.
///
/// # Errors
///
/// Returns [`SourceError`] if the CSV is malformed or lacks the `POSTAL` or
/// `WORK` column.
pub fn summarize_permit_csv(
    bytes: &[u8],
    postal_prefix: &str,
    row_cap: u64,
) -> Result<Vec<PermitSummaryEntry>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader.headers()?;
    for column in [POSTAL_COLUMN, WORK_COLUMN] {
        if !headers.iter().any(|h| h == column) {
            return Err(SourceError::Parse(format!(
                "permits CSV has no {column} column"
            )));
        }
    }

    let cap = usize::try_from(row_cap).unwrap_or(usize::MAX);
    let mut rows = Vec::new();
    for result in reader.deserialize::<PermitRow>().take(cap) {
        let row = result?;
        if row.postal.starts_with(postal_prefix) {
            rows.push(row);
        }
    }
    log::debug!("{} rows match postal prefix {postal_prefix}", rows.len());

    Ok(count_by_work(rows))
}

/// Counts rows per type of work, sorted by count descending with ties in
/// first-seen order.
#[must_use]
pub fn count_by_work(rows: impl IntoIterator<Item = PermitRow>) -> Vec<PermitSummaryEntry> {
    let mut positions: BTreeMap<String, usize> = BTreeMap::new();
    let mut entries: Vec<PermitSummaryEntry> = Vec::new();

    for row in rows {
        if row.work.is_empty() {
            continue;
        }
        if let Some(&i) = positions.get(&row.work) {
            entries[i].count += 1;
        } else {
            positions.insert(row.work.clone(), entries.len());
            entries.push(PermitSummaryEntry::new(row.work, 1));
        }
    }

    entries.sort_by(|a, b| b.count.cmp(&a.count));
    entries
}

/// Counts CSV records as they stream in, ignoring newlines inside quoted
/// fields and blank lines, which the CSV reader skips too.
#[derive(Debug, Default)]
struct RowScanner {
    in_quotes: bool,
    line_has_data: bool,
    rows: u64,
}

impl RowScanner {
    fn feed(&mut self, chunk: &[u8]) {
        for &byte in chunk {
            match byte {
                b'"' => {
                    self.in_quotes = !self.in_quotes;
                    self.line_has_data = true;
                }
                b'\n' if !self.in_quotes => {
                    if self.line_has_data {
                        self.rows += 1;
                    }
                    self.line_has_data = false;
                }
                b'\r' | b'\n' => {}
                _ => self.line_has_data = true,
            }
        }
    }

    const fn rows(&self) -> u64 {
        self.rows
    }
}
