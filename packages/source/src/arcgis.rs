//! `ArcGIS` feature service fetcher for crime events.
//!
//! Pages through a `FeatureServer` `query` endpoint ordered by occurrence
//! date, newest first. The neighbourhood and date filters are applied
//! server-side through the `where` clause; records are accumulated
//! client-side up to [`FetchOptions::limit`].

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use chrono_tz::Tz;
use weston_brief_models::CrimeEvent;

use crate::parsing::{attr_epoch_ms, attr_string, epoch_ms_to_local, sql_literal};
use crate::progress::ProgressCallback;
use crate::{FetchOptions, SourceError};

/// Attribute holding the occurrence timestamp (epoch ms, UTC).
pub const DATE_FIELD: &str = "OCC_DATE";
/// Attribute holding the offence description.
pub const OFFENCE_FIELD: &str = "OFFENCE";
/// Attribute holding the MCI category.
pub const CATEGORY_FIELD: &str = "MCI_CATEGORY";
/// Attribute holding the neighbourhood label.
pub const REGION_FIELD: &str = "NEIGHBOURHOOD_158";

/// Configuration for an `ArcGIS` fetch operation.
pub struct ArcGisConfig<'a> {
    /// Layer query URL (ending in `/query`).
    pub query_url: &'a str,
    /// Label for log messages (e.g., `"MCI"`).
    pub label: &'a str,
    /// Records requested per page.
    pub page_size: u64,
    /// Timeout applied to each page request.
    pub timeout: Duration,
    /// Timezone the occurrence timestamps are converted into.
    pub timezone: Tz,
    /// Neighbourhood labels to include.
    pub regions: &'a [String],
}

/// Builds the `where` clause selecting `regions` on or after `since`.
///
/// An empty region list filters on the date alone.
#[must_use]
pub fn build_where_clause(regions: &[String], since: NaiveDate) -> String {
    let date_clause = format!("{DATE_FIELD} >= DATE '{}'", since.format("%Y-%m-%d"));
    if regions.is_empty() {
        return date_clause;
    }
    let region_clauses = regions
        .iter()
        .map(|r| format!("{REGION_FIELD} = {}", sql_literal(r)))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("({region_clauses}) AND {date_clause}")
}

/// Fetches crime events from the feature service, newest first.
///
/// Stops when a page comes back short (no more data) or once
/// `options.limit` events have been collected, truncating the last page if
/// needed. Events whose UTC occurrence date falls before `options.since` are
/// dropped even if the service returns them.
///
/// # Errors
///
/// Returns [`SourceError`] if any page request fails, returns a non-success
/// status, the service reports an error, or a page has no `features` array.
/// No partial result is returned.
pub async fn fetch_arcgis(
    config: &ArcGisConfig<'_>,
    options: &FetchOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<CrimeEvent>, SourceError> {
    let client = reqwest::Client::new();
    let where_clause = build_where_clause(config.regions, options.since);
    let out_fields = [DATE_FIELD, OFFENCE_FIELD, CATEGORY_FIELD, REGION_FIELD].join(",");
    let order_by = format!("{DATE_FIELD} DESC");
    let page_size = config.page_size.max(1);
    let limit = usize::try_from(options.limit).unwrap_or(usize::MAX);

    let mut events: Vec<CrimeEvent> = Vec::new();
    let mut offset: u64 = 0;
    let mut skipped: u64 = 0;

    progress.set_total(options.limit);
    log::debug!("{}: where {where_clause}", config.label);

    while events.len() < limit {
        let offset_param = offset.to_string();
        let page_size_param = page_size.to_string();
        log::info!(
            "{}: offset={offset}, limit={page_size} ({} fetched)",
            config.label,
            events.len()
        );

        let response = client
            .get(config.query_url)
            .query(&[
                ("where", where_clause.as_str()),
                ("outFields", out_fields.as_str()),
                ("returnGeometry", "false"),
                ("orderByFields", order_by.as_str()),
                ("f", "json"),
                ("resultOffset", offset_param.as_str()),
                ("resultRecordCount", page_size_param.as_str()),
            ])
            .timeout(config.timeout)
            .send()
            .await?
            .error_for_status()?;
        let body: serde_json::Value = response.json().await?;

        // ArcGIS reports query errors with HTTP 200 and an `error` object.
        if let Some(error) = body.get("error") {
            return Err(api_error(error));
        }

        let features = body
            .get("features")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| {
                SourceError::Parse(format!(
                    "{}: response at offset {offset} has no features array",
                    config.label
                ))
            })?;
        let count = features.len() as u64;
        let before = events.len();

        for feature in features {
            if events.len() >= limit {
                break;
            }
            match parse_feature(feature, config.timezone) {
                Some(event) if event.occurred_at.naive_utc().date() >= options.since => {
                    events.push(event);
                }
                Some(event) => {
                    log::debug!(
                        "{}: dropping event dated {} before {}",
                        config.label,
                        event.occurred_at,
                        options.since
                    );
                    skipped += 1;
                }
                None => {
                    log::warn!("{}: skipping feature without {DATE_FIELD}", config.label);
                    skipped += 1;
                }
            }
        }
        progress.inc((events.len() - before) as u64);

        if count < page_size {
            break;
        }
        offset += count;
    }

    if skipped > 0 {
        log::warn!("{}: skipped {skipped} unusable features", config.label);
    }
    log::info!(
        "{}: download complete, {} records",
        config.label,
        events.len()
    );
    progress.finish(format!("{}: {} records", config.label, events.len()));

    Ok(events)
}

/// Converts one `{ "attributes": {...} }` feature into a [`CrimeEvent`].
///
/// Returns `None` when the occurrence timestamp is missing or unusable.
#[must_use]
pub fn parse_feature(feature: &serde_json::Value, timezone: Tz) -> Option<CrimeEvent> {
    let attrs = feature.get("attributes")?;
    let ms = attrs.get(DATE_FIELD).and_then(attr_epoch_ms)?;
    let occurred_at = epoch_ms_to_local(ms, timezone)?;

    Some(CrimeEvent {
        local_date: occurred_at.date_naive(),
        occurred_at,
        offence: attr_string(attrs.get(OFFENCE_FIELD)),
        category: attr_string(attrs.get(CATEGORY_FIELD)),
        neighbourhood: attr_string(attrs.get(REGION_FIELD)),
    })
}

fn api_error(error: &serde_json::Value) -> SourceError {
    let code = error
        .get("code")
        .and_then(serde_json::Value::as_i64)
        .unwrap_or_default();
    let mut message = attr_string(error.get("message"));
    if let Some(details) = error.get("details").and_then(serde_json::Value::as_array) {
        let details = details
            .iter()
            .map(|d| attr_string(Some(d)))
            .filter(|d| !d.is_empty())
            .collect::<Vec<_>>();
        if !details.is_empty() {
            message = format!("{message} ({})", details.join("; "));
        }
    }
    SourceError::Api { code, message }
}
