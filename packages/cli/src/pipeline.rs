//! The three steps of a weekly run: scrape, generate, send.
//!
//! Steps communicate only through files: scrape writes the dataset
//! snapshots, generate reads them and writes the report, send mails the
//! report. Each step can be rerun on its own.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use weston_brief_config::{BriefConfig, DeliveryCredentials};
use weston_brief_distribute::{BrevoMailer, DeliverySummary, SupabaseRecipients, distribute};
use weston_brief_models::{CrimeEvent, PermitSummaryEntry};
use weston_brief_report::{MarkdownComposer, ReportComposer, load_report, write_report};
use weston_brief_snapshot::SnapshotStore;
use weston_brief_source::FetchOptions;
use weston_brief_source::arcgis::{ArcGisConfig, fetch_arcgis};
use weston_brief_source::csv_download::{CsvDownloadConfig, fetch_permit_summary};
use weston_brief_source::progress::ProgressCallback;

type StepResult<T> = Result<T, Box<dyn std::error::Error>>;

/// What happened to one dataset during a scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Fetched and saved this many rows.
    Saved(usize),
    /// The fetch succeeded but found nothing; the previous snapshot was kept.
    Empty,
    /// The fetch failed; the previous snapshot was kept.
    Failed(String),
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Saved(rows) => write!(f, "saved {rows} rows"),
            Self::Empty => write!(f, "no data, kept previous snapshot"),
            Self::Failed(reason) => write!(f, "failed ({reason}), kept previous snapshot"),
        }
    }
}

/// Result of [`scrape`] for both datasets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeReport {
    /// Crime events.
    pub crimes: StepOutcome,
    /// Permit summary.
    pub permits: StepOutcome,
}

/// Today's date in the configured timezone.
///
/// # Errors
///
/// Returns an error if the configured timezone is unknown.
pub fn today(config: &BriefConfig) -> StepResult<NaiveDate> {
    let tz = config.tz()?;
    Ok(Utc::now().with_timezone(&tz).date_naive())
}

/// Fetches both datasets and saves them as snapshots.
///
/// A failed fetch is logged and leaves that dataset's previous snapshot in
/// place; the other dataset is still fetched. An empty crime result is not
/// saved either, so the last week with data stays available.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or a snapshot cannot be
/// written.
pub async fn scrape(
    config: &BriefConfig,
    today: NaiveDate,
    progress: &Arc<dyn ProgressCallback>,
) -> StepResult<ScrapeReport> {
    let store = SnapshotStore::new(&config.data_dir);
    let since = today
        .checked_sub_days(Days::new(u64::from(config.lookback_days)))
        .unwrap_or(today);

    log::info!("Fetching crime data since {since}...");
    let arcgis = ArcGisConfig {
        query_url: &config.crime_query_url,
        label: "MCI",
        page_size: config.page_size,
        timeout: Duration::from_secs(config.query_timeout_secs),
        timezone: config.tz()?,
        regions: &config.regions,
    };
    let options = FetchOptions {
        since,
        limit: config.max_records,
    };
    let crimes = match fetch_arcgis(&arcgis, &options, progress).await {
        Ok(events) if events.is_empty() => {
            log::info!("No crime data found for the selected period.");
            StepOutcome::Empty
        }
        Ok(events) => {
            log::info!("Fetched {} crime records.", events.len());
            store.save::<CrimeEvent>(&events)?;
            StepOutcome::Saved(events.len())
        }
        Err(e) => {
            log::error!("Crime fetch failed, keeping previous snapshot: {e}");
            StepOutcome::Failed(e.to_string())
        }
    };

    log::info!("Fetching permit summary...");
    let csv = CsvDownloadConfig {
        url: &config.permits_csv_url,
        label: "Permits",
    };
    let permits =
        match fetch_permit_summary(&csv, &config.postal_prefix, config.row_cap).await {
            Ok(summary) => {
                store.save::<PermitSummaryEntry>(&summary)?;
                log::info!("Saved permit summary.");
                StepOutcome::Saved(summary.len())
            }
            Err(e) => {
                log::error!("Permit fetch failed, keeping previous snapshot: {e}");
                StepOutcome::Failed(e.to_string())
            }
        };

    Ok(ScrapeReport { crimes, permits })
}

/// Builds the report from the current snapshots and writes it to
/// [`BriefConfig::report_path`].
///
/// # Errors
///
/// Returns an error if a snapshot exists but cannot be read, or the report
/// cannot be written.
pub fn generate(config: &BriefConfig, today: NaiveDate) -> StepResult<PathBuf> {
    let store = SnapshotStore::new(&config.data_dir);
    let events = store.load::<CrimeEvent>()?;
    let permits = store.load::<PermitSummaryEntry>()?;

    let bundle = weston_brief_summary::build_bundle(
        &events,
        &permits,
        config.top_n,
        config.council_note(),
        today,
    );
    let content = MarkdownComposer::default().render(&bundle);

    let path = config.report_path();
    write_report(&path, &content)?;
    Ok(path)
}

/// Mails the generated report to every subscriber, reading the delivery
/// credentials from the environment.
///
/// # Errors
///
/// Returns an error if the report has not been generated, a delivery
/// credential is missing, or the subscriber lookup fails. Nothing is sent in
/// those cases.
pub async fn send(config: &BriefConfig) -> StepResult<DeliverySummary> {
    load_report(&config.report_path())?;
    let credentials = DeliveryCredentials::from_env()?;
    send_with(config, &credentials).await
}

/// Runs scrape, generate and, when `send_digest` is set, send.
///
/// Delivery credentials are resolved through `lookup` before anything is
/// fetched, so a run that cannot send fails without touching the network or
/// the snapshots.
///
/// # Errors
///
/// Returns an error if a credential is missing (when sending), or any step
/// fails as described on [`scrape`], [`generate`] and [`send`].
pub async fn run<F>(
    config: &BriefConfig,
    today: NaiveDate,
    progress: &Arc<dyn ProgressCallback>,
    send_digest: bool,
    lookup: F,
) -> StepResult<Option<DeliverySummary>>
where
    F: Fn(&str) -> Option<String>,
{
    let credentials = if send_digest {
        Some(DeliveryCredentials::from_lookup(lookup)?)
    } else {
        None
    };

    let report = scrape(config, today, progress).await?;
    log::info!("Crimes: {}. Permits: {}.", report.crimes, report.permits);
    generate(config, today)?;

    match credentials {
        Some(credentials) => Ok(Some(send_with(config, &credentials).await?)),
        None => {
            log::info!("Skipping send (--no-send)");
            Ok(None)
        }
    }
}

async fn send_with(
    config: &BriefConfig,
    credentials: &DeliveryCredentials,
) -> StepResult<DeliverySummary> {
    let content = load_report(&config.report_path())?;

    let store = SupabaseRecipients::from_credentials(credentials);
    let mailer = BrevoMailer::from_config(config, credentials);
    let summary = distribute(&store, &mailer, &config.email_subject, &content).await?;

    if summary.failed.is_empty() {
        log::info!("Digest sent to {} subscriber(s)", summary.sent.len());
    } else {
        log::warn!(
            "Digest sent to {} subscriber(s), {} failed",
            summary.sent.len(),
            summary.failed.len()
        );
    }
    Ok(summary)
}
