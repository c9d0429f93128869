#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the Weston Brief weekly digest.
//!
//! `scrape` fetches crime and permit data into snapshots, `generate` renders
//! the digest from the snapshots, `send` mails it to subscribers, and `run`
//! does all three in order.

mod pipeline;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use weston_brief_cli_utils::IndicatifProgress;
use weston_brief_config::BriefConfig;

#[derive(Parser)]
#[command(name = "weston_brief", about = "Weston Wolverine Brief weekly digest")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Settings that take precedence over the config file and environment.
#[derive(Args)]
struct Overrides {
    /// Days of crime data to fetch, counting back from today
    #[arg(long, global = true)]
    days_back: Option<u32>,
    /// Council update printed in the digest
    #[arg(long, global = true)]
    council_note: Option<String>,
    /// Number of permit CSV rows to read
    #[arg(long, global = true)]
    row_cap: Option<u64>,
    /// Postal code prefix selecting permits in the area
    #[arg(long, global = true)]
    postal_prefix: Option<String>,
    /// Number of permit work types listed in the digest
    #[arg(long, global = true)]
    top_n: Option<usize>,
}

impl Overrides {
    fn apply(self, config: &mut BriefConfig) {
        if let Some(days) = self.days_back {
            config.lookback_days = days;
        }
        if let Some(note) = self.council_note {
            config.council_note = Some(note);
        }
        if let Some(cap) = self.row_cap {
            config.row_cap = cap;
        }
        if let Some(prefix) = self.postal_prefix {
            config.postal_prefix = prefix;
        }
        if let Some(top_n) = self.top_n {
            config.top_n = top_n;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch crime and permit data into the snapshot directory
    Scrape,
    /// Render the digest from the current snapshots
    Generate,
    /// Mail the generated digest to every subscriber
    Send,
    /// Scrape, generate, and send in one go
    Run {
        /// Stop after generating the digest
        #[arg(long)]
        no_send: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = weston_brief_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = BriefConfig::load(cli.config.as_deref())?;
    cli.overrides.apply(&mut config);
    let today = pipeline::today(&config)?;

    match cli.command {
        Commands::Scrape => {
            let progress = IndicatifProgress::records_bar(&multi, "Fetching crime data");
            let report = pipeline::scrape(&config, today, &progress).await?;
            log::info!("Crimes: {}. Permits: {}.", report.crimes, report.permits);
        }
        Commands::Generate => {
            pipeline::generate(&config, today)?;
        }
        Commands::Send => {
            pipeline::send(&config).await?;
        }
        Commands::Run { no_send } => {
            let progress = IndicatifProgress::records_bar(&multi, "Fetching crime data");
            pipeline::run(&config, today, &progress, !no_send, |key| {
                std::env::var(key).ok()
            })
            .await?;
        }
    }

    Ok(())
}
