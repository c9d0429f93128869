#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Rendering of the weekly digest.
//!
//! A [`ReportComposer`] turns a [`ReportBundle`] into text. The default
//! [`MarkdownComposer`] produces the Markdown digest that is written to disk
//! and later mailed to subscribers.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use weston_brief_models::ReportBundle;

/// Errors that can occur while writing or reading the rendered report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The report has not been generated yet.
    #[error("Report not found at {0}. Run the generate step first.")]
    Missing(PathBuf),

    /// I/O error (directory creation, file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Renders a [`ReportBundle`] into a document.
pub trait ReportComposer {
    /// Renders the report. Must not depend on anything but `bundle`.
    fn render(&self, bundle: &ReportBundle) -> String;
}

/// Markdown digest renderer.
#[derive(Debug, Clone)]
pub struct MarkdownComposer {
    title: String,
}

impl Default for MarkdownComposer {
    fn default() -> Self {
        Self::new("Weston Wolverine Brief")
    }
}

impl MarkdownComposer {
    /// Creates a composer with the given document title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

const fn plural(count: u64) -> &'static str {
    if count == 1 { "" } else { "s" }
}

impl ReportComposer for MarkdownComposer {
    fn render(&self, bundle: &ReportBundle) -> String {
        let mut lines = vec![
            format!("# {}", self.title),
            String::new(),
            format!(
                "**{} to {}**",
                format_date(bundle.start_date),
                format_date(bundle.end_date)
            ),
            String::new(),
            "## Public safety".to_string(),
            String::new(),
        ];

        if bundle.total_crimes == 0 {
            lines.push("No major crime incidents were reported for this period.".to_string());
        } else {
            lines.push(format!(
                "{} major crime incident{} reported:",
                bundle.total_crimes,
                if bundle.total_crimes == 1 { " was" } else { "s were" }
            ));
            lines.push(String::new());
            for (category, count) in &bundle.crime_counts {
                lines.push(format!("- {category}: {count}"));
            }
        }

        lines.push(String::new());
        lines.push("## Building permits".to_string());
        lines.push(String::new());

        if bundle.permits_total == 0 {
            lines.push("No active building permits were found for the area.".to_string());
        } else {
            lines.push(format!(
                "{} active building permit{} in the area. Most common types of work:",
                bundle.permits_total,
                plural(bundle.permits_total)
            ));
            lines.push(String::new());
            for entry in &bundle.top_permits {
                lines.push(format!("- {}: {}", entry.work, entry.count));
            }
        }

        lines.push(String::new());
        lines.push("## Council update".to_string());
        lines.push(String::new());
        lines.push(bundle.council_note.trim().to_string());
        lines.push(String::new());

        lines.join("\n")
    }
}

/// Writes the rendered report to `path`, replacing any previous report.
///
/// # Errors
///
/// Returns [`ReportError::Io`] if the directory or file cannot be written.
pub fn write_report(path: &Path, content: &str) -> Result<(), ReportError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    log::info!("Digest generated at {}", path.display());
    Ok(())
}

/// Reads a previously generated report.
///
/// # Errors
///
/// Returns [`ReportError::Missing`] if no report exists at `path`, or
/// [`ReportError::Io`] if it cannot be read.
pub fn load_report(path: &Path) -> Result<String, ReportError> {
    if !path.is_file() {
        return Err(ReportError::Missing(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}
