#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Run configuration for the Weston Brief pipeline.
//!
//! [`BriefConfig`] is built once at startup and passed to every step. Values
//! are layered: built-in defaults, then an optional TOML file, then
//! environment variables, then CLI flags (applied by the binary).
//!
//! Delivery secrets are never part of the TOML file. They are read from the
//! environment into [`DeliveryCredentials`] right before the send step.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use weston_brief_models::{DEFAULT_PAGE_SIZE, DEFAULT_TOP_N, DEFAULT_WINDOW_DAYS};

/// Feature service endpoint for Toronto Police major crime indicators.
pub const DEFAULT_CRIME_QUERY_URL: &str = "https://services.arcgis.com/S9th0jAJ7bqgIRjw/ArcGIS/rest/services/Major_Crime_Indicators_Open_Data/FeatureServer/0/query";

/// City of Toronto active building permits CSV.
pub const DEFAULT_PERMITS_CSV_URL: &str = "https://ckan0.cf.opendata.inter.prod-toronto.ca/dataset/108c2bd1-6945-46f6-af92-02f5658ee7f7/resource/dfce3b7b-4f17-4a9d-9155-5e390a5ffa97/download/building-permits-active-permits.csv";

/// Brevo transactional email endpoint.
pub const DEFAULT_BREVO_URL: &str = "https://api.brevo.com/v3/smtp/email";

/// Council update used when no override note is configured.
pub const DEFAULT_COUNCIL_NOTE: &str = "City Council recently considered development applications at \
1175\u{2013}1181 Weston Road and 7\u{2013}17 Locust Street.  Council refused the \
applications and the developer has appealed to the Ontario Land Tribunal; \
the first case management conference is scheduled for May 20 2025.";

/// Errors raised while building configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`BriefConfig`].
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value was present but could not be used.
    #[error("Invalid value for {key}: {message}")]
    Invalid {
        /// Setting name.
        key: String,
        /// What was wrong with it.
        message: String,
    },

    /// A required setting is absent.
    #[error("Missing required setting: {0}")]
    Missing(String),
}

/// Options for a single pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BriefConfig {
    /// Number of days before today to start fetching crime events from.
    pub lookback_days: u32,
    /// Neighbourhood labels included in the crime query.
    pub regions: Vec<String>,
    /// Safety cap on crime events across all pages.
    pub max_records: u64,
    /// Records requested per crime query page.
    pub page_size: u64,
    /// Timeout for each crime query page, in seconds.
    pub query_timeout_secs: u64,
    /// Crime feature service query URL.
    pub crime_query_url: String,
    /// Permit dataset CSV URL.
    pub permits_csv_url: String,
    /// Number of permit rows read from the start of the CSV.
    pub row_cap: u64,
    /// Postal code prefix that selects permits in the area.
    pub postal_prefix: String,
    /// Number of permit work types listed in the report.
    pub top_n: usize,
    /// Council update override. [`DEFAULT_COUNCIL_NOTE`] is used when unset.
    pub council_note: Option<String>,
    /// IANA timezone used to bucket events into local dates.
    pub timezone: String,
    /// Directory holding the dataset snapshots.
    pub data_dir: PathBuf,
    /// Directory the rendered report is written to.
    pub output_dir: PathBuf,
    /// Email subject line.
    pub email_subject: String,
    /// Display name of the email sender.
    pub sender_name: String,
    /// Address of the email sender.
    pub sender_email: String,
    /// Transactional email endpoint.
    pub brevo_url: String,
}

impl Default for BriefConfig {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_WINDOW_DAYS,
            regions: vec![
                "Weston (113)".to_string(),
                "Weston-Pelham Park (91)".to_string(),
            ],
            max_records: 10_000,
            page_size: DEFAULT_PAGE_SIZE,
            query_timeout_secs: 60,
            crime_query_url: DEFAULT_CRIME_QUERY_URL.to_string(),
            permits_csv_url: DEFAULT_PERMITS_CSV_URL.to_string(),
            row_cap: 50_000,
            postal_prefix: "M9N".to_string(),
            top_n: DEFAULT_TOP_N,
            council_note: None,
            timezone: "America/Toronto".to_string(),
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            email_subject: "Your Weston Wolverine Brief".to_string(),
            sender_name: "Weston Wolverine".to_string(),
            sender_email: "noreply@example.com".to_string(),
            brevo_url: DEFAULT_BREVO_URL.to_string(),
        }
    }
}

impl BriefConfig {
    /// Loads configuration from an optional TOML file and the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or an
    /// environment override is not a valid value.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parses a TOML config file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Applies environment overrides using `lookup` to read variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric variable does not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(days) = lookup("DAYS_BACK") {
            self.lookback_days = parse_env("DAYS_BACK", &days)?;
        }
        if let Some(note) = lookup("COUNCIL_NOTE") {
            self.council_note = Some(note);
        }
        if let Some(cap) = lookup("PERMIT_ROW_CAP") {
            self.row_cap = parse_env("PERMIT_ROW_CAP", &cap)?;
        }
        if let Some(prefix) = lookup("POSTAL_PREFIX") {
            self.postal_prefix = prefix;
        }
        if let Some(top_n) = lookup("TOP_N") {
            self.top_n = parse_env("TOP_N", &top_n)?;
        }
        if let Some(dir) = lookup("WESTON_BRIEF_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("WESTON_BRIEF_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// The council note to print in the report.
    #[must_use]
    pub fn council_note(&self) -> &str {
        self.council_note.as_deref().unwrap_or(DEFAULT_COUNCIL_NOTE)
    }

    /// Parses [`Self::timezone`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the name is not a known IANA zone.
    pub fn tz(&self) -> Result<chrono_tz::Tz, ConfigError> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| ConfigError::Invalid {
                key: "timezone".to_string(),
                message: format!("unknown timezone '{}'", self.timezone),
            })
    }

    /// Path of the rendered report.
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join("weekly_digest.md")
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            message: format!("'{value}': {e}"),
        })
}

/// Secrets needed by the send step.
#[derive(Clone)]
pub struct DeliveryCredentials {
    /// Base URL of the Supabase project holding the subscriber table.
    pub supabase_url: String,
    /// Supabase service role key.
    pub supabase_service_key: String,
    /// Brevo API key.
    pub brevo_api_key: String,
}

impl std::fmt::Debug for DeliveryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryCredentials")
            .field("supabase_url", &self.supabase_url)
            .finish_non_exhaustive()
    }
}

impl DeliveryCredentials {
    /// Reads credentials from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming the first absent variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads credentials using `lookup`. Empty values count as missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming the first absent variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::Missing(key.to_string()))
        };
        Ok(Self {
            supabase_url: require("SUPABASE_URL")?,
            supabase_service_key: require("SUPABASE_SERVICE_KEY")?,
            brevo_api_key: require("BREVO_API_KEY")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_weekly_job() {
        let config = BriefConfig::default();
        assert_eq!(config.lookback_days, 7);
        assert_eq!(config.row_cap, 50_000);
        assert_eq!(config.postal_prefix, "M9N");
        assert_eq!(config.top_n, 5);
        assert_eq!(config.page_size, 2000);
        assert_eq!(config.council_note(), DEFAULT_COUNCIL_NOTE);
        assert_eq!(config.report_path(), PathBuf::from("output/weekly_digest.md"));
    }

    #[test]
    fn env_overrides_defaults() {
        let mut config = BriefConfig::default();
        config
            .apply_env(env(&[
                ("DAYS_BACK", "14"),
                ("COUNCIL_NOTE", "No meeting this week."),
                ("POSTAL_PREFIX", "M6H"),
                ("TOP_N", "3"),
            ]))
            .unwrap();
        assert_eq!(config.lookback_days, 14);
        assert_eq!(config.council_note(), "No meeting this week.");
        assert_eq!(config.postal_prefix, "M6H");
        assert_eq!(config.top_n, 3);
        assert_eq!(config.row_cap, 50_000);
    }

    #[test]
    fn rejects_non_numeric_env_value() {
        let mut config = BriefConfig::default();
        let err = config.apply_env(env(&[("DAYS_BACK", "a week")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "DAYS_BACK"));
    }

    #[test]
    fn toml_file_keeps_unset_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brief.toml");
        std::fs::write(&path, "row_cap = 1000\nregions = [\"Weston (113)\"]\n").unwrap();

        let config = BriefConfig::from_file(&path).unwrap();
        assert_eq!(config.row_cap, 1000);
        assert_eq!(config.regions, vec!["Weston (113)".to_string()]);
        assert_eq!(config.max_records, 10_000);
    }

    #[test]
    fn toml_file_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brief.toml");
        std::fs::write(&path, "row_capp = 1000\n").unwrap();

        assert!(matches!(
            BriefConfig::from_file(&path),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn parses_default_timezone() {
        assert_eq!(
            BriefConfig::default().tz().unwrap(),
            chrono_tz::America::Toronto
        );
    }

    #[test]
    fn missing_credentials_name_the_variable() {
        let err = DeliveryCredentials::from_lookup(env(&[
            ("SUPABASE_URL", "https://example.supabase.co"),
            ("SUPABASE_SERVICE_KEY", "  "),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref key) if key == "SUPABASE_SERVICE_KEY"));
    }

    #[test]
    fn reads_complete_credentials() {
        let creds = DeliveryCredentials::from_lookup(env(&[
            ("SUPABASE_URL", "https://example.supabase.co"),
            ("SUPABASE_SERVICE_KEY", "service"),
            ("BREVO_API_KEY", "brevo"),
        ]))
        .unwrap();
        assert_eq!(creds.brevo_api_key, "brevo");
        assert!(!format!("{creds:?}").contains("service"));
    }
}
