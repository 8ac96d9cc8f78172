//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.redreport.toml` files.

use anyhow::{bail, Context, Result};
use redreport::analysis::{
    AggregateOptions, ClosedClassifier, DEFAULT_HOURS_PER_DAY, TOP_ISSUES_LIMIT,
};
use redreport::delivery::DEFAULT_WIKI_PAGE;
use redreport::engine::EngineSettings;
use redreport::fetch::DEFAULT_PAGE_SIZE;
use redreport::models::OutputFormat;
use redreport::tracker::RedmineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = ".redreport.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Tracker connection settings.
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Report output settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Tracker connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Base URL of the tracker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// REST API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    60
}

/// How an issue is classified as closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedBy {
    /// The issue has a closed-on date.
    #[default]
    ClosedOn,
    /// The status name is listed in `closed_statuses`.
    StatusName,
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Records requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Maximum rows in the top-issues table.
    #[serde(default = "default_top_issues")]
    pub top_issues_limit: usize,

    /// Working hours in one person-day.
    #[serde(default = "default_hours_per_day")]
    pub hours_per_day: f64,

    #[serde(default)]
    pub closed_by: ClosedBy,

    /// Status names that count as closed, in every language the tracker uses.
    #[serde(default = "default_closed_statuses")]
    pub closed_statuses: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            top_issues_limit: default_top_issues(),
            hours_per_day: default_hours_per_day(),
            closed_by: ClosedBy::default(),
            closed_statuses: default_closed_statuses(),
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_top_issues() -> usize {
    TOP_ISSUES_LIMIT
}

fn default_hours_per_day() -> f64 {
    DEFAULT_HOURS_PER_DAY
}

fn default_closed_statuses() -> Vec<String> {
    vec![
        "Closed",
        "Rejected",
        "Fermé",
        "Rejeté",
        "Geschlossen",
        "Abgewiesen",
        "Cerrado",
        "Rechazado",
        "Chiuso",
        "Respinto",
        "Fechado",
        "Rejeitado",
        "Закрыт",
        "Отклонён",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Format used when `--format` is not given.
    #[serde(default)]
    pub default_format: OutputFormat,

    /// Wiki page used by a bare `wiki` target.
    #[serde(default = "default_wiki_page")]
    pub wiki_page: String,

    /// Directory for reports written without `--output`.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            default_format: OutputFormat::default(),
            wiki_page: default_wiki_page(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_wiki_page() -> String {
    DEFAULT_WIKI_PAGE.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from `dir`.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.url {
            self.tracker.url = Some(url.clone());
        }
        if let Some(ref api_key) = args.api_key {
            self.tracker.api_key = Some(api_key.clone());
        }
        if let Some(format) = args.format {
            self.report.default_format = format;
        }
    }

    /// Client settings, failing when no tracker URL is configured.
    pub fn redmine_config(&self) -> Result<RedmineConfig> {
        let Some(ref url) = self.tracker.url else {
            bail!("No tracker URL configured (use --url, REDMINE_URL or [tracker] url)");
        };
        if !url.starts_with("http://") && !url.starts_with("https://") {
            bail!("Tracker URL must start with 'http://' or 'https://'");
        }

        Ok(RedmineConfig {
            base_url: url.trim_end_matches('/').to_string(),
            api_key: self.tracker.api_key.clone(),
            timeout_seconds: self.tracker.timeout_seconds,
        })
    }

    pub fn classifier(&self) -> ClosedClassifier {
        match self.analysis.closed_by {
            ClosedBy::ClosedOn => ClosedClassifier::ClosedDate,
            ClosedBy::StatusName => ClosedClassifier::status_names(&self.analysis.closed_statuses),
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            page_size: self.analysis.page_size,
            aggregate: AggregateOptions {
                top_issues_limit: self.analysis.top_issues_limit,
                hours_per_day: self.analysis.hours_per_day,
                classifier: self.classifier(),
            },
            wiki_page: self.report.wiki_page.clone(),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
