//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use chrono::NaiveDate;
use clap::Parser;
use redreport::delivery::DeliveryTarget;
use redreport::models::{AnalysisRequest, IssueStatusFilter, OutputFormat};
use std::path::PathBuf;

/// redreport - time and effort reports for a Redmine project
///
/// Fetches every time entry and issue of a project, aggregates them into
/// per-tracker, per-user, per-version, per-month and custom-field tables,
/// and renders JSON, CSV or XLSX. The report can be stored back into the
/// tracker as a project file, an issue attachment, a wiki line or a DMSF
/// document.
///
/// Examples:
///   redreport --project web --from 2024-01-01 --to 2024-03-31
///   redreport --project web --format spreadsheet --deliver files:2.0
///   redreport --project web,api --format tabular
///   redreport --project web --deliver wiki:Effort
///   redreport --init-config
// `--version` is the version filter, so clap's version flag is not generated.
#[derive(Parser, Debug, Clone)]
#[command(author, about, long_about = None)]
pub struct Args {
    /// Project identifier(s) to analyze (comma-separated)
    ///
    /// More than one project produces a side-by-side comparison.
    #[arg(
        short,
        long,
        value_name = "ID",
        value_delimiter = ',',
        required_unless_present = "init_config"
    )]
    pub project: Vec<String>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub to: Option<NaiveDate>,

    /// Which issues to include
    #[arg(long, default_value = "all", value_name = "STATUS")]
    pub status: IssueStatusFilter,

    /// Only issues fixed in this version (name or id)
    #[arg(long, value_name = "NAME")]
    pub version: Option<String>,

    /// Custom fields to aggregate (comma-separated)
    ///
    /// Every field that appears on an issue is aggregated when omitted.
    #[arg(long, value_name = "FIELDS", value_delimiter = ',')]
    pub custom_fields: Vec<String>,

    /// Output format (structured, tabular, spreadsheet)
    ///
    /// Default: from config, otherwise structured.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Store the report in the tracker
    ///
    /// files[:VERSION], issue:ID, wiki[:PAGE] or dmsf[:FOLDER_ID]
    #[arg(short, long, value_name = "TARGET")]
    pub deliver: Option<DeliveryTarget>,

    /// Output file path for the report
    ///
    /// Default: <project>_time_report_<YYYYMMDD>.<ext> in the configured output_dir.
    #[arg(short, long, value_name = "FILE", conflicts_with = "inline")]
    pub output: Option<PathBuf>,

    /// Print the report base64-encoded to stdout instead of writing a file
    #[arg(long, conflicts_with = "deliver")]
    pub inline: bool,

    /// Tracker base URL
    #[arg(long, value_name = "URL", env = "REDMINE_URL")]
    pub url: Option<String>,

    /// Tracker REST API key
    #[arg(long, value_name = "KEY", env = "REDMINE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .redreport.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .redreport.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Project identifiers with blanks removed.
    pub fn projects(&self) -> Vec<String> {
        self.project
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn is_comparison(&self) -> bool {
        self.projects().len() > 1
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.projects().is_empty() {
            return Err("At least one project is required".to_string());
        }

        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(format!("--from ({}) must not be after --to ({})", from, to));
            }
        }

        if let Some(ref url) = self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Tracker URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// One request per project, all sharing the same filters.
    pub fn requests(&self, format: OutputFormat) -> Vec<AnalysisRequest> {
        self.projects()
            .into_iter()
            .map(|project| AnalysisRequest {
                project,
                date_from: self.from,
                date_to: self.to,
                issue_status: self.status,
                version: self.version.clone(),
                custom_fields: self
                    .custom_fields
                    .iter()
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect(),
                output_format: format,
                delivery_target: self.deliver.clone(),
            })
            .collect()
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redreport::delivery::IssueTarget;

    fn make_args() -> Args {
        Args {
            project: vec!["web".to_string()],
            from: None,
            to: None,
            status: IssueStatusFilter::All,
            version: None,
            custom_fields: vec![],
            format: None,
            deliver: None,
            output: None,
            inline: false,
            url: Some("https://redmine.example.com".to_string()),
            api_key: None,
            config: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_full_command_line() {
        let args = Args::try_parse_from([
            "redreport",
            "--project",
            "web,api",
            "--from",
            "2024-01-01",
            "--to",
            "2024-03-31",
            "--status",
            "closed",
            "--custom-fields",
            "Component,Severity",
            "--format",
            "xlsx",
            "--deliver",
            "issue:42",
        ])
        .unwrap();

        assert_eq!(args.projects(), vec!["web", "api"]);
        assert!(args.is_comparison());
        assert_eq!(args.from, Some(date("2024-01-01")));
        assert_eq!(args.status, IssueStatusFilter::Closed);
        assert_eq!(args.custom_fields, vec!["Component", "Severity"]);
        assert_eq!(args.format, Some(OutputFormat::Spreadsheet));
        assert_eq!(
            args.deliver,
            Some(DeliveryTarget::Issue(IssueTarget { issue_id: 42 }))
        );
    }

    #[test]
    fn test_bad_delivery_target_rejected_at_parse() {
        let result = Args::try_parse_from(["redreport", "--project", "web", "--deliver", "ftp:x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_date_rejected_at_parse() {
        let result =
            Args::try_parse_from(["redreport", "--project", "web", "--from", "03/01/2024"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_date_order() {
        let mut args = make_args();
        args.from = Some(date("2024-03-01"));
        args.to = Some(date("2024-02-01"));
        assert!(args.validate().is_err());

        args.to = Some(date("2024-03-01"));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.url = Some("redmine.example.com".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_blank_project() {
        let mut args = make_args();
        args.project = vec![" ".to_string()];
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_requests_share_filters() {
        let mut args = make_args();
        args.project = vec!["web".to_string(), "api".to_string()];
        args.version = Some("2.0".to_string());
        args.custom_fields = vec![" Component ".to_string(), "".to_string()];

        let requests = args.requests(OutputFormat::Tabular);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].project, "api");
        assert_eq!(requests[1].version.as_deref(), Some("2.0"));
        assert_eq!(requests[0].custom_fields, vec!["Component"]);
        assert_eq!(requests[0].output_format, OutputFormat::Tabular);
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
