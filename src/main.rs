//! redreport - time and effort reports for Redmine projects
//!
//! A CLI tool that fetches a project's time entries and issues, aggregates
//! them into report tables, and writes or delivers the rendered report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, fetch, render or delivery failure)

mod cli;
mod config;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use redreport::delivery::Delivery;
use redreport::tracker::{RedmineClient, TrackerResolver};
use redreport::{ReportEngine, RunOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args)?;

    info!("redreport v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_report(args).await {
        error!("Report failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Handle --init-config: generate a default .redreport.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to set the tracker URL, closed statuses, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) -> Result<()> {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run the complete report workflow.
async fn run_report(args: Args) -> Result<()> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let client = Arc::new(
        RedmineClient::new(config.redmine_config()?).context("Failed to create tracker client")?,
    );
    let resolver = Arc::new(TrackerResolver::new(client.clone()));
    let engine = ReportEngine::new(client, resolver).with_settings(config.engine_settings());

    let format = config.report.default_format;
    let requests = args.requests(format);
    let projects = args.projects().join(", ");

    let spinner = (!args.quiet).then(|| fetch_spinner(&projects));
    let outcome = if args.is_comparison() {
        engine.run_comparison(&requests).await
    } else {
        match requests.first() {
            Some(request) => engine.run(request).await,
            None => anyhow::bail!("At least one project is required"),
        }
    };
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let RunOutcome { artifact, delivery } =
        outcome.with_context(|| format!("Failed to build report for {}", projects))?;
    info!(
        "Rendered {} ({} bytes) in {:.1}s",
        artifact.filename,
        artifact.bytes.len(),
        start_time.elapsed().as_secs_f64()
    );

    match delivery {
        Ok(Delivery::Stored { location }) => {
            println!("\n✅ Report delivered: {}", location);
        }
        Ok(Delivery::Inline { base64, .. }) if args.inline => {
            println!("{}", base64);
        }
        Ok(Delivery::Inline { .. }) => {
            let path = output_path(&args, &config, &artifact.filename);
            write_report(&path, &artifact.bytes)?;
            println!("\n✅ Report saved to: {}", path.display());
        }
        Err(e) => {
            // Keep the rendered report so the run does not have to be repeated.
            let path = config.report.output_dir.join(&artifact.filename);
            match write_report(&path, &artifact.bytes) {
                Ok(()) => warn!("Delivery failed, report kept at {}", path.display()),
                Err(write_err) => warn!("Could not keep report locally: {:#}", write_err),
            }
            return Err(e).context("Failed to deliver report");
        }
    }

    Ok(())
}

fn fetch_spinner(projects: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("Fetching time entries and issues for {}", projects));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn output_path(args: &Args, config: &Config, filename: &str) -> PathBuf {
    args.output
        .clone()
        .unwrap_or_else(|| config.report.output_dir.join(filename))
}

fn write_report(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_from_dir(Path::new(".")) {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
