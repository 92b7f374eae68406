//! CLI entry point for the community analytics tools.
//!
//! Each subcommand runs one analysis over the Calgary open data portal (or a
//! directory of dataset snapshots) and writes its reports; `all` runs every
//! analysis with one fetch per dataset.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use community_analytics::config::AnalyticsConfig;
use community_analytics::fetch::auth::AppToken;
use community_analytics::fetch::{BasicClient, DataSource, DatasetLoader, DirectorySource, SocrataSource};
use community_analytics::output::ReportWriter;
use community_analytics::tools::{self, Tool};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "community_analytics")]
#[command(about = "Community-level analytics over Calgary open data", long_about = None)]
struct Cli {
    /// Portal URL or a directory of `<dataset_id>.json` snapshots
    /// [default: the configured portal URL]
    #[arg(long, global = true, value_name = "URL_OR_DIR")]
    source: Option<String>,

    /// Directory the reports are written to
    #[arg(short, long, global = true, default_value = "reports")]
    output_dir: PathBuf,

    /// JSON config file overriding the built-in defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Communities with the most permit activity relative to their value
    PermitHotspots,
    /// Crime rate against median property value, with BUY/SELL/HOLD signals
    CrimeArbitrage,
    /// Populous communities with little commercial activity
    BusinessDeserts,
    /// Permit velocity over recent months against the months before
    ConstructionBoom,
    /// Permit activity around CTrain stations
    TransitRadar,
    /// Permit rate weighted by property value
    Gentrification,
    /// Composite score over every dataset
    CrossAnalyze,
    /// Crime totals and categories per community
    CrimeDashboard,
    /// Run every analysis
    All,
}

impl Commands {
    fn tools(self) -> &'static [Tool] {
        match self {
            Commands::PermitHotspots => &[Tool::PermitHotspots],
            Commands::CrimeArbitrage => &[Tool::CrimeArbitrage],
            Commands::BusinessDeserts => &[Tool::BusinessDeserts],
            Commands::ConstructionBoom => &[Tool::ConstructionBoom],
            Commands::TransitRadar => &[Tool::TransitRadar],
            Commands::Gentrification => &[Tool::Gentrification],
            Commands::CrossAnalyze => &[Tool::CrossAnalyze],
            Commands::CrimeDashboard => &[Tool::CrimeDashboard],
            Commands::All => &Tool::ALL,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/community_analytics.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("community_analytics.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AnalyticsConfig::load(path)?,
        None => AnalyticsConfig::default(),
    };
    let source_arg = cli
        .source
        .clone()
        .unwrap_or_else(|| config.source.base_url.clone());
    let source = build_source(&source_arg, &config)?;

    let mut loader = DatasetLoader::new(&*source, &config.datasets);
    let files = tools::run_all(cli.command.tools(), &mut loader, &config).await?;

    let written = ReportWriter::new(cli.output_dir.clone()).write_all(&files)?;
    info!(
        files = written.len(),
        output_dir = %cli.output_dir.display(),
        "Reports written"
    );
    Ok(())
}

/// Portal client for URLs, snapshot directory for anything else.
#[tracing::instrument(skip(config))]
fn build_source(source: &str, config: &AnalyticsConfig) -> Result<Box<dyn DataSource>> {
    if !source.starts_with("http") {
        return Ok(Box::new(DirectorySource::new(source)));
    }

    let client = BasicClient::new(Duration::from_secs(config.source.timeout_secs))
        .context("building HTTP client")?;
    let token = std::env::var(&config.source.app_token_env)
        .ok()
        .filter(|t| !t.trim().is_empty());

    match token {
        Some(token) => {
            let client = AppToken::new(client, &token)
                .with_context(|| format!("{} is not a valid header value", config.source.app_token_env))?;
            Ok(Box::new(SocrataSource::new(client, source)))
        }
        None => {
            warn!(
                env = %config.source.app_token_env,
                "No app token set; requests are subject to anonymous rate limits"
            );
            Ok(Box::new(SocrataSource::new(client, source)))
        }
    }
}
