//! puck-ingest - NHL stats lake extraction and loading tool

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use puck_common::logging::{init_logging, LogConfig, LogLevel};
use puck_ingest::{Catalog, Config, Extractor, Pipeline, RequestIdSource};
use puck_loader::{db, IngestionStore, LoadReport};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "puck-ingest")]
#[command(author, version, about = "NHL stats lake extraction and loading tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List known endpoints
    Endpoints,

    /// Fetch documents and save them under the lake directory
    Extract {
        /// Endpoint name
        endpoint: String,

        /// Maximum number of requests for dynamic endpoints
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Load extracted files into the raw tables
    Load {
        /// Endpoint name
        endpoint: String,

        /// Only load files under these season folders (repeatable)
        #[arg(short, long = "season")]
        seasons: Vec<String>,

        /// Load only the first few files
        #[arg(long)]
        test_mode: bool,
    },

    /// Load the single document of a static endpoint
    LoadSingle {
        /// Endpoint name
        endpoint: String,
    },

    /// Show row count and ingested files of an endpoint's table
    Status {
        /// Endpoint name
        endpoint: String,
    },

    /// Extract then load
    ExtractLoad {
        /// Endpoint name
        endpoint: String,

        /// Maximum number of requests for dynamic endpoints
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::default()
        .with_level(log_level)
        .with_file_prefix("puck-ingest")
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    let config = Config::load().context("Failed to load configuration")?;
    let catalog = Catalog::nhl(&config.lake_base_dir, &config.target_schema)?;

    if let Command::Endpoints = cli.command {
        for endpoint in catalog.iter() {
            let kind = if endpoint.is_static() { "static" } else { "dynamic" };
            println!(
                "{:<24} {:<8} {:<10} {:<45} {}",
                endpoint.name,
                kind,
                endpoint.descriptor.load_mode(),
                endpoint.descriptor.display_name(),
                endpoint.description
            );
        }
        return Ok(());
    }

    let pool = db::create_pool(&config.database)
        .await
        .context("Failed to connect to the database")?;

    let pipeline = Pipeline::new(
        catalog,
        Extractor::new()?,
        IngestionStore::new(pool.clone()),
        RequestIdSource::new(pool, config.staging_schema.clone()),
    );

    match cli.command {
        Command::Endpoints => {},
        Command::Extract { endpoint, limit } => {
            let summary = pipeline.extract(&endpoint, limit).await?;
            info!(
                endpoint = %endpoint,
                requested = summary.requested,
                saved = summary.saved,
                "Extract finished"
            );
        },
        Command::Load {
            endpoint,
            seasons,
            test_mode,
        } => {
            let report = pipeline.load(&endpoint, &seasons, test_mode).await?;
            log_report(&report);
        },
        Command::LoadSingle { endpoint } => {
            let report = pipeline.load_single(&endpoint).await?;
            log_report(&report);
        },
        Command::Status { endpoint } => {
            let status = pipeline.status(&endpoint).await?;
            let last = status
                .last_ingested_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            println!("table:          {}", status.table);
            println!("rows:           {}", status.rows);
            println!("files ingested: {}", status.files);
            println!("last ingested:  {}", last);
        },
        Command::ExtractLoad { endpoint, limit } => {
            let (summary, report) = pipeline.extract_load(&endpoint, limit).await?;
            info!(endpoint = %endpoint, saved = summary.saved, "Extract finished");
            log_report(&report);
        },
    }

    Ok(())
}

fn log_report(report: &LoadReport) {
    info!(
        table = %report.table,
        mode = %report.mode,
        files_loaded = report.files_loaded,
        files_skipped = report.files_skipped,
        records_loaded = report.records_loaded,
        duration_ms = report.duration.as_millis() as u64,
        "Load finished"
    );
}
