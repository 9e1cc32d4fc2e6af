//! CLI binary for brandscout.

use std::path::PathBuf;
use std::sync::Arc;

use brandscout::pipeline::{LogLevel, LogStream};
use brandscout::{DiscoveryReport, DiscoveryService, JsonFileStore, ScoutConfig, save_result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// brandscout: find companies that sell competitor brands.
#[derive(Parser)]
#[command(name = "brandscout", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run discovery for one or more brands.
    Discover {
        /// Competitor brand (repeatable).
        #[arg(short, long = "brand", required = true)]
        brands: Vec<String>,

        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Persist results to this JSON store.
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Print the report as JSON instead of text.
        #[arg(long)]
        json: bool,

        /// Also show debug-level run events.
        #[arg(short, long)]
        verbose: bool,
    },

    /// Write the default configuration file.
    InitConfig {
        /// Destination (defaults to the user config directory).
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the report.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("brandscout=info,scout_search=warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Discover {
            brands,
            config,
            store,
            json,
            verbose,
        } => run_discover(brands, config, store, json, verbose).await,
        Command::InitConfig { path } => init_config(path),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ScoutConfig> {
    let config = match path {
        Some(path) => ScoutConfig::from_file(&path)?,
        None => {
            let default_path = ScoutConfig::default_config_path();
            if default_path.exists() {
                ScoutConfig::from_file(&default_path)?
            } else {
                ScoutConfig::default()
            }
        }
    };
    Ok(config.with_env_overrides())
}

async fn run_discover(
    brands: Vec<String>,
    config: Option<PathBuf>,
    store: Option<PathBuf>,
    json: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let service = Arc::new(DiscoveryService::new(config)?);
    let handle = service.run_discovery(&brands).await?;
    let run_id = handle.run_id;
    info!(%run_id, brands = ?handle.brands, "discovery started");

    let printer = tokio::spawn(print_log(service.subscribe_log(run_id).await?, verbose));

    let cancel_service = service.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, cancelling run...");
            if let Err(e) = cancel_service.cancel(run_id).await {
                eprintln!("cancel failed: {e}");
            }
        }
    });

    let result = service.wait(run_id).await?;
    let _ = printer.await;

    let save = match store {
        Some(path) => {
            let store = JsonFileStore::open(&path)?;
            let stats = save_result(&store, &result);
            info!(path = %path.display(), "results saved");
            Some(stats)
        }
        None => None,
    };

    let report = DiscoveryReport::new(&result, save);
    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

async fn print_log(mut events: LogStream, verbose: bool) {
    while let Some(event) = events.next().await {
        if event.level == LogLevel::Debug && !verbose {
            continue;
        }
        let strategy = event
            .strategy
            .as_deref()
            .map(|s| format!(" [{s}]"))
            .unwrap_or_default();
        eprintln!(
            "{} {:?}{strategy} {}",
            event.at.format("%H:%M:%S"),
            event.kind,
            event.message
        );
    }
}

fn init_config(path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(ScoutConfig::default_config_path);
    ScoutConfig::default().save_to_file(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
