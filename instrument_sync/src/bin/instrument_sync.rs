use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use instrument_sync::{
    catalog::{CatalogCache, snapshot::load_or_fetch},
    classify::{classify, write_partition},
    config::{PipelineConfig, load_config},
    history::{HistoryWindow, export, fetch_history, load_instruments},
    pipeline::run_and_record,
    stats::analyze,
};
use kite_ingestor::{
    io::sink::read_bar_table,
    models::envelope::Envelope,
    providers::kite_rest::{ClientOptions, KiteCredentials, KiteRestClient},
};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Instrument universe sync for Kite Connect")]
struct Cli {
    /// Pipeline settings (TOML). Defaults apply when omitted.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Load the catalog snapshot, downloading it if the file is missing
    Snapshot,
    /// Split the catalog into index and tradable files
    Classify,
    /// Fetch trailing bars for the tradable file and export them
    History {
        /// Override `max_instruments`
        #[arg(long)]
        max_instruments: Option<usize>,
        /// Override `lookback_days`
        #[arg(long)]
        lookback_days: Option<u32>,
    },
    /// Compute statistics from the exported bar file
    Analyze,
    /// Quote instruments given as trading symbols or numeric tokens
    Quote {
        /// Comma-separated symbols or tokens, e.g. `INFY,TCS,408065`
        #[arg(long, value_delimiter = ',', required = true)]
        instruments: Vec<String>,
    },
    /// Show the catalog row for a trading symbol
    Lookup {
        symbol: String,
    },
    /// Run every stage and save the result artifact
    Run {
        /// Override `max_instruments`
        #[arg(long)]
        max_instruments: Option<usize>,
    },
}

fn build_cache(config: &PipelineConfig) -> Result<CatalogCache<KiteRestClient>> {
    let options = ClientOptions {
        timeout: config.timeout(),
        ..ClientOptions::default()
    };
    let client = KiteRestClient::with_options(KiteCredentials::from_env()?, options)
        .context("failed to create Kite client")?;
    Ok(CatalogCache::new(Arc::new(client), config.exchange.clone()))
}

async fn dispatch(cmd: Cmd, mut config: PipelineConfig) -> Result<Value> {
    let payload = match cmd {
        Cmd::Snapshot => {
            let cache = build_cache(&config)?;
            let (catalog, origin) = load_or_fetch(&cache, &config.snapshot_path).await?;
            json!({
                "exchange": catalog.exchange(),
                "count": catalog.len(),
                "origin": origin,
                "path": config.snapshot_path,
            })
        }
        Cmd::Classify => {
            let cache = build_cache(&config)?;
            let (catalog, _) = load_or_fetch(&cache, &config.snapshot_path).await?;
            let partition = classify(catalog.instruments());
            let report = write_partition(&partition, &config.indices_path, &config.tradable_path)?;
            json!({ "partition": report })
        }
        Cmd::History {
            max_instruments,
            lookback_days,
        } => {
            if let Some(days) = lookback_days {
                config.lookback_days = days;
            }
            let cap = max_instruments.or(config.max_instruments);
            let cache = build_cache(&config)?;
            let instruments = load_instruments(&config.tradable_path)?;
            let window = HistoryWindow::trailing_from_today(config.lookback_days, config.interval);
            let report = fetch_history(cache.provider().as_ref(), &instruments, window, cap).await;
            let exported_rows = export(&report.series, &config.bars_path).await?;
            json!({ "fetch_result": report, "exported_rows": exported_rows })
        }
        Cmd::Analyze => {
            let series = read_bar_table(&config.bars_path, config.interval)?;
            serde_json::to_value(analyze(&series)?)?
        }
        Cmd::Quote { instruments } => {
            let cache = build_cache(&config)?;
            serde_json::to_value(cache.quote_by_symbol(&instruments).await?)?
        }
        Cmd::Lookup { symbol } => {
            let cache = build_cache(&config)?;
            let details = cache
                .instrument_details(&symbol)
                .await?
                .with_context(|| format!("symbol {symbol} not found on {}", config.exchange))?;
            serde_json::to_value(details)?
        }
        Cmd::Run { max_instruments } => {
            if max_instruments.is_some() {
                config.max_instruments = max_instruments;
            }
            let cache = build_cache(&config)?;
            let envelope = run_and_record(&cache, &config).await;
            return Ok(serde_json::to_value(envelope)?);
        }
    };
    Ok(serde_json::to_value(Envelope::success(payload))?)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => dispatch(cli.cmd, config).await,
        Err(err) => Err(err),
    };
    let output = result.unwrap_or_else(|err| {
        serde_json::to_value(Envelope::<Value>::failure(format!("{err:#}")))
            .unwrap_or_else(|_| json!({ "success": false }))
    });

    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("failed to encode result: {err}");
            return ExitCode::FAILURE;
        }
    }

    if output["success"].as_bool().unwrap_or(false) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
