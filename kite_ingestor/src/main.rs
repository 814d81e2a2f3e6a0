use std::process::ExitCode;

use clap::Parser;
use kite_ingestor::{
    cli::commands::{execute, Cli},
    models::envelope::Envelope,
    providers::kite_rest::KiteRestClient,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let envelope = match KiteRestClient::from_env() {
        Ok(client) => Envelope::from(execute(&client, cli.command).await),
        Err(err) => Envelope::failure(err),
    };

    // Stdout carries only the envelope so callers can pipe it.
    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("failed to encode result: {err}");
            return ExitCode::FAILURE;
        }
    }

    if envelope.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
