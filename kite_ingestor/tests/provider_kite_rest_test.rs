#![cfg(test)]
use std::time::Duration;

use chrono::{Duration as Days, Local};
use kite_ingestor::{
    models::{interval::Interval, request_params::HistoricalRequest},
    providers::{
        kite_rest::{ClientOptions, KiteCredentials, KiteRestClient},
        InstrumentProvider, ProviderError,
    },
};
use serial_test::serial;

fn offline_client() -> KiteRestClient {
    let credentials = KiteCredentials::new("kitefront", "secret").with_access_token("token");
    let options = ClientOptions {
        // Nothing listens on the discard port; connections are refused immediately.
        base_url: "http://127.0.0.1:9".into(),
        timeout: Some(Duration::from_secs(2)),
    };
    KiteRestClient::with_options(credentials, options).unwrap()
}

#[tokio::test]
async fn transport_failure_becomes_provider_error() {
    let client = offline_client();
    let err = client.profile().await.unwrap_err();
    assert!(matches!(err, ProviderError::Reqwest { .. }), "got {err:?}");
    assert!(err.to_string().starts_with("API request failed"));
}

#[tokio::test]
async fn validation_failure_skips_transport() {
    let client = offline_client();
    let request = HistoricalRequest {
        interval: None,
        ..HistoricalRequest::new(408065, "2024-01-01", "2024-01-09", "day")
    };
    let err = client.historical_data(&request).await.unwrap_err();
    assert_eq!(err.to_string(), "interval is required");
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_kite_live_instruments_and_history() {
    // Requires KITE_API_KEY, KITE_API_SECRET and a valid KITE_ACCESS_TOKEN.
    if std::env::var("KITE_ACCESS_TOKEN").is_err() {
        println!("Skipping test_kite_live_instruments_and_history: access token not set.");
        return;
    }

    let client = KiteRestClient::from_env().expect("Failed to create KiteRestClient");

    let instruments = client.instruments("NSE").await.expect("instrument dump");
    let infy = instruments
        .iter()
        .find(|i| i.tradingsymbol == "INFY")
        .expect("INFY listed on NSE");

    let today = Local::now().date_naive();
    let request = HistoricalRequest::for_window(
        infy.instrument_token,
        today - Days::days(10),
        today,
        Interval::Day,
    );
    let data = client.historical_data(&request).await.expect("historical data");

    assert_eq!(data.count, data.data.len());
    assert!(data.data.windows(2).all(|w| w[0].date <= w[1].date));
}
