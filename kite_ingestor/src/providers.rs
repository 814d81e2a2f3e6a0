//! Provider abstraction for the broker API.
//!
//! The pipeline only needs three capabilities from the broker: the instrument
//! list of an exchange, historical candles for one instrument, and quotes for
//! a set of instrument keys. Each is a small async trait so that callers can
//! be driven by [`KiteRestClient`](kite_rest::KiteRestClient) in production and
//! by an in-memory mock in tests.
//!
//! Every method returns `Result<_, ProviderError>`. A vendor fault never
//! escapes as a panic; its message becomes the `error` of the
//! [`Envelope`](crate::models::envelope::Envelope) shown to the user.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use kite_ingestor::models::{bar::Bar, request_params::HistoricalQuery};
//! use kite_ingestor::providers::{HistoricalProvider, ProviderError};
//!
//! struct NoBars;
//!
//! #[async_trait]
//! impl HistoricalProvider for NoBars {
//!     async fn historical_bars(&self, _query: &HistoricalQuery) -> Result<Vec<Bar>, ProviderError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod kite_rest;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, ResultExt, Snafu};

use crate::models::{
    bar::Bar,
    instrument::Instrument,
    request_params::{HistoricalData, HistoricalQuery, HistoricalRequest, ValidationError},
};

/// Fetches the full tradable-instrument list of an exchange.
#[async_trait]
pub trait InstrumentProvider: Send + Sync {
    async fn instruments(&self, exchange: &str) -> Result<Vec<Instrument>, ProviderError>;
}

/// Fetches historical candles for one instrument.
#[async_trait]
pub trait HistoricalProvider: Send + Sync {
    /// Fetches bars for a query that already passed validation.
    ///
    /// Callers go through [`historical_data`], which validates the raw
    /// request first so that malformed input never reaches the network.
    async fn historical_bars(&self, query: &HistoricalQuery) -> Result<Vec<Bar>, ProviderError>;
}

/// Fetches full market quotes keyed by instrument key (`NSE:INFY` or a token).
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn quote(&self, keys: &[String]) -> Result<IndexMap<String, Value>, ProviderError>;
}

/// Validates `request`, then fetches its bars through `provider`.
pub async fn historical_data<P>(
    provider: &P,
    request: &HistoricalRequest,
) -> Result<HistoricalData, ProviderError>
where
    P: HistoricalProvider + ?Sized,
{
    let query = request.validate().context(ValidationSnafu)?;
    let bars = provider.historical_bars(&query).await?;
    Ok(HistoricalData::new(query, bars))
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("{source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a provider implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The vendor answered with an error body (e.g., expired access token).
    #[snafu(display("{message}"))]
    Api {
        message: String,
        error_type: Option<String>,
        status: u16,
        backtrace: Backtrace,
    },

    /// The request parameters were rejected before any network call.
    #[snafu(display("{source}"))]
    Validation {
        source: ValidationError,
        backtrace: Backtrace,
    },

    /// None of the requested instruments could be resolved.
    #[snafu(display("No valid instruments found"))]
    NoInstruments { backtrace: Backtrace },

    /// An authenticated call was made before an access token was set.
    #[snafu(display("Access token is not set; generate a session first"))]
    NotAuthenticated { backtrace: Backtrace },

    /// The vendor response could not be decoded.
    #[snafu(display("Internal provider error: {message}"))]
    Internal {
        message: String,
        backtrace: Backtrace,
    },

    /// An error during provider configuration or initialization.
    #[snafu(display("Provider initialization error: {source}"))]
    Init {
        #[snafu(backtrace)]
        source: ProviderInitError,
    },
}

impl ProviderError {
    /// Whether the error was raised by local validation rather than upstream.
    pub fn is_validation(&self) -> bool {
        matches!(self, ProviderError::Validation { .. })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{DateTime, FixedOffset};

    use super::*;
    use crate::models::interval::Interval;

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HistoricalProvider for CountingProvider {
        async fn historical_bars(&self, query: &HistoricalQuery) -> Result<Vec<Bar>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let date: DateTime<FixedOffset> =
                DateTime::parse_from_rfc3339("2024-01-01T00:00:00+05:30").unwrap();
            Ok(vec![Bar {
                date,
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: query.instrument_token as f64,
                volume: 10,
                oi: None,
            }])
        }
    }

    #[tokio::test]
    async fn valid_request_reaches_provider() {
        let provider = CountingProvider::default();
        let request = HistoricalRequest::new(42, "2024-01-01", "2024-01-09", "day");

        let data = historical_data(&provider, &request).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(data.count, 1);
        assert_eq!(data.interval, Interval::Day);
        assert_eq!(data.data[0].close, 42.0);
    }

    #[tokio::test]
    async fn invalid_requests_never_reach_provider() {
        let provider = CountingProvider::default();
        let valid = HistoricalRequest::new(42, "2024-01-01", "2024-01-09", "day");
        let broken = [
            HistoricalRequest { instrument_token: None, ..valid.clone() },
            HistoricalRequest { from_date: None, ..valid.clone() },
            HistoricalRequest { to_date: None, ..valid.clone() },
            HistoricalRequest { interval: None, ..valid.clone() },
            HistoricalRequest { interval: Some(String::new()), ..valid.clone() },
            HistoricalRequest { interval: Some("weekly".into()), ..valid.clone() },
        ];

        for request in &broken {
            let err = historical_data(&provider, request).await.unwrap_err();
            assert!(err.is_validation(), "expected validation error, got {err}");
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn validation_message_is_surfaced_verbatim() {
        let provider = CountingProvider::default();
        let request = HistoricalRequest {
            instrument_token: None,
            ..Default::default()
        };
        let err = historical_data(&provider, &request).await.unwrap_err();
        assert_eq!(err.to_string(), "instrument_token is required");
    }
}
