use thiserror::Error;

use crate::{
    io::sink::StoreError,
    providers::{ProviderError, ProviderInitError},
};

/// The unified error type for the `kite_ingestor` crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An error originating from the broker API (e.g., vendor error, validation).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The client could not be built (missing credentials, TLS setup).
    #[error(transparent)]
    Init(#[from] ProviderInitError),

    /// An error originating from a data store (e.g., CSV write).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An error related to configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A generic I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// JSON encoding of a result envelope failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
