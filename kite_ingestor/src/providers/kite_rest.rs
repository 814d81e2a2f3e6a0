//! REST client for the Zerodha Kite Connect v3 API.

pub mod params;
pub mod provider;
pub mod response;

pub use provider::{ClientOptions, KiteCredentials, KiteRestClient};
