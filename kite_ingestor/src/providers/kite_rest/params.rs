use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::request_params::HistoricalQuery;

/// Parameters for `POST /orders/{variety}`.
///
/// Values are passed through to Kite unchanged; see the Kite order docs for
/// the accepted `transaction_type`, `product` and `order_type` values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderParams {
    /// `regular`, `amo`, `co`, `iceberg` or `auction`. Goes in the URL path.
    #[serde(skip_serializing)]
    pub variety: String,
    pub exchange: String,
    pub tradingsymbol: String,
    pub transaction_type: String,
    pub quantity: u32,
    pub product: String,
    pub order_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default = "default_validity")]
    pub validity: String,
    #[serde(default)]
    pub disclosed_quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squareoff: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stoploss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailing_stoploss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

fn default_validity() -> String {
    "DAY".to_string()
}

/// Parameters for `PUT /orders/{variety}/{order_id}`. Unset fields are left unchanged.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModifyOrderParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclosed_quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_price: Option<f64>,
}

/// `sha256(api_key + request_token + api_secret)`, hex encoded.
pub fn session_checksum(api_key: &str, request_token: &str, api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hasher.update(request_token.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Repeated `i=` pairs used by the quote endpoints.
pub fn quote_query(keys: &[String]) -> Vec<(&'static str, String)> {
    keys.iter().map(|key| ("i", key.clone())).collect()
}

/// Query string for `GET /instruments/historical/{token}/{interval}`.
pub fn historical_query(query: &HistoricalQuery) -> Vec<(&'static str, String)> {
    vec![
        ("from", query.from_param()),
        ("to", query.to_param()),
        ("continuous", flag(query.continuous)),
        ("oi", flag(query.oi)),
    ]
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}
