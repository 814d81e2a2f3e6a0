//! A tradable security as listed in the Kite instrument dump.

use serde::{Deserialize, Serialize};

use crate::models::lenient;

/// Segment value Kite uses for index instruments (NIFTY 50, NIFTY BANK, ...).
pub const INDICES_SEGMENT: &str = "INDICES";

/// One row of the exchange instrument list.
///
/// Field order matches the column order of `GET /instruments/{exchange}` so a
/// snapshot written from these records has the same layout as the vendor dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// Exchange-assigned numeric identity, unique within an exchange snapshot.
    #[serde(deserialize_with = "lenient::token")]
    pub instrument_token: u64,
    #[serde(default)]
    pub exchange_token: String,
    /// Human-readable symbol, e.g. `INFY` or `NIFTY 50`.
    pub tradingsymbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub last_price: f64,
    #[serde(default)]
    pub expiry: String,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub strike: f64,
    #[serde(default, deserialize_with = "lenient::f64_or_zero")]
    pub tick_size: f64,
    #[serde(default, deserialize_with = "lenient::u32_or_zero")]
    pub lot_size: u32,
    #[serde(default)]
    pub instrument_type: String,
    #[serde(default)]
    pub segment: String,
    #[serde(default)]
    pub exchange: String,
}

impl Instrument {
    pub fn is_index(&self) -> bool {
        self.segment == INDICES_SEGMENT
    }

    /// Key used by the quote endpoints, e.g. `NSE:INFY`.
    pub fn quote_key(&self) -> String {
        format!("{}:{}", self.exchange, self.tradingsymbol)
    }
}
