use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::{
    models::{bar::Bar, instrument::Instrument},
    providers::{ApiSnafu, InternalSnafu, ProviderError},
};

/// Kite wraps every JSON payload as `{status, data}` or `{status, message, error_type}`.
#[derive(Deserialize, Debug)]
pub struct KiteEnvelope<T> {
    pub status: String,
    pub data: Option<T>,
    pub message: Option<String>,
    pub error_type: Option<String>,
}

impl<T> KiteEnvelope<T> {
    pub fn into_data(self, status: u16) -> Result<T, ProviderError> {
        if self.status != "success" {
            return ApiSnafu {
                message: self.message.unwrap_or_else(|| format!("status '{}'", self.status)),
                error_type: self.error_type,
                status,
            }
            .fail();
        }
        match self.data {
            Some(data) => Ok(data),
            None => InternalSnafu {
                message: "success response without data",
            }
            .fail(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct CandlesPayload {
    pub candles: Vec<Vec<Value>>,
}

#[derive(Deserialize, Debug)]
pub struct OrderIdPayload {
    pub order_id: String,
}

/// Decodes a JSON success body into its `data` payload.
pub fn decode_body<T: for<'de> Deserialize<'de>>(status: u16, body: &str) -> Result<T, ProviderError> {
    let envelope: KiteEnvelope<T> = serde_json::from_str(body).map_err(|e| {
        InternalSnafu {
            message: format!("unexpected response body: {e}"),
        }
        .build()
    })?;
    envelope.into_data(status)
}

/// Builds the error for a non-2xx response, preferring the vendor's message.
pub fn api_error(status: u16, body: &str) -> ProviderError {
    let (message, error_type) = match serde_json::from_str::<KiteEnvelope<Value>>(body) {
        Ok(KiteEnvelope {
            message: Some(message),
            error_type,
            ..
        }) => (message, error_type),
        _ if !body.trim().is_empty() => (body.trim().to_string(), None),
        _ => (format!("HTTP {status}"), None),
    };
    ApiSnafu {
        message,
        error_type,
        status,
    }
    .build()
}

/// Converts one positional candle `[date, open, high, low, close, volume(, oi)]`.
pub fn candle_to_bar(row: &[Value]) -> Result<Bar, ProviderError> {
    if row.len() < 6 {
        return InternalSnafu {
            message: format!("candle has {} fields, expected at least 6", row.len()),
        }
        .fail();
    }

    let date = row[0]
        .as_str()
        .and_then(parse_candle_time)
        .ok_or_else(|| {
            InternalSnafu {
                message: format!("invalid candle timestamp {}", row[0]),
            }
            .build()
        })?;

    Ok(Bar {
        date,
        open: number(&row[1], "open")?,
        high: number(&row[2], "high")?,
        low: number(&row[3], "low")?,
        close: number(&row[4], "close")?,
        volume: count(&row[5], "volume")?.unwrap_or_default(),
        oi: match row.get(6) {
            Some(value) => count(value, "oi")?,
            None => None,
        },
    })
}

pub fn candles_to_bars(payload: CandlesPayload) -> Result<Vec<Bar>, ProviderError> {
    payload.candles.iter().map(|row| candle_to_bar(row)).collect()
}

/// Kite sends `2024-01-05T00:00:00+0530`; RFC 3339 offsets are accepted too.
fn parse_candle_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
}

/// A null price decodes as NaN so the bar stays in its series.
fn number(value: &Value, field: &str) -> Result<f64, ProviderError> {
    if value.is_null() {
        return Ok(f64::NAN);
    }
    value.as_f64().ok_or_else(|| {
        InternalSnafu {
            message: format!("candle {field} is not a number: {value}"),
        }
        .build()
    })
}

fn count(value: &Value, field: &str) -> Result<Option<u64>, ProviderError> {
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
        .map(Some)
        .ok_or_else(|| {
            InternalSnafu {
                message: format!("candle {field} is not a non-negative number: {value}"),
            }
            .build()
        })
}

/// Parses the CSV instrument dump. Rows that fail to decode are logged and skipped.
pub fn parse_instruments_csv(body: &str) -> Result<Vec<Instrument>, ProviderError> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let mut instruments = Vec::new();
    let mut skipped = 0usize;

    for (line, row) in reader.deserialize::<Instrument>().enumerate() {
        match row {
            Ok(instrument) => instruments.push(instrument),
            Err(err) if err.is_io_error() => {
                return InternalSnafu {
                    message: format!("reading instrument dump: {err}"),
                }
                .fail();
            }
            Err(err) => {
                skipped += 1;
                warn!(line = line + 2, error = %err, "skipping malformed instrument row");
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, kept = instruments.len(), "instrument dump contained malformed rows");
    }
    Ok(instruments)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_candles_with_and_without_oi() {
        let payload: CandlesPayload = serde_json::from_value(json!({
            "candles": [
                ["2024-01-05T00:00:00+0530", 1704.5, 1705, 1699.25, 1702.8, 2499],
                ["2024-01-08T00:00:00+0530", 1702.8, 1710.0, 1700.0, 1708.15, 3120, 13667775]
            ]
        }))
        .unwrap();

        let bars = candles_to_bars(payload).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].high, 1705.0);
        assert_eq!(bars[0].volume, 2499);
        assert_eq!(bars[0].oi, None);
        assert_eq!(bars[1].oi, Some(13667775));
        assert_eq!(bars[0].date.offset().local_minus_utc(), 19800);
    }

    #[test]
    fn null_close_and_volume_keep_the_bar() {
        let payload: CandlesPayload = serde_json::from_value(json!({
            "candles": [
                ["2024-01-05T00:00:00+0530", 100.0, 101.0, 99.0, 100.5, 1000],
                ["2024-01-08T00:00:00+0530", 100.5, 102.0, 100.0, null, null, null]
            ]
        }))
        .unwrap();

        let bars = candles_to_bars(payload).unwrap();
        assert_eq!(bars.len(), 2);
        assert!(bars[1].close.is_nan());
        assert_eq!(bars[1].volume, 0);
        assert_eq!(bars[1].oi, None);
        assert_eq!(bars[1].high, 102.0);
    }

    #[test]
    fn non_numeric_price_is_still_an_error() {
        let row = [
            json!("2024-01-05T00:00:00+0530"),
            json!(1.0),
            json!(1.0),
            json!(1.0),
            json!("n/a"),
            json!(1),
        ];
        assert!(candle_to_bar(&row).unwrap_err().to_string().contains("close"));
    }

    #[test]
    fn short_candle_is_an_error() {
        let err = candle_to_bar(&[json!("2024-01-05T00:00:00+0530"), json!(1.0)]).unwrap_err();
        assert!(err.to_string().contains("expected at least 6"));
    }

    #[test]
    fn error_body_message_is_surfaced() {
        let body = r#"{"status":"error","message":"Incorrect `api_key` or `access_token`.","error_type":"TokenException"}"#;
        match api_error(403, body) {
            ProviderError::Api {
                message,
                error_type,
                status,
                ..
            } => {
                assert_eq!(message, "Incorrect `api_key` or `access_token`.");
                assert_eq!(error_type.as_deref(), Some("TokenException"));
                assert_eq!(status, 403);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn non_json_error_body_keeps_text() {
        assert_eq!(api_error(502, "Bad Gateway\n").to_string(), "Bad Gateway");
        assert_eq!(api_error(500, "").to_string(), "HTTP 500");
    }

    #[test]
    fn success_envelope_yields_data() {
        let id: OrderIdPayload =
            decode_body(200, r#"{"status":"success","data":{"order_id":"151220000000000"}}"#).unwrap();
        assert_eq!(id.order_id, "151220000000000");
    }

    #[test]
    fn error_status_inside_ok_response_is_an_error() {
        let result: Result<Value, _> =
            decode_body(200, r#"{"status":"error","message":"Markets are closed"}"#);
        assert_eq!(result.unwrap_err().to_string(), "Markets are closed");
    }

    #[test]
    fn instrument_dump_skips_bad_rows() {
        let body = "instrument_token,exchange_token,tradingsymbol,name,last_price,expiry,strike,tick_size,lot_size,instrument_type,segment,exchange\n\
                    408065,1594,INFY,INFOSYS,0,,0,0.05,1,EQ,NSE,NSE\n\
                    oops,1,BAD,BAD,0,,0,0.05,1,EQ,NSE,NSE\n\
                    256265,1001,NIFTY 50,NIFTY 50,0,,0,0,0,EQ,INDICES,NSE\n";
        let instruments = parse_instruments_csv(body).unwrap();
        let symbols: Vec<_> = instruments.iter().map(|i| i.tradingsymbol.as_str()).collect();
        assert_eq!(symbols, ["INFY", "NIFTY 50"]);
    }
}
