use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use crate::{
    errors::Error,
    io::table::write_rows,
    models::request_params::HistoricalRequest,
    providers::{
        kite_rest::{
            params::{ModifyOrderParams, OrderParams},
            KiteRestClient,
        },
        InstrumentProvider,
    },
};

use super::params::{read_json, split_keys, JsonSource};

/// Kite Connect passthroughs. Every command prints a `{success, ...}` JSON envelope.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the URL to open in a browser to log in
    LoginUrl,

    /// Exchange a request token for an access token
    Session {
        #[arg(long)]
        request_token: String,
    },

    /// User profile
    Profile,

    /// Funds and margins
    Margins,

    /// Long-term holdings
    Holdings,

    /// Day and net positions
    Positions,

    /// Orders placed today
    Orders,

    /// State transitions of one order
    OrderHistory {
        #[arg(long)]
        order_id: String,
    },

    /// Download the instrument list of an exchange
    Instruments {
        #[arg(long, default_value = "NSE")]
        exchange: String,

        /// Write the list to this CSV file instead of printing it
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Full market quote
    Quote {
        /// Comma-separated instrument keys (e.g. "NSE:INFY,408065")
        #[arg(long)]
        instruments: String,
    },

    /// OHLC and last price
    Ohlc {
        #[arg(long)]
        instruments: String,
    },

    /// Last traded price
    Ltp {
        #[arg(long)]
        instruments: String,
    },

    /// Historical candles for one instrument
    Historical {
        #[arg(long)]
        instrument_token: Option<u64>,

        /// Start date, YYYY-MM-DD
        #[arg(long)]
        from_date: Option<String>,

        /// End date, YYYY-MM-DD
        #[arg(long)]
        to_date: Option<String>,

        /// minute, 3minute, 5minute, 10minute, 15minute, 30minute, 60minute or day
        #[arg(long)]
        interval: Option<String>,

        #[arg(long)]
        continuous: bool,

        #[arg(long)]
        oi: bool,
    },

    /// Place an order from a JSON document of order parameters
    PlaceOrder {
        #[arg(long, value_enum, default_value_t)]
        source: JsonSource,

        /// Path to JSON file (when source=file) or inline JSON string (when source=json)
        #[arg(long)]
        input: Option<String>,
    },

    /// Modify an open order
    ModifyOrder {
        #[arg(long, default_value = "regular")]
        variety: String,

        #[arg(long)]
        order_id: String,

        #[arg(long, value_enum, default_value_t)]
        source: JsonSource,

        #[arg(long)]
        input: Option<String>,
    },

    /// Cancel an open order
    CancelOrder {
        #[arg(long, default_value = "regular")]
        variety: String,

        #[arg(long)]
        order_id: String,
    },
}

/// Runs one command and returns the envelope payload.
pub async fn execute(client: &KiteRestClient, command: Commands) -> Result<Value, Error> {
    let payload = match command {
        Commands::LoginUrl => json!({
            "login_url": client.login_url(),
            "redirect_url": client.redirect_url(),
        }),
        Commands::Session { request_token } => {
            let session = client.generate_session(&request_token).await?;
            json!({ "session": session })
        }
        Commands::Profile => json!({ "profile": client.profile().await? }),
        Commands::Margins => json!({ "margins": client.margins().await? }),
        Commands::Holdings => json!({ "holdings": client.holdings().await? }),
        Commands::Positions => json!({ "positions": client.positions().await? }),
        Commands::Orders => json!({ "orders": client.orders().await? }),
        Commands::OrderHistory { order_id } => {
            json!({ "order_history": client.order_history(&order_id).await? })
        }
        Commands::Instruments { exchange, output } => {
            let instruments = client.instruments(&exchange).await?;
            match output {
                Some(path) => {
                    let count = write_rows(&path, &instruments)?;
                    json!({ "exchange": exchange, "count": count, "path": path })
                }
                None => json!({
                    "exchange": exchange,
                    "count": instruments.len(),
                    "instruments": instruments,
                }),
            }
        }
        Commands::Quote { instruments } => {
            json!({ "quotes": client.quote(&split_keys(&instruments)).await? })
        }
        Commands::Ohlc { instruments } => {
            json!({ "ohlc": client.ohlc(&split_keys(&instruments)).await? })
        }
        Commands::Ltp { instruments } => {
            json!({ "ltp": client.ltp(&split_keys(&instruments)).await? })
        }
        Commands::Historical {
            instrument_token,
            from_date,
            to_date,
            interval,
            continuous,
            oi,
        } => {
            let request = HistoricalRequest {
                instrument_token,
                from_date,
                to_date,
                interval,
                continuous,
                oi,
            };
            serde_json::to_value(client.historical_data(&request).await?)?
        }
        Commands::PlaceOrder { source, input } => {
            let params: OrderParams = read_json(source, input.as_deref())?;
            json!({ "order_id": client.place_order(&params).await? })
        }
        Commands::ModifyOrder {
            variety,
            order_id,
            source,
            input,
        } => {
            let params: ModifyOrderParams = read_json(source, input.as_deref())?;
            json!({ "order_id": client.modify_order(&variety, &order_id, &params).await? })
        }
        Commands::CancelOrder { variety, order_id } => {
            json!({ "order_id": client.cancel_order(&variety, &order_id).await? })
        }
    };
    Ok(payload)
}
