use std::{sync::Arc, time::Duration};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::{header, Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared_utils::env::{get_env_var, get_optional_env_var};
use snafu::{OptionExt, ResultExt};
use tracing::{debug, info, instrument};

use crate::{
    models::{
        bar::Bar,
        instrument::Instrument,
        request_params::{HistoricalData, HistoricalQuery, HistoricalRequest},
        session::UserSession,
    },
    providers::{
        historical_data,
        kite_rest::{
            params::{historical_query, quote_query, session_checksum, ModifyOrderParams, OrderParams},
            response::{api_error, candles_to_bars, decode_body, parse_instruments_csv, CandlesPayload, OrderIdPayload},
        },
        ClientBuildSnafu, HistoricalProvider, InstrumentProvider, MissingEnvVarSnafu, NoInstrumentsSnafu,
        NotAuthenticatedSnafu, ProviderError, ProviderInitError, QuoteProvider, ReqwestSnafu,
    },
};

pub const API_BASE_URL: &str = "https://api.kite.trade";
pub const LOGIN_BASE_URL: &str = "https://kite.zerodha.com/connect/login";
const KITE_VERSION: &str = "3";

/// App credentials issued by the Kite developer console.
#[derive(Debug)]
pub struct KiteCredentials {
    pub api_key: String,
    pub api_secret: SecretString,
    pub access_token: Option<SecretString>,
    /// Informational only; Kite redirects to the URL registered with the app.
    pub redirect_url: Option<String>,
}

impl KiteCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: secret(api_secret.into()),
            access_token: None,
            redirect_url: None,
        }
    }

    /// Reads `KITE_API_KEY` and `KITE_API_SECRET`, plus the optional
    /// `KITE_ACCESS_TOKEN` and `KITE_REDIRECT_URL`.
    pub fn from_env() -> Result<Self, ProviderInitError> {
        let api_key = get_env_var("KITE_API_KEY").context(MissingEnvVarSnafu)?;
        let api_secret = get_env_var("KITE_API_SECRET").context(MissingEnvVarSnafu)?;

        let mut credentials = Self::new(api_key, api_secret);
        credentials.access_token =
            get_optional_env_var("KITE_ACCESS_TOKEN").map(secret);
        credentials.redirect_url = get_optional_env_var("KITE_REDIRECT_URL");
        Ok(credentials)
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(secret(token.into()));
        self
    }
}

fn secret(value: String) -> SecretString {
    SecretString::new(value.into_boxed_str())
}

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: API_BASE_URL.to_string(),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Thin authenticated wrapper around the Kite REST endpoints.
///
/// The access token lives behind an [`ArcSwapOption`] so a session obtained
/// at runtime is visible to every clone of the surrounding `Arc` without a lock.
pub struct KiteRestClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: SecretString,
    access_token: ArcSwapOption<SecretString>,
    redirect_url: Option<String>,
}

impl KiteRestClient {
    /// Creates a client from the `KITE_*` environment variables.
    pub fn from_env() -> Result<Self, ProviderInitError> {
        Self::new(KiteCredentials::from_env()?)
    }

    pub fn new(credentials: KiteCredentials) -> Result<Self, ProviderInitError> {
        Self::with_options(credentials, ClientOptions::default())
    }

    pub fn with_options(
        credentials: KiteCredentials,
        options: ClientOptions,
    ) -> Result<Self, ProviderInitError> {
        let mut headers = header::HeaderMap::new();
        headers.insert("X-Kite-Version", header::HeaderValue::from_static(KITE_VERSION));

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key,
            api_secret: credentials.api_secret,
            access_token: ArcSwapOption::new(credentials.access_token.map(Arc::new)),
            redirect_url: credentials.redirect_url,
        })
    }

    /// URL the user opens to log in and obtain a request token.
    pub fn login_url(&self) -> String {
        format!("{LOGIN_BASE_URL}?v={KITE_VERSION}&api_key={}", self.api_key)
    }

    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref()
    }

    pub fn set_access_token(&self, token: impl Into<String>) {
        self.access_token.store(Some(Arc::new(secret(token.into()))));
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.load().is_some()
    }

    /// Exchanges a request token for an access token and keeps it for later calls.
    #[instrument(skip_all)]
    pub async fn generate_session(&self, request_token: &str) -> Result<UserSession, ProviderError> {
        let checksum = session_checksum(&self.api_key, request_token, self.api_secret.expose_secret());
        let form = [
            ("api_key", self.api_key.as_str()),
            ("request_token", request_token),
            ("checksum", checksum.as_str()),
        ];

        let session: UserSession = self
            .send_json(self.client.post(self.url("/session/token")).form(&form))
            .await?;
        self.set_access_token(session.access_token.clone());
        info!(user_id = %session.user_id, "kite session established");
        Ok(session)
    }

    pub async fn profile(&self) -> Result<Value, ProviderError> {
        self.get_json("/user/profile").await
    }

    pub async fn margins(&self) -> Result<Value, ProviderError> {
        self.get_json("/user/margins").await
    }

    pub async fn holdings(&self) -> Result<Value, ProviderError> {
        self.get_json("/portfolio/holdings").await
    }

    pub async fn positions(&self) -> Result<Value, ProviderError> {
        self.get_json("/portfolio/positions").await
    }

    pub async fn orders(&self) -> Result<Value, ProviderError> {
        self.get_json("/orders").await
    }

    pub async fn order_history(&self, order_id: &str) -> Result<Value, ProviderError> {
        self.get_json(&format!("/orders/{order_id}")).await
    }

    /// Full quote, keyed exactly as requested.
    pub async fn quote(&self, keys: &[String]) -> Result<IndexMap<String, Value>, ProviderError> {
        self.quote_endpoint("/quote", keys).await
    }

    pub async fn ohlc(&self, keys: &[String]) -> Result<IndexMap<String, Value>, ProviderError> {
        self.quote_endpoint("/quote/ohlc", keys).await
    }

    pub async fn ltp(&self, keys: &[String]) -> Result<IndexMap<String, Value>, ProviderError> {
        self.quote_endpoint("/quote/ltp", keys).await
    }

    /// Validates `request` and fetches its candles.
    pub async fn historical_data(&self, request: &HistoricalRequest) -> Result<HistoricalData, ProviderError> {
        historical_data(self, request).await
    }

    /// Places an order and returns the vendor order id.
    #[instrument(skip(self, params), fields(variety = %params.variety, symbol = %params.tradingsymbol))]
    pub async fn place_order(&self, params: &OrderParams) -> Result<String, ProviderError> {
        let request = self
            .client
            .post(self.url(&format!("/orders/{}", params.variety)))
            .form(params);
        let payload: OrderIdPayload = self.send_json(self.authorize(request)?).await?;
        info!(order_id = %payload.order_id, "order placed");
        Ok(payload.order_id)
    }

    #[instrument(skip(self, params))]
    pub async fn modify_order(
        &self,
        variety: &str,
        order_id: &str,
        params: &ModifyOrderParams,
    ) -> Result<String, ProviderError> {
        let request = self
            .client
            .put(self.url(&format!("/orders/{variety}/{order_id}")))
            .form(params);
        let payload: OrderIdPayload = self.send_json(self.authorize(request)?).await?;
        Ok(payload.order_id)
    }

    #[instrument(skip(self))]
    pub async fn cancel_order(&self, variety: &str, order_id: &str) -> Result<String, ProviderError> {
        let request = self.client.delete(self.url(&format!("/orders/{variety}/{order_id}")));
        let payload: OrderIdPayload = self.send_json(self.authorize(request)?).await?;
        Ok(payload.order_id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, ProviderError> {
        let token = self.access_token.load_full().context(NotAuthenticatedSnafu)?;
        Ok(request.header(
            header::AUTHORIZATION,
            format!("token {}:{}", self.api_key, token.expose_secret()),
        ))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let request = self.authorize(self.client.get(self.url(path)))?;
        self.send_json(request).await
    }

    async fn quote_endpoint(
        &self,
        path: &str,
        keys: &[String],
    ) -> Result<IndexMap<String, Value>, ProviderError> {
        if keys.is_empty() {
            return NoInstrumentsSnafu.fail();
        }
        let request = self.client.get(self.url(path)).query(&quote_query(keys));
        self.send_json(self.authorize(request)?).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ProviderError> {
        let (status, body) = self.execute(request).await?;
        decode_body(status, &body)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<(u16, String), ProviderError> {
        let response = request.send().await.context(ReqwestSnafu)?;
        let status = response.status();
        let body = response.text().await.context(ReqwestSnafu)?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }
        Ok((status.as_u16(), body))
    }
}

#[async_trait]
impl InstrumentProvider for KiteRestClient {
    #[instrument(skip(self))]
    async fn instruments(&self, exchange: &str) -> Result<Vec<Instrument>, ProviderError> {
        let mut request = self.client.get(self.url(&format!("/instruments/{exchange}")));
        if self.has_access_token() {
            request = self.authorize(request)?;
        }
        let (_, body) = self.execute(request).await?;
        let instruments = parse_instruments_csv(&body)?;
        debug!(count = instruments.len(), "instrument dump downloaded");
        Ok(instruments)
    }
}

#[async_trait]
impl HistoricalProvider for KiteRestClient {
    #[instrument(skip(self, query), fields(token = query.instrument_token, interval = %query.interval))]
    async fn historical_bars(&self, query: &HistoricalQuery) -> Result<Vec<Bar>, ProviderError> {
        let path = format!(
            "/instruments/historical/{}/{}",
            query.instrument_token, query.interval
        );
        let request = self
            .client
            .get(self.url(&path))
            .query(&historical_query(query));
        let payload: CandlesPayload = self.send_json(self.authorize(request)?).await?;
        candles_to_bars(payload)
    }
}

#[async_trait]
impl QuoteProvider for KiteRestClient {
    async fn quote(&self, keys: &[String]) -> Result<IndexMap<String, Value>, ProviderError> {
        KiteRestClient::quote(self, keys).await
    }
}
