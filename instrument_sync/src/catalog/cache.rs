//! Read-mostly cache for the exchange instrument catalog.
//!
//! Readers call [`CatalogCache::get_instruments`], which loads an
//! `Arc<InstrumentCatalog>` snapshot with one atomic load once the cache is
//! warm. The first caller populates it from the provider; population is
//! serialized by an async mutex with a re-check, so concurrent first calls
//! produce exactly one upstream fetch.
//!
//! Implementation notes:
//! - Uses `arc-swap` for atomic pointer swaps and cheap reads (no RwLock).
//! - There is no freshness check. A snapshot lives until [`CatalogCache::invalidate`]
//!   or [`CatalogCache::refresh`] replaces it.
//! - A failed fetch stores nothing, so the next call retries.

use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwapOption;
use indexmap::IndexMap;
use kite_ingestor::{
    models::instrument::Instrument,
    providers::{InstrumentProvider, NoInstrumentsSnafu, ProviderError, QuoteProvider},
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One exchange's instrument list plus symbol and token lookups.
///
/// Built in one step from the list, so the lookups always agree with it.
/// When two rows share a symbol or a token the later row wins.
#[derive(Debug, Clone)]
pub struct InstrumentCatalog {
    exchange: String,
    instruments: Vec<Instrument>,
    by_symbol: HashMap<String, usize>,
    by_token: HashMap<u64, usize>,
    overwritten: usize,
}

impl InstrumentCatalog {
    /// Indexes `instruments` for `exchange`.
    pub fn new(exchange: impl Into<String>, instruments: Vec<Instrument>) -> Self {
        let exchange = exchange.into();
        let mut by_symbol = HashMap::with_capacity(instruments.len());
        let mut by_token = HashMap::with_capacity(instruments.len());
        let mut overwritten = 0;

        for (index, instrument) in instruments.iter().enumerate() {
            if by_symbol.insert(instrument.tradingsymbol.clone(), index).is_some() {
                overwritten += 1;
            }
            if by_token.insert(instrument.instrument_token, index).is_some() {
                overwritten += 1;
            }
        }

        if overwritten > 0 {
            warn!(%exchange, overwritten, "duplicate instrument keys, keeping the last row for each");
        }

        Self {
            exchange,
            instruments,
            by_symbol,
            by_token,
            overwritten,
        }
    }

    /// Exchange code the list belongs to.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// All rows in vendor order, duplicates included.
    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Whether the exchange listed nothing.
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Looks up an instrument by trading symbol (exact match).
    pub fn by_symbol(&self, symbol: &str) -> Option<&Instrument> {
        self.by_symbol.get(symbol).map(|&i| &self.instruments[i])
    }

    /// Looks up an instrument by token.
    pub fn by_token(&self, token: u64) -> Option<&Instrument> {
        self.by_token.get(&token).map(|&i| &self.instruments[i])
    }

    /// Number of symbol or token keys replaced by a later row.
    pub fn overwritten_keys(&self) -> usize {
        self.overwritten
    }
}

/// Quotes re-keyed by the caller's symbols.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolQuotes {
    /// Quote payloads keyed by the symbol the caller asked for, or by the
    /// token when the caller passed a token.
    pub quotes: IndexMap<String, Value>,
    /// Tokens actually sent upstream, in request order.
    pub instrument_tokens: Vec<String>,
    /// Token to symbol, for every symbol that was resolved.
    pub symbol_mapping: IndexMap<String, String>,
}

/// Process-lifetime memo of one exchange's [`InstrumentCatalog`].
pub struct CatalogCache<P: ?Sized> {
    provider: Arc<P>,
    exchange: String,
    current: ArcSwapOption<InstrumentCatalog>,
    populate: Mutex<()>,
}

impl<P> CatalogCache<P>
where
    P: InstrumentProvider + ?Sized,
{
    /// Creates an empty cache. Nothing is fetched until the first lookup.
    pub fn new(provider: Arc<P>, exchange: impl Into<String>) -> Self {
        Self {
            provider,
            exchange: exchange.into(),
            current: ArcSwapOption::empty(),
            populate: Mutex::new(()),
        }
    }

    /// Provider used to populate the cache.
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Exchange this cache serves.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Current snapshot without fetching.
    pub fn cached(&self) -> Option<Arc<InstrumentCatalog>> {
        self.current.load_full()
    }

    /// Returns the cached catalog, fetching it on first use.
    ///
    /// A fetch error is returned unchanged and leaves the cache empty.
    pub async fn get_instruments(&self) -> Result<Arc<InstrumentCatalog>, ProviderError> {
        if let Some(catalog) = self.current.load_full() {
            return Ok(catalog);
        }

        let _guard = self.populate.lock().await;
        // Another caller may have filled it while we waited.
        if let Some(catalog) = self.current.load_full() {
            return Ok(catalog);
        }
        self.fetch_and_store().await
    }

    /// Drops the snapshot; the next lookup fetches again.
    pub fn invalidate(&self) {
        self.current.store(None);
        debug!(exchange = %self.exchange, "instrument catalog invalidated");
    }

    /// Fetches a new snapshot and swaps it in. On failure the old one stays.
    pub async fn refresh(&self) -> Result<Arc<InstrumentCatalog>, ProviderError> {
        let _guard = self.populate.lock().await;
        self.fetch_and_store().await
    }

    /// Token for a trading symbol, populating the cache if needed.
    pub async fn instrument_token(&self, symbol: &str) -> Result<Option<u64>, ProviderError> {
        Ok(self
            .instrument_details(symbol)
            .await?
            .map(|instrument| instrument.instrument_token))
    }

    /// Full row for a trading symbol, populating the cache if needed.
    pub async fn instrument_details(&self, symbol: &str) -> Result<Option<Instrument>, ProviderError> {
        let catalog = self.get_instruments().await?;
        let found = catalog.by_symbol(symbol).cloned();
        if found.is_none() {
            debug!(exchange = %self.exchange, symbol, "symbol not in instrument catalog");
        }
        Ok(found)
    }

    async fn fetch_and_store(&self) -> Result<Arc<InstrumentCatalog>, ProviderError> {
        info!(exchange = %self.exchange, "fetching instrument catalog");
        let instruments = self.provider.instruments(&self.exchange).await?;
        let catalog = Arc::new(InstrumentCatalog::new(self.exchange.clone(), instruments));
        self.current.store(Some(Arc::clone(&catalog)));
        info!(exchange = %self.exchange, count = catalog.len(), "instrument catalog cached");
        Ok(catalog)
    }
}

impl<P> CatalogCache<P>
where
    P: InstrumentProvider + QuoteProvider + ?Sized,
{
    /// Quotes for a mix of numeric tokens and trading symbols.
    ///
    /// Symbols are resolved through the catalog; ones that do not resolve are
    /// logged and skipped. Fails with `No valid instruments found` when nothing
    /// is left to ask for.
    pub async fn quote_by_symbol(&self, instruments: &[String]) -> Result<SymbolQuotes, ProviderError> {
        let mut tokens = Vec::with_capacity(instruments.len());
        let mut symbol_mapping = IndexMap::new();

        for key in instruments.iter().map(|k| k.trim()).filter(|k| !k.is_empty()) {
            if key.bytes().all(|b| b.is_ascii_digit()) {
                tokens.push(key.to_string());
                continue;
            }
            match self.instrument_token(key).await? {
                Some(token) => {
                    tokens.push(token.to_string());
                    symbol_mapping.insert(token.to_string(), key.to_string());
                }
                None => warn!(symbol = key, "could not resolve instrument token"),
            }
        }

        if tokens.is_empty() {
            return NoInstrumentsSnafu.fail();
        }

        let raw = self.provider.quote(&tokens).await?;
        let quotes = raw
            .into_iter()
            .map(|(token, quote)| {
                let key = symbol_mapping.get(&token).cloned().unwrap_or(token);
                (key, quote)
            })
            .collect();

        Ok(SymbolQuotes {
            quotes,
            instrument_tokens: tokens,
            symbol_mapping,
        })
    }
}
