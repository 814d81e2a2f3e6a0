//! Catalog subsystem.
//!
//! An [`InstrumentCatalog`] is one immutable snapshot of an exchange's
//! instrument list with symbol and token lookups. [`CatalogCache`] memoizes
//! that snapshot for the life of the process; [`snapshot`] persists it as a
//! CSV file so repeated runs can skip the download.

mod cache;
pub mod snapshot;

pub use cache::{CatalogCache, InstrumentCatalog, SymbolQuotes};
