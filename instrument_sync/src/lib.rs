//! Instrument-universe pipeline on top of the Kite adapter in `kite_ingestor`.
//!
//! The stages run leaf-first: [`catalog`] caches the exchange instrument list
//! (in memory or as a snapshot file), [`classify`] partitions it, [`history`]
//! fetches trailing bars for the tradable partition and [`stats`] summarizes
//! each series. [`pipeline`] chains them for the `instrument-sync` binary.

#![deny(missing_docs)]

pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod history;
pub mod pipeline;
pub mod stats;

pub use error::SyncError;
