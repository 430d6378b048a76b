//! Macdrix: a MACD crossover trading engine for USDT perpetual futures.
//!
//! Market data flows from the exchange through an indicator feed into a
//! signal gate that opens, confirms, and reverses one position per symbol.
//! The orchestrator in [`engine`] ties the pieces together and exposes the
//! run lifecycle over the HTTP surface in [`core`].

pub mod config;
pub mod core;
pub mod db;
pub mod engine;
pub mod feed;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
