//! Engine error taxonomy.
//!
//! Start-time failures are fatal to the start attempt and typed by the step
//! that failed. Failures during a running strategy abort only the action at
//! hand; the gate logs them and keeps processing events.

use crate::db::StoreError;
use crate::feed::FeedError;
use crate::services::exchange::ExchangeError;
use thiserror::Error;

/// Why an order quantity could not be computed.
#[derive(Debug, Error)]
pub enum SizingError {
    #[error("invalid sizing rule: {0}")]
    InvalidRule(String),
    #[error("price fetch failed: {0}")]
    Price(#[source] ExchangeError),
    #[error("balance fetch failed: {0}")]
    Balance(#[source] ExchangeError),
    #[error("available balance {0} cannot fund a percentage-sized order")]
    NonPositiveBalance(f64),
    #[error("quantity formatting failed: {0}")]
    Quantity(#[source] ExchangeError),
}

/// Why a position action failed. `CloseExhausted` means the retry budget ran
/// out; the position is assumed still open.
#[derive(Debug, Error)]
pub enum PositionError {
    #[error("sizing failed: {0}")]
    Sizing(#[from] SizingError),
    #[error("order placement failed: {0}")]
    Order(#[source] ExchangeError),
    #[error("close failed after {attempts} attempts: {source}")]
    CloseExhausted {
        attempts: u32,
        #[source]
        source: ExchangeError,
    },
}

/// Why a strategy start attempt was rejected.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("configuration invalid: {0}")]
    InvalidConfig(String),
    #[error("strategy is already running")]
    AlreadyActive,
    #[error("an active run is recorded for this account ({0}); stop it first")]
    ActiveRunRecorded(String),
    #[error("exchange connectivity check failed: {0}")]
    Connectivity(#[source] ExchangeError),
    #[error("failed to set leverage: {0}")]
    Leverage(#[source] ExchangeError),
    #[error("dry-run sizing failed: {0}")]
    DryRunSizing(#[source] SizingError),
    #[error("indicator feed failed to start: {0}")]
    Feed(#[source] FeedError),
    #[error("settings store error: {0}")]
    Store(#[source] StoreError),
}

#[derive(Debug, Error)]
pub enum StopError {
    #[error("no strategy is running")]
    NotActive,
}
