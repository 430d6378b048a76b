//! Exchange gateway abstraction shared by live and simulated trading.

use crate::models::signal::SignalDirection;
use crate::models::trade::PositionState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors surfaced by exchange operations. Raw venue codes are mapped into
/// these classes at the gateway boundary so callers never match on strings.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("exchange rejected request (code {code}): {message}")]
    Api { code: i64, message: String },
    #[error("no open position to close")]
    PositionNotFound,
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("unexpected response payload: {0}")]
    InvalidResponse(String),
    #[error("no price available for {0}")]
    PriceUnavailable(String),
}

impl ExchangeError {
    /// Whether retrying the same request could plausibly succeed. Rate
    /// limits, timestamp drift and transient venue errors qualify; rejections
    /// and auth failures do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExchangeError::Transport(_) => true,
            ExchangeError::Api { code, .. } => matches!(code, 10002 | 10006 | 10016),
            ExchangeError::PositionNotFound
            | ExchangeError::Auth(_)
            | ExchangeError::InvalidResponse(_)
            | ExchangeError::PriceUnavailable(_) => false,
        }
    }
}

/// Account funds in quote currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub free: f64,
    pub total: f64,
}

/// An open position as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionInfo {
    pub symbol: String,
    pub side: PositionState,
    pub size: f64,
    pub entry_price: f64,
}

/// Acknowledgement of an accepted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
}

/// Instrument lot-size constraints used to format order quantities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantityRules {
    pub qty_step: f64,
    pub min_order_qty: f64,
}

impl Default for QuantityRules {
    fn default() -> Self {
        Self {
            qty_step: 0.001,
            min_order_qty: 0.001,
        }
    }
}

impl QuantityRules {
    /// Floor a raw quantity to the step grid, then clamp up to the minimum
    /// order quantity when the floored value falls below it.
    pub fn apply(&self, raw: f64) -> f64 {
        let floored = if self.qty_step > 0.0 {
            round_to_precision((raw / self.qty_step).floor() * self.qty_step)
        } else {
            raw
        };
        if floored < self.min_order_qty {
            warn!(
                raw_quantity = raw,
                floored,
                min_order_qty = self.min_order_qty,
                "quantity below exchange minimum, clamping up"
            );
            return self.min_order_qty;
        }
        floored
    }

    /// Decimal places implied by the step, for rendering quantities as the
    /// exchange expects them.
    pub fn step_decimals(&self) -> usize {
        decimals_of(self.qty_step)
    }
}

fn round_to_precision(value: f64) -> f64 {
    (value * 1e10).round() / 1e10
}

fn decimals_of(step: f64) -> usize {
    let rendered = format!("{}", step);
    match rendered.find('.') {
        Some(dot) => rendered.len() - dot - 1,
        None => 0,
    }
}

/// Trading operations the strategy engine needs from a venue. Implemented by
/// the live Bybit client and by the paper exchange.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Quote-currency balance of the trading account.
    async fn get_balance(&self) -> Result<Balance, ExchangeError>;

    /// Set isolated leverage for a symbol. Setting the value it already has
    /// must succeed.
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError>;

    /// Last traded price.
    async fn get_price(&self, symbol: &str) -> Result<f64, ExchangeError>;

    /// Open positions for the symbol. Empty when flat.
    async fn get_positions(&self, symbol: &str) -> Result<Vec<PositionInfo>, ExchangeError>;

    /// Place a market order opening (or adding to) a position, with optional
    /// exchange-side take-profit and stop-loss prices.
    async fn place_market_order(
        &self,
        symbol: &str,
        side: SignalDirection,
        quantity: f64,
        take_profit: Option<f64>,
        stop_loss: Option<f64>,
    ) -> Result<OrderAck, ExchangeError>;

    /// Close the open position at market. Returns `PositionNotFound` when
    /// there is nothing to close.
    async fn close_position(&self, symbol: &str) -> Result<OrderAck, ExchangeError>;

    /// Adjust a raw quantity to the instrument's lot-size rules.
    async fn format_quantity(&self, symbol: &str, raw_quantity: f64)
        -> Result<f64, ExchangeError>;
}
